//! Benchmark profiles for the dynclamp trial engine.
//!
//! - [`closed_loop_profile`]: `cells` independent Poisson → synapse →
//!   LIF → connection → counter chains
//! - [`delay_line_profile`]: one high-rate spike source fanned out through
//!   `lines` delay connections

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::error::Error;

use dynclamp_core::EventKind;
use dynclamp_entity::{Connection, Graph};
use dynclamp_models::{EventCounter, ExponentialSynapse, LifNeuron, PoissonGenerator};

/// Tick used by every profile: 20 kHz.
pub const BENCH_DT: f64 = 5e-5;

/// Build the closed-loop profile.
///
/// Each chain is seeded with `seed + index` so the spike trains differ
/// but replay identically across runs. No recorder is attached: the
/// per-tick benchmarks run for millions of ticks.
pub fn closed_loop_profile(cells: usize, seed: u64) -> Result<Graph, Box<dyn Error>> {
    let mut graph = Graph::new();

    for i in 0..cells {
        let poisson = graph.add(PoissonGenerator::new(800.0, 4e-9, seed + i as u64)?)?;
        let syn = graph.add(ExponentialSynapse::new(5e-3, 0.0, 4e-9)?)?;
        let neuron = graph.add(LifNeuron::builder().bias_current(50e-12).build()?)?;
        let delay = graph.add(Connection::new(1e-3)?)?;
        let counter = graph.add(EventCounter::new(EventKind::Spike))?;

        graph.connect(poisson, syn)?;
        graph.connect(syn, neuron)?;
        graph.connect(neuron, delay)?;
        graph.connect(delay, counter)?;
    }
    Ok(graph)
}

/// Build the delay-line profile.
///
/// Delays are spread between 1 ms and `lines` ms so every line holds a
/// different number of events in flight.
pub fn delay_line_profile(lines: usize, seed: u64) -> Result<Graph, Box<dyn Error>> {
    let mut graph = Graph::new();
    let source = graph.add(PoissonGenerator::new(2_000.0, 1.0, seed)?)?;
    for i in 0..lines {
        let delay = graph.add(Connection::new((i + 1) as f64 * 1e-3)?)?;
        let counter = graph.add(EventCounter::new(EventKind::Spike))?;
        graph.connect(source, delay)?;
        graph.connect(delay, counter)?;
    }
    Ok(graph)
}
