//! Reference entities for dynclamp.
//!
//! These implement the [`Entity`](dynclamp_entity::Entity) contract for
//! the building blocks of a closed-loop experiment:
//!
//! | Entity | Role |
//! |--------|------|
//! | [`ConstantGenerator`] | Constant output, e.g. a holding current |
//! | [`PoissonGenerator`] | Seeded Poisson spike train |
//! | [`ExponentialSynapse`] | Conductance jump on spike, exponential decay |
//! | [`LifNeuron`] | Leaky integrate-and-fire membrane |
//! | [`EventCounter`] | Counts events, emits `Stop` at a limit |
//! | [`Recorder`] | Stores its inputs every tick |
//!
//! Times are in seconds, potentials in volts, conductances in siemens and
//! currents in amperes.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod counter;
pub mod generator;
pub mod neuron;
pub mod recorder;
pub mod synapse;

pub use counter::EventCounter;
pub use generator::{ConstantGenerator, PoissonGenerator};
pub use neuron::{LifNeuron, LifNeuronBuilder};
pub use recorder::{Recorder, RecorderHandle, Sample};
pub use synapse::ExponentialSynapse;
