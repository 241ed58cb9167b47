//! Running a trial on a dedicated simulation thread.
//!
//! The graph and simulator move onto the thread, which owns them
//! exclusively for the whole trial; the caller blocks on the join and gets
//! both back afterwards, so recorder entities can be read out.

use std::thread;

use dynclamp_entity::Graph;

use crate::engine::{Simulator, TrialReport, TrialStatus};

/// What [`run_trial`] hands back.
#[derive(Debug)]
pub struct TrialOutcome {
    /// The graph, unless the simulation thread was lost.
    pub graph: Option<Graph>,
    /// The simulator, ready for another trial, unless the thread was lost.
    pub simulator: Option<Simulator>,
    /// Trial summary.
    pub report: TrialReport,
}

/// Run one trial on a new thread named `dynclamp-sim` and wait for it.
///
/// Real-time priority requested by the simulator's configuration applies
/// to that thread only. A failure to spawn the thread, or a panic inside
/// it, is reported as [`TrialStatus::ThreadFailed`]; the graph is lost in
/// that case.
pub fn run_trial(graph: Graph, simulator: Simulator) -> TrialOutcome {
    let spawned = thread::Builder::new()
        .name("dynclamp-sim".into())
        .spawn(move || {
            let mut graph = graph;
            let mut simulator = simulator;
            let report = simulator.run(&mut graph);
            (graph, simulator, report)
        });

    let handle = match spawned {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("cannot spawn simulation thread: {e}");
            return lost(format!("spawn: {e}"));
        }
    };

    match handle.join() {
        Ok((graph, simulator, report)) => TrialOutcome {
            graph: Some(graph),
            simulator: Some(simulator),
            report,
        },
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_owned());
            log::error!("simulation thread panicked: {reason}");
            lost(reason)
        }
    }
}

fn lost(reason: String) -> TrialOutcome {
    TrialOutcome {
        graph: None,
        simulator: None,
        report: TrialReport::new(TrialStatus::ThreadFailed { reason }),
    }
}
