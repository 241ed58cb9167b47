//! Simulation time seen by entities over whole trials.

use std::sync::{Arc, Mutex};

use proptest::prelude::*;

use dynclamp_core::{EntityError, Parameters};
use dynclamp_engine::{Simulator, TrialConfig, TrialStatus};
use dynclamp_entity::{Entity, EntityCore, Graph, StepContext};

/// Records `ctx.time()` at every step.
struct TimeProbe {
    core: EntityCore,
    seen: Arc<Mutex<Vec<f64>>>,
}

impl Entity for TimeProbe {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "TimeProbe"
    }

    fn output(&self) -> f64 {
        0.0
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        self.seen.lock().unwrap().push(ctx.time());
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn step_times_advance_by_exactly_dt(dt in 1e-5f64..1e-2, ticks in 1u64..2000) {
        let duration = dt * ticks as f64;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut graph = Graph::new();
        graph.add(TimeProbe {
            core: EntityCore::new(Parameters::new()),
            seen: Arc::clone(&seen),
        }).unwrap();

        let mut sim = Simulator::new(TrialConfig::new(duration, dt)).unwrap();
        let report = sim.run(&mut graph);
        prop_assert_eq!(report.status, TrialStatus::Completed);

        let seen = seen.lock().unwrap();
        prop_assert_eq!(seen.len() as u64, report.ticks);
        prop_assert_eq!(seen[0], dt);
        for (k, pair) in seen.windows(2).enumerate() {
            prop_assert!(pair[1] > pair[0], "time went backwards at step {}", k + 1);
            prop_assert_eq!(pair[1], (k + 2) as f64 * dt);
        }
        let last = *seen.last().unwrap();
        prop_assert!(last >= duration, "ended at {} before {}", last, duration);
    }
}
