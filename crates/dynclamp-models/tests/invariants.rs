//! State invariants of the reference models under arbitrary input.

use proptest::prelude::*;

use dynclamp_core::{Event, SimClock};
use dynclamp_entity::{Entity, EventQueue, StepContext};
use dynclamp_models::{ExponentialSynapse, LifNeuron};

proptest! {
    #[test]
    fn synapse_conductance_decays_between_spikes(
        tau_ms in 0.5f64..20.0,
        spikes in prop::collection::vec((0usize..200, 0.01f64..2.0), 0..20),
    ) {
        let dt = 1e-4;
        let mut syn = ExponentialSynapse::new(tau_ms * 1e-3, 0.0, 1.0).unwrap();
        let queue = EventQueue::new();
        let mut clock = SimClock::new(dt);
        syn.initialise(&clock).unwrap();
        let decay = (-dt / (tau_ms * 1e-3)).exp();

        for k in 0..200 {
            let mut ctx = StepContext::new(&clock, syn.id(), &queue);
            for &(_, w) in spikes.iter().filter(|(at, _)| *at == k) {
                syn.handle_event(&Event::spike(None, clock.time(), w), &mut ctx);
            }
            let before = syn.conductance();
            clock.advance();
            let mut ctx = StepContext::new(&clock, syn.id(), &queue);
            syn.step(&mut ctx).unwrap();
            let g = syn.conductance();
            prop_assert!(g >= 0.0);
            prop_assert!((g - before * decay).abs() <= 1e-12 * before.max(1e-300));
        }
    }

    #[test]
    fn lif_potential_stays_below_threshold(
        bias_pa in 0.0f64..500.0,
        refractory_ms in 0.0f64..5.0,
    ) {
        let dt = 1e-4;
        let mut n = LifNeuron::builder()
            .bias_current(bias_pa * 1e-12)
            .refractory(refractory_ms * 1e-3)
            .build()
            .unwrap();
        let queue = EventQueue::new();
        let mut clock = SimClock::new(dt);
        n.initialise(&clock).unwrap();

        let mut emitted = 0;
        for _ in 0..5000 {
            clock.advance();
            let mut ctx = StepContext::new(&clock, n.id(), &queue);
            n.step(&mut ctx).unwrap();
            emitted += queue.drain().len();
            prop_assert!(n.potential() < -50e-3);
        }
        prop_assert_eq!(emitted as u64, n.spike_count());
    }
}
