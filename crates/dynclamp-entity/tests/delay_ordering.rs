//! Delivery timing through connections, driven tick by tick.

use proptest::prelude::*;

use dynclamp_core::{EventKind, SimClock};
use dynclamp_entity::{Connection, Graph};
use dynclamp_test_utils::{EventLog, ScheduledEmitter};

/// One tick of the engine protocol.
fn tick(graph: &mut Graph, clock: &mut SimClock, first: bool) {
    graph.process_events(clock);
    graph.read_inputs();
    clock.advance();
    graph.step_all(clock, first).unwrap();
}

/// Ticks a connection needs before an event it received is forwarded.
fn steps_in_flight(whole: u64, quarter: u64) -> u64 {
    if quarter == 0 {
        whole.max(1)
    } else {
        whole + 1
    }
}

#[test]
fn spike_through_three_ms_connection() {
    let dt = 1e-3;
    let mut graph = Graph::new();
    let src = graph
        .add(ScheduledEmitter::new(EventKind::Spike, [9]))
        .unwrap();
    let conn = graph.add(Connection::new(3e-3).unwrap()).unwrap();
    let (log, deliveries) = EventLog::new();
    let dst = graph.add(log).unwrap();
    graph.connect(src, conn).unwrap();
    graph.connect(conn, dst).unwrap();

    let mut clock = SimClock::new(dt);
    for k in 0..30 {
        tick(&mut graph, &mut clock, k == 0);
    }

    // Emitted in tick 9, reaches the connection in tick 10, the target in 13.
    let got = deliveries.lock().unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].tick, 13);
    assert_eq!(got[0].origin, Some(conn));
    assert_eq!(got[0].kind, EventKind::Spike);
}

proptest! {
    #[test]
    fn every_event_delivered_once_in_order(
        emit_at in prop::collection::vec(0u64..60, 1..40),
        whole in 0u64..15,
        quarter in 0u64..4,
    ) {
        let dt = 1e-3;
        let delay = (whole as f64 + quarter as f64 * 0.25) * dt;
        let mut graph = Graph::new();
        let src = graph.add(ScheduledEmitter::new(EventKind::Spike, emit_at.clone())).unwrap();
        let conn = graph.add(Connection::new(delay).unwrap()).unwrap();
        let (log, deliveries) = EventLog::new();
        let dst = graph.add(log).unwrap();
        graph.connect(src, conn).unwrap();
        graph.connect(conn, dst).unwrap();

        let flight = steps_in_flight(whole, quarter);
        let horizon = emit_at.iter().max().copied().unwrap_or(0) + flight + 3;
        let mut clock = SimClock::new(dt);
        for k in 0..horizon {
            tick(&mut graph, &mut clock, k == 0);
        }

        let got = deliveries.lock().unwrap();
        prop_assert_eq!(got.len(), emit_at.len());
        prop_assert!(got.windows(2).all(|w| w[0].tick <= w[1].tick));

        let mut expected: Vec<(u64, u64)> = emit_at.iter().map(|&s| (s + 1 + flight, s)).collect();
        expected.sort_unstable();
        let actual: Vec<(u64, u64)> = got.iter().map(|d| (d.tick, d.params[0] as u64)).collect();
        prop_assert_eq!(actual, expected);
    }
}

/// Delivery tick of one spike emitted in tick 0 through a `delay` connection.
fn delivery_tick(delay: f64, dt: f64) -> Option<u64> {
    let mut graph = Graph::new();
    let src = graph
        .add(ScheduledEmitter::new(EventKind::Spike, [0]))
        .unwrap();
    let conn = graph.add(Connection::new(delay).unwrap()).unwrap();
    let (log, deliveries) = EventLog::new();
    let dst = graph.add(log).unwrap();
    graph.connect(src, conn).unwrap();
    graph.connect(conn, dst).unwrap();

    let mut clock = SimClock::new(dt);
    let horizon = (delay / dt).round() as u64 + 5;
    for k in 0..horizon {
        tick(&mut graph, &mut clock, k == 0);
    }
    let got = deliveries.lock().unwrap();
    assert!(got.len() <= 1);
    got.first().map(|d| d.tick)
}

#[test]
fn long_delays_land_on_the_exact_tick() {
    // Reaches the connection in tick 1, then ceil(D / dt) ticks in flight.
    assert_eq!(delivery_tick(1.0, 1e-5), Some(100_001));
    assert_eq!(delivery_tick(2.0, 1e-4), Some(20_001));
    assert_eq!(delivery_tick(0.7, 1e-4), Some(7_001));
}
