//! Acquisition-only trials over mock streams.

use std::thread;
use std::time::{Duration, Instant};

use dynclamp_core::AbortFlag;
use dynclamp_engine::{run_streams, Stream, TrialStatus};
use dynclamp_test_utils::MockStream;

#[test]
fn streams_run_for_the_duration() {
    let (a, ca) = MockStream::new("ai0");
    let (b, cb) = MockStream::new("ai1");
    let mut streams: Vec<Box<dyn Stream>> = vec![Box::new(a), Box::new(b)];

    let report = run_streams(&mut streams, 0.05, "trial-01.h5", &AbortFlag::new());

    assert_eq!(report.status, TrialStatus::Completed);
    assert!(report.elapsed >= Duration::from_millis(50));
    for c in [ca, cb] {
        assert_eq!(c.initialised(), 1);
        assert_eq!(c.started(), 1);
        assert_eq!(c.stopped(), 1);
        assert_eq!(c.terminated(), 1);
        assert_eq!(c.destination().as_deref(), Some("trial-01.h5"));
    }
}

#[test]
fn initialisation_failure_terminates_only_initialised_streams() {
    let (a, ca) = MockStream::new("ai0");
    let (b, cb) = MockStream::failing_initialise("ai1");
    let (c, cc) = MockStream::new("ai2");
    let mut streams: Vec<Box<dyn Stream>> = vec![Box::new(a), Box::new(b), Box::new(c)];

    let report = run_streams(&mut streams, 1.0, "out", &AbortFlag::new());

    assert!(matches!(
        report.status,
        TrialStatus::InitialisationFailed { ref entity, .. } if entity == "ai1"
    ));
    assert_eq!(report.code(), 3);
    assert_eq!(ca.started(), 0);
    assert_eq!(ca.terminated(), 1);
    assert_eq!(cb.terminated(), 0);
    assert_eq!(cc.initialised(), 0);
    assert_eq!(cc.terminated(), 0);
}

#[test]
fn start_failure_stops_started_streams() {
    let (a, ca) = MockStream::new("ai0");
    let (b, cb) = MockStream::failing_start("ai1");
    let (c, cc) = MockStream::new("ai2");
    let mut streams: Vec<Box<dyn Stream>> = vec![Box::new(a), Box::new(b), Box::new(c)];

    let report = run_streams(&mut streams, 1.0, "out", &AbortFlag::new());

    assert!(matches!(report.status, TrialStatus::StreamFailed { .. }));
    assert_eq!(report.code(), 8);
    assert_eq!(ca.stopped(), 1);
    assert_eq!(cb.stopped(), 0);
    assert_eq!(cc.started(), 0);
    for c in [ca, cb, cc] {
        assert_eq!(c.terminated(), 1);
    }
}

#[test]
fn abort_cuts_the_acquisition_short() {
    let (a, ca) = MockStream::new("ai0");
    let mut streams: Vec<Box<dyn Stream>> = vec![Box::new(a)];
    let abort = AbortFlag::new();
    let remote = abort.clone();
    let raiser = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        remote.raise();
    });

    let started = Instant::now();
    let report = run_streams(&mut streams, 10.0, "out", &abort);
    raiser.join().unwrap();

    assert_eq!(report.status, TrialStatus::Aborted);
    assert_eq!(report.code(), 1);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(ca.stopped(), 1);
    assert_eq!(ca.terminated(), 1);
}

#[test]
fn trial_ends_when_every_stream_finishes() {
    let (a, _) = MockStream::new("ai0");
    let (b, _) = MockStream::new("ai1");
    let mut streams: Vec<Box<dyn Stream>> = vec![
        Box::new(a.finishing_after(Duration::from_millis(10))),
        Box::new(b.finishing_after(Duration::from_millis(20))),
    ];

    let started = Instant::now();
    let report = run_streams(&mut streams, 10.0, "out", &AbortFlag::new());

    assert_eq!(report.status, TrialStatus::Completed);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn negative_duration_is_rejected() {
    let (a, ca) = MockStream::new("ai0");
    let mut streams: Vec<Box<dyn Stream>> = vec![Box::new(a)];
    let report = run_streams(&mut streams, -1.0, "out", &AbortFlag::new());
    assert_eq!(report.code(), 2);
    assert_eq!(ca.initialised(), 0);
}
