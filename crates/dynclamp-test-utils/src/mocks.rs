//! Mock engine collaborators.
//!
//! - [`MockStream`]: a [`Stream`] that counts lifecycle calls and can be
//!   told to fail or to finish on its own.
//! - [`MockTrigger`]: a [`Trigger`] that fires after N polls, never fires,
//!   or fails.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use dynclamp_core::AbortFlag;
use dynclamp_engine::{Stream, StreamError, Trigger, TriggerError, TriggerOutcome};

// ── MockStream ───────────────────────────────────────────────────

/// Shared stream call counters.
#[derive(Debug, Default)]
pub struct StreamCounts {
    pub initialise: AtomicUsize,
    pub start: AtomicUsize,
    pub stop: AtomicUsize,
    pub terminate: AtomicUsize,
    pub destination: Mutex<Option<String>>,
}

impl StreamCounts {
    pub fn initialised(&self) -> usize {
        self.initialise.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> usize {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminate.load(Ordering::SeqCst)
    }

    pub fn destination(&self) -> Option<String> {
        self.destination.lock().ok().and_then(|d| d.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StreamFault {
    None,
    Initialise,
    Start,
}

/// Stream double. Runs until stopped, or for a fixed wall-clock span.
#[derive(Debug)]
pub struct MockStream {
    name: String,
    fault: StreamFault,
    runs_for: Option<Duration>,
    started_at: Option<Instant>,
    running: AtomicBool,
    counts: Arc<StreamCounts>,
}

impl MockStream {
    pub fn new(name: impl Into<String>) -> (Self, Arc<StreamCounts>) {
        Self::build(name.into(), StreamFault::None)
    }

    pub fn failing_initialise(name: impl Into<String>) -> (Self, Arc<StreamCounts>) {
        Self::build(name.into(), StreamFault::Initialise)
    }

    pub fn failing_start(name: impl Into<String>) -> (Self, Arc<StreamCounts>) {
        Self::build(name.into(), StreamFault::Start)
    }

    /// Stop reporting as running `span` after `start`.
    pub fn finishing_after(mut self, span: Duration) -> Self {
        self.runs_for = Some(span);
        self
    }

    fn build(name: String, fault: StreamFault) -> (Self, Arc<StreamCounts>) {
        let counts = Arc::new(StreamCounts::default());
        let stream = Self {
            name,
            fault,
            runs_for: None,
            started_at: None,
            running: AtomicBool::new(false),
            counts: Arc::clone(&counts),
        };
        (stream, counts)
    }
}

impl Stream for MockStream {
    fn name(&self) -> &str {
        &self.name
    }

    fn initialise(&mut self, destination: &str) -> Result<(), StreamError> {
        self.counts.initialise.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut d) = self.counts.destination.lock() {
            *d = Some(destination.to_owned());
        }
        if self.fault == StreamFault::Initialise {
            return Err(StreamError::Initialisation {
                reason: "no such device".into(),
            });
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), StreamError> {
        self.counts.start.fetch_add(1, Ordering::SeqCst);
        if self.fault == StreamFault::Start {
            return Err(StreamError::Start {
                reason: "device busy".into(),
            });
        }
        self.started_at = Some(Instant::now());
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_running(&self) -> bool {
        let expired = match (self.runs_for, self.started_at) {
            (Some(span), Some(at)) => at.elapsed() >= span,
            _ => false,
        };
        self.running.load(Ordering::SeqCst) && !expired
    }

    fn stop(&mut self) {
        self.counts.stop.fetch_add(1, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }

    fn terminate(&mut self) {
        self.counts.terminate.fetch_add(1, Ordering::SeqCst);
    }
}

// ── MockTrigger ──────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum TriggerPlan {
    FireAfter(usize),
    Never,
    Fail(String),
}

/// Trigger double. Each poll sleeps one millisecond.
#[derive(Debug)]
pub struct MockTrigger {
    plan: TriggerPlan,
    polls: Arc<AtomicUsize>,
}

impl MockTrigger {
    /// Fires on the `n`-th poll.
    pub fn fire_after(n: usize) -> Self {
        Self::with_plan(TriggerPlan::FireAfter(n))
    }

    /// Waits until aborted.
    pub fn never() -> Self {
        Self::with_plan(TriggerPlan::Never)
    }

    /// Fails with a device error.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::with_plan(TriggerPlan::Fail(reason.into()))
    }

    /// Shared poll counter.
    pub fn polls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.polls)
    }

    fn with_plan(plan: TriggerPlan) -> Self {
        Self {
            plan,
            polls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Trigger for MockTrigger {
    fn wait(&mut self, abort: &AbortFlag) -> Result<TriggerOutcome, TriggerError> {
        if let TriggerPlan::Fail(reason) = &self.plan {
            return Err(TriggerError::Device {
                reason: reason.clone(),
            });
        }
        loop {
            if abort.is_raised() {
                return Ok(TriggerOutcome::Aborted);
            }
            let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
            if let TriggerPlan::FireAfter(n) = self.plan {
                if polls >= n {
                    return Ok(TriggerOutcome::Fired);
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}
