//! In-memory recording of inputs and events.
//!
//! A [`Recorder`] stores, every tick, the time and the outputs of all its
//! predecessors, and every event delivered to it. It writes into a shared
//! [`RecorderHandle`] so the data stays readable after the graph has
//! moved onto the simulation thread.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dynclamp_core::{EntityError, Event, Parameters, SimClock};
use dynclamp_entity::{Entity, EntityCore, StepContext};

/// One recorded tick.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Simulation time after the clock advanced for this tick.
    pub time: f64,
    /// Predecessor outputs in connection order, as read this tick.
    pub values: Vec<f64>,
}

#[derive(Debug, Default)]
struct Recording {
    samples: Vec<Sample>,
    events: Vec<Event>,
}

/// Shared view of what a [`Recorder`] captured.
#[derive(Clone, Debug, Default)]
pub struct RecorderHandle {
    inner: Arc<Mutex<Recording>>,
}

impl RecorderHandle {
    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of every sample so far.
    pub fn samples(&self) -> Vec<Sample> {
        self.lock().samples.clone()
    }

    /// Copy of every event received so far.
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    /// Whether nothing was sampled.
    pub fn is_empty(&self) -> bool {
        self.lock().samples.is_empty()
    }

    /// The recorded trace of predecessor `index` as `(time, value)` pairs.
    pub fn trace(&self, index: usize) -> Vec<(f64, f64)> {
        self.lock()
            .samples
            .iter()
            .filter_map(|s| s.values.get(index).map(|&v| (s.time, v)))
            .collect()
    }
}

/// Records its inputs every tick.
#[derive(Debug)]
pub struct Recorder {
    core: EntityCore,
    handle: RecorderHandle,
}

impl Recorder {
    /// A recorder and the handle to read it through.
    pub fn new() -> (Self, RecorderHandle) {
        let handle = RecorderHandle::default();
        let recorder = Self {
            core: EntityCore::new(Parameters::new()),
            handle: handle.clone(),
        };
        (recorder, handle)
    }
}

impl Entity for Recorder {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "Recorder"
    }

    fn output(&self) -> f64 {
        0.0
    }

    /// Clears data from any earlier trial.
    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        let mut rec = self.handle.lock();
        rec.samples.clear();
        rec.events.clear();
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        let sample = Sample {
            time: ctx.time(),
            values: self.core.inputs().to_vec(),
        };
        self.handle.lock().samples.push(sample);
        Ok(())
    }

    fn handle_event(&mut self, event: &Event, _ctx: &mut StepContext<'_>) {
        self.handle.lock().events.push(event.clone());
    }

    fn terminate(&mut self) {
        log::debug!(
            "{}: recorded {} samples",
            self.core.id(),
            self.handle.len()
        );
    }
}
