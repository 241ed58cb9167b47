//! Reusable entity test fixtures.
//!
//! - [`CountingEntity`]: counts every lifecycle call.
//! - [`FailingEntity`]: fails `initialise`, or `step` after N calls.
//! - [`RampEntity`]: output grows by `slope * dt` per step.
//! - [`InputRecorder`]: records its input cache at every step.
//! - [`EventLog`]: records every event delivered to it.
//! - [`ScheduledEmitter`]: emits an event on chosen ticks.
//! - [`AbortAt`]: raises an abort flag at a simulation time.
//!
//! Observations go into `Arc`-shared handles so tests can read them while
//! the entity itself is owned by a graph.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dynclamp_core::{AbortFlag, EntityError, EntityId, Event, EventKind, Parameters, SimClock};
use dynclamp_entity::{Capability, Entity, EntityCore, StepContext};

/// Index of the tick being stepped: the clock has already advanced.
fn stepping_tick(ctx: &StepContext<'_>) -> u64 {
    ctx.clock().tick().0.saturating_sub(1)
}

// ── LifecycleCounts ──────────────────────────────────────────────

/// Shared call counters.
#[derive(Debug, Default)]
pub struct LifecycleCounts {
    pub initialise: AtomicUsize,
    pub first_step: AtomicUsize,
    pub step: AtomicUsize,
    pub events: AtomicUsize,
    pub terminate: AtomicUsize,
}

impl LifecycleCounts {
    pub fn initialised(&self) -> usize {
        self.initialise.load(Ordering::SeqCst)
    }

    pub fn first_steps(&self) -> usize {
        self.first_step.load(Ordering::SeqCst)
    }

    /// Calls to `step`, not counting `first_step`.
    pub fn steps(&self) -> usize {
        self.step.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> usize {
        self.events.load(Ordering::SeqCst)
    }

    pub fn terminated(&self) -> usize {
        self.terminate.load(Ordering::SeqCst)
    }
}

fn bump(counter: &AtomicUsize) {
    counter.fetch_add(1, Ordering::SeqCst);
}

// ── CountingEntity ───────────────────────────────────────────────

/// Constant-output entity that counts lifecycle calls.
#[derive(Debug)]
pub struct CountingEntity {
    core: EntityCore,
    output: f64,
    counts: Arc<LifecycleCounts>,
}

impl CountingEntity {
    pub fn new(output: f64) -> (Self, Arc<LifecycleCounts>) {
        let counts = Arc::new(LifecycleCounts::default());
        let entity = Self {
            core: EntityCore::new(Parameters::new().with("output", output)),
            output,
            counts: Arc::clone(&counts),
        };
        (entity, counts)
    }
}

impl Entity for CountingEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "CountingEntity"
    }

    fn output(&self) -> f64 {
        self.output
    }

    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        bump(&self.counts.initialise);
        Ok(())
    }

    fn first_step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        bump(&self.counts.first_step);
        Ok(())
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        bump(&self.counts.step);
        Ok(())
    }

    fn handle_event(&mut self, _event: &Event, _ctx: &mut StepContext<'_>) {
        bump(&self.counts.events);
    }

    fn terminate(&mut self) {
        bump(&self.counts.terminate);
    }
}

// ── FailingEntity ────────────────────────────────────────────────

/// Fails deterministically, counting lifecycle calls like
/// [`CountingEntity`].
#[derive(Debug)]
pub struct FailingEntity {
    core: EntityCore,
    fail_initialise: bool,
    steps_before_failure: Option<usize>,
    counts: Arc<LifecycleCounts>,
}

impl FailingEntity {
    /// `initialise` returns `Err`.
    pub fn on_initialise() -> (Self, Arc<LifecycleCounts>) {
        Self::build(true, None)
    }

    /// The step after `n` successful ones returns `Err`. `first_step`
    /// counts as a step.
    pub fn after_steps(n: usize) -> (Self, Arc<LifecycleCounts>) {
        Self::build(false, Some(n))
    }

    fn build(fail_initialise: bool, steps: Option<usize>) -> (Self, Arc<LifecycleCounts>) {
        let counts = Arc::new(LifecycleCounts::default());
        let entity = Self {
            core: EntityCore::new(Parameters::new()),
            fail_initialise,
            steps_before_failure: steps,
            counts: Arc::clone(&counts),
        };
        (entity, counts)
    }
}

impl Entity for FailingEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "FailingEntity"
    }

    fn output(&self) -> f64 {
        0.0
    }

    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        bump(&self.counts.initialise);
        if self.fail_initialise {
            return Err(EntityError::InitialisationFailed {
                reason: "device not found".into(),
            });
        }
        Ok(())
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        let done = self.counts.step.fetch_add(1, Ordering::SeqCst);
        match self.steps_before_failure {
            Some(n) if done >= n => Err(EntityError::StepFailed {
                reason: format!("failed after {n} steps"),
            }),
            _ => Ok(()),
        }
    }

    fn terminate(&mut self) {
        bump(&self.counts.terminate);
    }
}

// ── RampEntity ───────────────────────────────────────────────────

/// Output starts at `start` and grows by `slope * dt` every step.
#[derive(Debug)]
pub struct RampEntity {
    core: EntityCore,
    start: f64,
    slope: f64,
}

impl RampEntity {
    pub fn new(start: f64, slope: f64) -> Self {
        let mut core = EntityCore::with_state(
            Parameters::new().with("start", start).with("slope", slope),
            1,
        );
        core.state_mut()[0] = start;
        Self { core, start, slope }
    }
}

impl Entity for RampEntity {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "RampEntity"
    }

    fn output(&self) -> f64 {
        self.core.state()[0]
    }

    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        self.core.state_mut()[0] = self.start;
        Ok(())
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        self.core.state_mut()[0] += self.slope * ctx.dt();
        Ok(())
    }
}

// ── InputRecorder ────────────────────────────────────────────────

/// Records `(tick, inputs)` at every step and outputs the input sum.
#[derive(Debug)]
pub struct InputRecorder {
    core: EntityCore,
    log: Arc<Mutex<Vec<(u64, Vec<f64>)>>>,
}

impl InputRecorder {
    pub fn new() -> (Self, Arc<Mutex<Vec<(u64, Vec<f64>)>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entity = Self {
            core: EntityCore::with_state(Parameters::new(), 1),
            log: Arc::clone(&log),
        };
        (entity, log)
    }
}

impl Entity for InputRecorder {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "InputRecorder"
    }

    fn output(&self) -> f64 {
        self.core.state()[0]
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        let inputs = self.core.inputs().to_vec();
        self.core.state_mut()[0] = inputs.iter().sum();
        if let Ok(mut log) = self.log.lock() {
            log.push((stepping_tick(ctx), inputs));
        }
        Ok(())
    }
}

// ── EventLog ─────────────────────────────────────────────────────

/// One event as seen by an [`EventLog`].
#[derive(Clone, Debug, PartialEq)]
pub struct Delivery {
    /// Tick during which the event was dispatched.
    pub tick: u64,
    pub kind: EventKind,
    pub origin: Option<EntityId>,
    /// Time stamped on the event by its producer.
    pub stamped: f64,
    pub params: Vec<f64>,
}

/// Records every event delivered to it.
#[derive(Debug)]
pub struct EventLog {
    core: EntityCore,
    capability: Capability,
    log: Arc<Mutex<Vec<Delivery>>>,
}

impl EventLog {
    pub fn new() -> (Self, Arc<Mutex<Vec<Delivery>>>) {
        Self::with_capability(Capability::Generic)
    }

    /// An event log advertising `capability` to its neighbours.
    pub fn with_capability(capability: Capability) -> (Self, Arc<Mutex<Vec<Delivery>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entity = Self {
            core: EntityCore::new(Parameters::new()),
            capability,
            log: Arc::clone(&log),
        };
        (entity, log)
    }
}

impl Entity for EventLog {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "EventLog"
    }

    fn capability(&self) -> Capability {
        self.capability
    }

    fn output(&self) -> f64 {
        0.0
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        Ok(())
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut StepContext<'_>) {
        if let Ok(mut log) = self.log.lock() {
            log.push(Delivery {
                tick: ctx.clock().tick().0,
                kind: event.kind(),
                origin: event.origin(),
                stamped: event.time(),
                params: event.params().to_vec(),
            });
        }
    }
}

// ── ScheduledEmitter ─────────────────────────────────────────────

/// Emits `kind` during the step of each listed tick.
///
/// An event emitted during tick `k` is dispatched at the start of tick
/// `k + 1`.
#[derive(Debug)]
pub struct ScheduledEmitter {
    core: EntityCore,
    kind: EventKind,
    ticks: Vec<u64>,
}

impl ScheduledEmitter {
    pub fn new(kind: EventKind, ticks: impl IntoIterator<Item = u64>) -> Self {
        let mut ticks: Vec<u64> = ticks.into_iter().collect();
        ticks.sort_unstable();
        Self {
            core: EntityCore::new(Parameters::new()),
            kind,
            ticks,
        }
    }
}

impl Entity for ScheduledEmitter {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "ScheduledEmitter"
    }

    fn output(&self) -> f64 {
        0.0
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        let tick = stepping_tick(ctx);
        let n = self.ticks.iter().filter(|&&t| t == tick).count();
        for _ in 0..n {
            ctx.emit(self.kind, [tick as f64]);
        }
        Ok(())
    }
}

// ── AbortAt ──────────────────────────────────────────────────────

/// Raises `flag` from inside the tick loop once simulation time reaches
/// `at`, the way a signal handler would mid-trial.
#[derive(Debug)]
pub struct AbortAt {
    core: EntityCore,
    at: f64,
    flag: AbortFlag,
}

impl AbortAt {
    pub fn new(at: f64, flag: AbortFlag) -> Self {
        Self {
            core: EntityCore::new(Parameters::new().with("at", at)),
            at,
            flag,
        }
    }
}

impl Entity for AbortAt {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "AbortAt"
    }

    fn output(&self) -> f64 {
        0.0
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        if ctx.time() >= self.at {
            self.flag.raise();
        }
        Ok(())
    }
}
