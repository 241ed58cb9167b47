//! Delay-line entities.
//!
//! A [`Connection`] sits between an event producer and its consumers. Each
//! inbound event is converted to a whole number of steps and queued under
//! the step count at which it falls due. Every tick the connection counts
//! one step and re-issues every due event under its own id, so the graph
//! dispatches it to the connection's successors at the start of the next
//! tick.
//!
//! With delay `D` and tick `dt`, an event handed to the connection during
//! tick `k` reaches the successors during tick `k + max(1, ceil(D / dt))`.

use std::collections::VecDeque;

use dynclamp_core::{EntityError, Event, Parameters, SimClock};

use crate::capability::Capability;
use crate::delay::DelayGenerator;
use crate::entity::{Entity, EntityCore, StepContext};

/// Fraction of a tick ignored when rounding `D / dt` up, so that a delay
/// which is a whole multiple of `dt` does not gain a tick from division
/// residue.
const ROUNDING_TOLERANCE: f64 = 1e-9;

/// Upper bound on draws before a variable delay falls back to the base delay.
const MAX_RESAMPLES: usize = 1000;

/// Steps an event spends inside a connection with delay `delay`.
///
/// Always at least one: an event is never forwarded during the tick that
/// handed it over.
pub fn delay_steps(delay: f64, dt: f64) -> u64 {
    let steps = (delay / dt - ROUNDING_TOLERANCE).ceil();
    if steps >= 1.0 {
        steps as u64
    } else {
        1
    }
}

/// Fixed-delay event relay.
#[derive(Debug)]
pub struct Connection {
    core: EntityCore,
    delay: f64,
    /// Steps taken since `initialise`.
    elapsed: u64,
    /// `(due step, event)`, ascending by due step.
    pending: VecDeque<(u64, Event)>,
}

impl Connection {
    /// A connection delaying every event by `delay` seconds.
    ///
    /// Delivery is rounded up to whole ticks and takes at least one tick,
    /// so a zero delay forwards during the tick after the event arrived.
    /// The delay is read from the `delay` parameter at `initialise`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `delay` is negative or not finite.
    pub fn new(delay: f64) -> Result<Self, EntityError> {
        if !delay.is_finite() || delay < 0.0 {
            return Err(EntityError::invalid("delay", delay, "must be finite and >= 0"));
        }
        Ok(Self {
            core: EntityCore::new(Parameters::new().with("delay", delay)),
            delay,
            elapsed: 0,
            pending: VecDeque::new(),
        })
    }

    /// Configured delay in seconds.
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Number of events still in flight.
    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Queue `event` to be forwarded `steps` steps from now, keeping the
    /// queue sorted by due step.
    ///
    /// Events due on the same step leave in the order they arrived.
    pub fn enqueue(&mut self, steps: u64, event: Event) {
        let due = self.elapsed + steps.max(1);
        let at = self.pending.partition_point(|(d, _)| *d <= due);
        self.pending.insert(at, (due, event));
    }

    fn reload(&mut self, clock: &SimClock) -> Result<(), EntityError> {
        let delay = self.core.params().require("delay")?;
        if !delay.is_finite() || delay < 0.0 {
            return Err(EntityError::invalid("delay", delay, "must be finite and >= 0"));
        }
        self.delay = delay;
        self.elapsed = 0;
        self.pending.clear();
        log::trace!(
            "{}: delay {delay} s = {} steps",
            self.core.id(),
            delay_steps(delay, clock.dt())
        );
        Ok(())
    }

    fn advance(&mut self, ctx: &mut StepContext<'_>) {
        self.elapsed += 1;
        while self
            .pending
            .front()
            .is_some_and(|(due, _)| *due <= self.elapsed)
        {
            if let Some((_, event)) = self.pending.pop_front() {
                ctx.forward(&event);
            }
        }
    }
}

impl Entity for Connection {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "Connection"
    }

    fn capability(&self) -> Capability {
        Capability::Connection
    }

    fn output(&self) -> f64 {
        0.0
    }

    fn initialise(&mut self, clock: &SimClock) -> Result<(), EntityError> {
        self.reload(clock)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        self.advance(ctx);
        Ok(())
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut StepContext<'_>) {
        self.enqueue(delay_steps(self.delay, ctx.dt()), event.clone());
    }
}

/// Event relay whose delay is drawn per event from a [`DelayGenerator`].
///
/// Degenerate draws (zero, negative, NaN, infinite) are resampled. A
/// generator that produces nothing usable after many draws falls back to
/// the base delay given at construction.
pub struct VariableDelayConnection {
    inner: Connection,
    generator: Box<dyn DelayGenerator>,
    resamples: u64,
}

impl VariableDelayConnection {
    /// Wrap `generator`; `base_delay` is the fallback delay.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `base_delay` is negative or not finite.
    pub fn new(
        base_delay: f64,
        generator: impl DelayGenerator,
    ) -> Result<Self, EntityError> {
        Ok(Self {
            inner: Connection::new(base_delay)?,
            generator: Box::new(generator),
            resamples: 0,
        })
    }

    /// Total degenerate draws discarded so far.
    pub fn resamples(&self) -> u64 {
        self.resamples
    }

    /// Number of events still in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight()
    }

    fn draw_delay(&mut self) -> f64 {
        for _ in 0..MAX_RESAMPLES {
            let d = self.generator.sample();
            if d.is_finite() && d > 0.0 {
                return d;
            }
            self.resamples += 1;
            log::debug!("{}: resampling degenerate delay {d}", self.inner.core.id());
        }
        log::warn!(
            "{}: no usable delay after {MAX_RESAMPLES} draws, using base delay {}",
            self.inner.core.id(),
            self.inner.delay
        );
        self.inner.delay
    }
}

impl std::fmt::Debug for VariableDelayConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableDelayConnection")
            .field("inner", &self.inner)
            .field("resamples", &self.resamples)
            .finish_non_exhaustive()
    }
}

impl Entity for VariableDelayConnection {
    fn core(&self) -> &EntityCore {
        &self.inner.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.inner.core
    }

    fn name(&self) -> &str {
        "VariableDelayConnection"
    }

    fn capability(&self) -> Capability {
        Capability::Connection
    }

    fn output(&self) -> f64 {
        0.0
    }

    fn initialise(&mut self, clock: &SimClock) -> Result<(), EntityError> {
        self.inner.initialise(clock)
    }

    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        self.inner.advance(ctx);
        Ok(())
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut StepContext<'_>) {
        let delay = self.draw_delay();
        self.inner
            .enqueue(delay_steps(delay, ctx.dt()), event.clone());
    }
}
