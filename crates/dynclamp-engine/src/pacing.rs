//! Inter-tick pacing backends.
//!
//! The tick loop is identical for every backend; only the wait at the end
//! of each tick differs. A [`Pacer`] is started once, right before the
//! first tick, and then asked to wait once per tick. It reports how late
//! the wake-up was so the engine can track jitter.
//!
//! Both real-time pacers place tick `k` at `anchor + k * dt`, computed in
//! `f64` seconds from the anchor. Neither accumulates a rounded `Duration`
//! or re-arms from the previous wake-up, so the schedule does not drift
//! from simulated time however long the trial runs.

use std::io;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::config::{Pacing, TrialConfig};
use crate::os;

/// A pacer could not honour a deadline.
#[derive(Debug, Error)]
pub enum PacingError {
    /// The wake-up came later than the configured bound.
    #[error("tick {tick} woke {lateness:?} late (bound {bound:?})")]
    DeadlineMissed {
        /// Tick whose deadline was missed, counting from 1.
        tick: u64,
        /// How late the wake-up was.
        lateness: Duration,
        /// The configured bound.
        bound: Duration,
    },
    /// The absolute sleep itself failed.
    #[error("absolute sleep failed: {0}")]
    SleepFailed(#[source] io::Error),
    /// The periodic timer was never started or its channel closed.
    #[error("periodic timer stopped")]
    TimerStopped,
}

/// Wait strategy between ticks.
pub trait Pacer: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Anchor the schedule at the current instant. Called once, right
    /// before the first tick.
    fn start(&mut self);

    /// Block until the next tick's deadline. Returns the wake-up lateness.
    ///
    /// # Errors
    ///
    /// A missed deadline or a failing OS primitive; both end the trial.
    fn wait_next(&mut self) -> Result<Duration, PacingError>;
}

/// Build the pacer selected by `config.pacing`.
pub fn pacer_for(config: &TrialConfig) -> Box<dyn Pacer> {
    let dt = config.dt;
    let bound = config.lateness_bound();
    match config.pacing {
        Pacing::FreeRun => Box::new(FreeRunPacer),
        Pacing::AbsoluteDeadline => Box::new(AbsoluteDeadlinePacer::new(dt, bound)),
        Pacing::PeriodicTimer => Box::new(PeriodicTimerPacer::new(dt, bound)),
    }
}

/// Offset of tick `tick`'s deadline from the anchor.
pub fn deadline_offset(dt: f64, tick: u64) -> Duration {
    Duration::from_secs_f64(dt * tick as f64)
}

// ── FreeRunPacer ──────────────────────────────────────────────────

/// Never waits.
#[derive(Clone, Copy, Debug, Default)]
pub struct FreeRunPacer;

impl Pacer for FreeRunPacer {
    fn name(&self) -> &'static str {
        "free-run"
    }

    fn start(&mut self) {}

    fn wait_next(&mut self) -> Result<Duration, PacingError> {
        Ok(Duration::ZERO)
    }
}

// ── AbsoluteDeadlinePacer ─────────────────────────────────────────

/// Sleeps until `start + k * dt` on the monotonic clock.
///
/// Oversleeping one tick does not shift any later tick.
#[derive(Clone, Debug)]
pub struct AbsoluteDeadlinePacer {
    dt: f64,
    bound: Duration,
    anchor: Duration,
    tick: u64,
}

impl AbsoluteDeadlinePacer {
    /// Pacer with tick `dt` seconds tolerating wake-ups up to `bound` late.
    pub fn new(dt: f64, bound: Duration) -> Self {
        Self {
            dt,
            bound,
            anchor: Duration::ZERO,
            tick: 0,
        }
    }
}

impl Pacer for AbsoluteDeadlinePacer {
    fn name(&self) -> &'static str {
        "absolute-deadline"
    }

    fn start(&mut self) {
        self.anchor = os::monotonic_now();
        self.tick = 0;
    }

    fn wait_next(&mut self) -> Result<Duration, PacingError> {
        self.tick += 1;
        let deadline = self.anchor + deadline_offset(self.dt, self.tick);
        os::sleep_until(deadline).map_err(PacingError::SleepFailed)?;
        let lateness = os::monotonic_now().saturating_sub(deadline);
        if lateness > self.bound {
            return Err(PacingError::DeadlineMissed {
                tick: self.tick,
                lateness,
                bound: self.bound,
            });
        }
        Ok(lateness)
    }
}

// ── PeriodicTimerPacer ────────────────────────────────────────────

/// Blocks on a timer channel armed for each tick's deadline.
///
/// Each wait receives from [`crossbeam_channel::at`] set to
/// `anchor + k * dt` on [`Instant`]'s clock. A tick that overran its slot
/// finds the timer already fired and returns at once; the gap between the
/// deadline and the wake-up is the lateness.
#[derive(Debug)]
pub struct PeriodicTimerPacer {
    dt: f64,
    bound: Duration,
    anchor: Option<Instant>,
    tick: u64,
}

impl PeriodicTimerPacer {
    /// Pacer with tick `dt` seconds tolerating firings up to `bound` late.
    pub fn new(dt: f64, bound: Duration) -> Self {
        Self {
            dt,
            bound,
            anchor: None,
            tick: 0,
        }
    }
}

impl Pacer for PeriodicTimerPacer {
    fn name(&self) -> &'static str {
        "periodic-timer"
    }

    fn start(&mut self) {
        self.anchor = Some(Instant::now());
        self.tick = 0;
    }

    fn wait_next(&mut self) -> Result<Duration, PacingError> {
        let anchor = self.anchor.ok_or(PacingError::TimerStopped)?;
        self.tick += 1;
        let deadline = anchor + deadline_offset(self.dt, self.tick);
        crossbeam_channel::at(deadline)
            .recv()
            .map_err(|_| PacingError::TimerStopped)?;
        let lateness = Instant::now().saturating_duration_since(deadline);
        if lateness > self.bound {
            return Err(PacingError::DeadlineMissed {
                tick: self.tick,
                lateness,
                bound: self.bound,
            });
        }
        Ok(lateness)
    }
}
