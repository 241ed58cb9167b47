//! Trial configuration, validation, and error types.
//!
//! [`TrialConfig`] is the builder-input for a [`Simulator`](crate::Simulator).
//! [`validate()`](TrialConfig::validate) checks it once, before any entity
//! is touched, so a bad configuration never reaches the tick loop.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

// ── Pacing ────────────────────────────────────────────────────────

/// How the tick loop waits between ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pacing {
    /// No waiting: ticks run as fast as the graph computes. Pure software
    /// simulation.
    #[default]
    FreeRun,
    /// Sleep on the monotonic clock until tick `k`'s absolute deadline,
    /// `start + k * dt`.
    AbsoluteDeadline,
    /// Block on a timer channel armed for `start + k * dt`.
    PeriodicTimer,
}

impl Pacing {
    /// Whether this backend paces ticks against wall-clock time.
    pub fn is_realtime(self) -> bool {
        !matches!(self, Pacing::FreeRun)
    }
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pacing::FreeRun => write!(f, "free-run"),
            Pacing::AbsoluteDeadline => write!(f, "absolute-deadline"),
            Pacing::PeriodicTimer => write!(f, "periodic-timer"),
        }
    }
}

// ── SchedulingPriority ────────────────────────────────────────────

/// Real-time (FIFO) scheduling priority requested for the simulation
/// thread. Valid values are `1..=99` on Linux.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SchedulingPriority(pub i32);

impl SchedulingPriority {
    /// Lowest valid real-time priority.
    pub const MIN: SchedulingPriority = SchedulingPriority(1);
    /// Highest valid real-time priority.
    pub const MAX: SchedulingPriority = SchedulingPriority(99);
}

impl fmt::Display for SchedulingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SCHED_FIFO:{}", self.0)
    }
}

// ── TrialConfig ───────────────────────────────────────────────────

/// Parameters of one trial.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialConfig {
    /// Trial length in seconds. The loop runs while the clock is at or
    /// before this time. Default: 1.0.
    pub duration: f64,
    /// Tick duration in seconds. Default: 50 µs (20 kHz).
    pub dt: f64,
    /// Inter-tick waiting strategy. Default: [`Pacing::FreeRun`].
    pub pacing: Pacing,
    /// Real-time priority to obtain before running. `None` leaves the
    /// thread's scheduling class untouched. Default: `None`.
    pub priority: Option<SchedulingPriority>,
    /// Lock the process's memory before running so page faults cannot
    /// stall a tick. Default: false.
    pub lock_memory: bool,
    /// Largest tolerated wake-up lateness for the real-time pacers.
    /// `None` means one tick. Default: `None`.
    pub max_lateness: Option<Duration>,
    /// Collect annotations from standard input while the trial runs when
    /// no other annotation source is attached. Default: false.
    pub annotations: bool,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            duration: 1.0,
            dt: 5e-5,
            pacing: Pacing::FreeRun,
            priority: None,
            lock_memory: false,
            max_lateness: None,
            annotations: false,
        }
    }
}

impl TrialConfig {
    /// A free-running configuration with the given duration and tick.
    pub fn new(duration: f64, dt: f64) -> Self {
        Self {
            duration,
            dt,
            ..Self::default()
        }
    }

    /// Check structural invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(ConfigError::InvalidTick { value: self.dt });
        }
        if !self.duration.is_finite() || self.duration < 0.0 {
            return Err(ConfigError::InvalidDuration {
                value: self.duration,
            });
        }
        if self.pacing.is_realtime() && self.tick_duration().is_zero() {
            return Err(ConfigError::TickTooShort { dt: self.dt });
        }
        if let Some(p) = self.priority {
            if p < SchedulingPriority::MIN || p > SchedulingPriority::MAX {
                return Err(ConfigError::InvalidPriority { priority: p.0 });
            }
        }
        if self.max_lateness.is_some_and(|l| l.is_zero()) {
            return Err(ConfigError::ZeroLateness);
        }
        Ok(())
    }

    /// Number of ticks a trial that is neither stopped nor aborted runs.
    ///
    /// The loop continues while `t <= duration`, so this is
    /// `floor(duration / dt) + 1`, with a small tolerance so that an exact
    /// multiple is not lost to rounding.
    pub fn total_ticks(&self) -> u64 {
        (self.duration / self.dt + 1e-9).floor() as u64 + 1
    }

    /// `dt` as a wall-clock [`Duration`], truncated to whole nanoseconds.
    ///
    /// Used for budgets and bounds only; the pacers schedule from `dt`.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(self.dt)
    }

    /// Effective lateness bound for the real-time pacers.
    pub fn lateness_bound(&self) -> Duration {
        self.max_lateness.unwrap_or_else(|| self.tick_duration())
    }
}

// ── ConfigError ───────────────────────────────────────────────────

/// A [`TrialConfig`] that cannot run.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    /// `dt` is zero, negative or not finite.
    #[error("tick duration must be finite and > 0, got {value}")]
    InvalidTick {
        /// The rejected value.
        value: f64,
    },
    /// `duration` is negative or not finite.
    #[error("trial duration must be finite and >= 0, got {value}")]
    InvalidDuration {
        /// The rejected value.
        value: f64,
    },
    /// `dt` rounds to a zero wall-clock duration under real-time pacing.
    #[error("tick duration {dt} s is below timer resolution")]
    TickTooShort {
        /// The rejected tick.
        dt: f64,
    },
    /// Priority outside `1..=99`.
    #[error("real-time priority {priority} outside 1..=99")]
    InvalidPriority {
        /// The rejected priority.
        priority: i32,
    },
    /// `max_lateness` of zero would fail every tick.
    #[error("max_lateness must be non-zero")]
    ZeroLateness,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(TrialConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_bad_tick_and_duration() {
        let mut c = TrialConfig::new(1.0, 0.0);
        assert_eq!(c.validate(), Err(ConfigError::InvalidTick { value: 0.0 }));
        c.dt = f64::NAN;
        assert!(matches!(c.validate(), Err(ConfigError::InvalidTick { .. })));
        c = TrialConfig::new(-1.0, 1e-3);
        assert_eq!(
            c.validate(),
            Err(ConfigError::InvalidDuration { value: -1.0 })
        );
    }

    #[test]
    fn rejects_out_of_range_priority() {
        let mut c = TrialConfig::default();
        c.priority = Some(SchedulingPriority(0));
        assert_eq!(
            c.validate(),
            Err(ConfigError::InvalidPriority { priority: 0 })
        );
        c.priority = Some(SchedulingPriority(80));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn rejects_zero_lateness() {
        let mut c = TrialConfig::default();
        c.max_lateness = Some(Duration::ZERO);
        assert_eq!(c.validate(), Err(ConfigError::ZeroLateness));
    }

    #[test]
    fn total_ticks_covers_the_end_time() {
        assert_eq!(TrialConfig::new(1.0, 0.1).total_ticks(), 11);
        assert_eq!(TrialConfig::new(0.3, 0.1).total_ticks(), 4);
        assert_eq!(TrialConfig::new(0.25, 0.1).total_ticks(), 3);
        assert_eq!(TrialConfig::new(0.0, 0.1).total_ticks(), 1);
    }

    #[test]
    fn lateness_defaults_to_one_tick() {
        let c = TrialConfig::new(1.0, 1e-3);
        assert_eq!(c.lateness_bound(), Duration::from_millis(1));
    }
}
