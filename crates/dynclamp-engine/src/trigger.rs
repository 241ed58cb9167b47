//! External start conditions.
//!
//! A [`Trigger`] blocks the simulation thread between initialisation and
//! the first tick until some boundary condition holds. Every
//! implementation polls the [`AbortFlag`] while waiting, so an abort
//! raised during the wait ends the trial promptly.

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use thiserror::Error;

use dynclamp_core::AbortFlag;

/// Default interval between abort-flag checks while waiting.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// How a trigger wait ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// The condition was met; start the trial.
    Fired,
    /// The abort flag was raised during the wait.
    Aborted,
}

/// The trigger source failed.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TriggerError {
    /// The acquisition device reported an error.
    #[error("trigger device error: {reason}")]
    Device {
        /// Device-specific description.
        reason: String,
    },
    /// The sending side of a software trigger went away.
    #[error("trigger source disconnected")]
    Disconnected,
}

/// Blocking start condition.
pub trait Trigger: Send {
    /// Block until the condition holds or `abort` is raised.
    ///
    /// # Errors
    ///
    /// Returns `Err` when the trigger source fails; the trial then ends
    /// without running.
    fn wait(&mut self, abort: &AbortFlag) -> Result<TriggerOutcome, TriggerError>;
}

// ── ChannelTrigger ────────────────────────────────────────────────

/// Software trigger fired by sending `()` on a channel.
#[derive(Debug)]
pub struct ChannelTrigger {
    rx: Receiver<()>,
    poll: Duration,
}

impl ChannelTrigger {
    /// A connected `(fire, trigger)` pair.
    pub fn channel() -> (Sender<()>, ChannelTrigger) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (
            tx,
            ChannelTrigger {
                rx,
                poll: DEFAULT_POLL_INTERVAL,
            },
        )
    }

    /// Change how often the abort flag is checked.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }
}

impl Trigger for ChannelTrigger {
    fn wait(&mut self, abort: &AbortFlag) -> Result<TriggerOutcome, TriggerError> {
        loop {
            if abort.is_raised() {
                return Ok(TriggerOutcome::Aborted);
            }
            match self.rx.recv_timeout(self.poll) {
                Ok(()) => return Ok(TriggerOutcome::Fired),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return Err(TriggerError::Disconnected),
            }
        }
    }
}

// ── ThresholdTrigger ──────────────────────────────────────────────

/// Reads one value from an acquisition channel.
pub trait Sampler: Send {
    /// Current value of the channel. Digital lines read `0.0` or `1.0`.
    ///
    /// # Errors
    ///
    /// Device failures.
    fn sample(&mut self) -> Result<f64, TriggerError>;
}

impl<F> Sampler for F
where
    F: FnMut() -> Result<f64, TriggerError> + Send,
{
    fn sample(&mut self) -> Result<f64, TriggerError> {
        self()
    }
}

/// Edge that fires a [`ThresholdTrigger`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TriggerCondition {
    /// Analog value crosses the threshold upwards.
    Rising(f64),
    /// Analog value crosses the threshold downwards.
    Falling(f64),
    /// Digital line goes from low to high.
    DigitalRise,
    /// Digital line goes from high to low.
    DigitalFall,
}

impl TriggerCondition {
    fn crossed(self, prev: f64, cur: f64) -> bool {
        match self {
            TriggerCondition::Rising(th) => prev < th && cur >= th,
            TriggerCondition::Falling(th) => prev > th && cur <= th,
            TriggerCondition::DigitalRise => prev < 0.5 && cur >= 0.5,
            TriggerCondition::DigitalFall => prev >= 0.5 && cur < 0.5,
        }
    }
}

/// Polls a [`Sampler`] until the configured edge is seen.
///
/// The first sample only primes the edge detector, so a line that is
/// already high when the wait starts does not count as a rising edge.
#[derive(Debug)]
pub struct ThresholdTrigger<S> {
    sampler: S,
    condition: TriggerCondition,
    poll: Duration,
}

impl<S: Sampler> ThresholdTrigger<S> {
    /// Trigger on `condition` observed through `sampler`.
    pub fn new(sampler: S, condition: TriggerCondition) -> Self {
        Self {
            sampler,
            condition,
            poll: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Change the sampling interval.
    pub fn with_poll_interval(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    /// The edge being waited for.
    pub fn condition(&self) -> TriggerCondition {
        self.condition
    }
}

impl<S: Sampler> Trigger for ThresholdTrigger<S> {
    fn wait(&mut self, abort: &AbortFlag) -> Result<TriggerOutcome, TriggerError> {
        let mut prev = self.sampler.sample()?;
        loop {
            if abort.is_raised() {
                return Ok(TriggerOutcome::Aborted);
            }
            std::thread::sleep(self.poll);
            let cur = self.sampler.sample()?;
            if self.condition.crossed(prev, cur) {
                log::debug!("trigger {:?} fired at {cur}", self.condition);
                return Ok(TriggerOutcome::Fired);
            }
            prev = cur;
        }
    }
}
