//! Acquisition-only trials.
//!
//! A [`Stream`] is a free-running producer, typically a hardware
//! acquisition task, that does its own timing once started. The engine
//! only sequences its lifecycle: initialise all, start all, wait for the
//! trial to end, stop all, terminate all. There is no tick loop.

use std::time::{Duration, Instant};

use thiserror::Error;

use dynclamp_core::AbortFlag;

use crate::engine::{TrialReport, TrialStatus};

/// Interval at which [`run_streams`] checks for abort and completion.
const STREAM_POLL: Duration = Duration::from_millis(10);

/// A stream could not be brought up.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum StreamError {
    /// Opening the device or the output destination failed.
    #[error("stream initialisation failed: {reason}")]
    Initialisation {
        /// Human-readable cause.
        reason: String,
    },
    /// Starting acquisition failed.
    #[error("stream start failed: {reason}")]
    Start {
        /// Human-readable cause.
        reason: String,
    },
}

/// A self-timed data producer.
pub trait Stream: Send {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Prepare to write into `destination` (a file name or device path).
    ///
    /// # Errors
    ///
    /// An `Err` aborts the trial before any stream starts.
    fn initialise(&mut self, destination: &str) -> Result<(), StreamError>;

    /// Begin producing.
    ///
    /// # Errors
    ///
    /// An `Err` stops every stream already started.
    fn start(&mut self) -> Result<(), StreamError>;

    /// Whether the stream is still producing. A stream may finish on its
    /// own before the trial ends.
    fn is_running(&self) -> bool;

    /// Stop producing. Called once for every started stream.
    fn stop(&mut self);

    /// Release resources. Called once for every initialised stream.
    fn terminate(&mut self);
}

/// Run `streams` for `duration` seconds of wall-clock time, writing to
/// `destination`.
///
/// The wait ends early when every stream has finished on its own or
/// `abort` is raised. Initialised streams are always terminated.
pub fn run_streams(
    streams: &mut [Box<dyn Stream>],
    duration: f64,
    destination: &str,
    abort: &AbortFlag,
) -> TrialReport {
    let started = Instant::now();
    let mut report = TrialReport::new(TrialStatus::Completed);

    if !duration.is_finite() || duration < 0.0 {
        report.status = TrialStatus::InvalidConfig {
            reason: format!("trial duration must be finite and >= 0, got {duration}"),
        };
        return report;
    }

    let mut initialised = 0;
    for stream in streams.iter_mut() {
        if let Err(e) = stream.initialise(destination) {
            log::error!("{} failed to initialise: {e}", stream.name());
            report.status = TrialStatus::InitialisationFailed {
                entity: stream.name().to_owned(),
                reason: e.to_string(),
            };
            break;
        }
        initialised += 1;
    }

    if initialised == streams.len() {
        report.status = acquire(streams, Duration::from_secs_f64(duration), abort);
    }

    for stream in streams.iter_mut().take(initialised) {
        stream.terminate();
    }
    report.elapsed = started.elapsed();
    report.final_time = report.elapsed.as_secs_f64();
    log::info!(
        "stream trial finished in {:?}: {}",
        report.elapsed,
        report.status
    );
    report
}

fn acquire(streams: &mut [Box<dyn Stream>], duration: Duration, abort: &AbortFlag) -> TrialStatus {
    let mut started = 0;
    let mut status = TrialStatus::Completed;
    for stream in streams.iter_mut() {
        if let Err(e) = stream.start() {
            log::error!("{} failed to start: {e}", stream.name());
            status = TrialStatus::StreamFailed {
                stream: stream.name().to_owned(),
                reason: e.to_string(),
            };
            break;
        }
        started += 1;
    }

    if started == streams.len() {
        let deadline = Instant::now() + duration;
        loop {
            if abort.is_raised() {
                log::info!("stream trial aborted");
                status = TrialStatus::Aborted;
                break;
            }
            let now = Instant::now();
            if now >= deadline || streams.iter().all(|s| !s.is_running()) {
                break;
            }
            std::thread::sleep(STREAM_POLL.min(deadline - now));
        }
    }

    for stream in streams.iter_mut().take(started) {
        stream.stop();
    }
    status
}
