//! The trial state machine.
//!
//! ```text
//! Idle → Initializing → [WaitingForTrigger] → Running → Terminating → Idle | Aborted
//! ```
//!
//! [`Simulator::run`] drives one trial on the calling thread. Every tick
//! follows the same protocol whatever the pacing backend:
//!
//! 1. dispatch queued events ([`Graph::process_events`]);
//! 2. snapshot outputs and refresh input caches ([`Graph::read_inputs`]);
//! 3. advance the clock by `dt` and publish the new time;
//! 4. step every entity in registration order (`first_step` on tick 0);
//! 5. wait for the next deadline.
//!
//! The loop runs while `t <= duration` and the abort flag is lowered.
//! Every entity whose `initialise` succeeded is terminated exactly once,
//! however the trial ends. Events queued before the trial are dispatched
//! on its first tick; events still queued when it ends are discarded.

use std::fmt;
use std::io::{self, BufRead};
use std::time::{Duration, Instant};

use dynclamp_core::{AbortFlag, SimClock};
use dynclamp_entity::Graph;

use crate::annotate::{Annotation, AnnotationCollector};
use crate::config::{ConfigError, TrialConfig};
use crate::metrics::TickMetrics;
use crate::os;
use crate::pacing;
use crate::trigger::{Trigger, TriggerOutcome};

// ── TrialPhase ────────────────────────────────────────────────────

/// Lifecycle state of a [`Simulator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrialPhase {
    /// No trial in progress; the last one (if any) succeeded.
    Idle,
    /// Calling `initialise` on every entity.
    Initializing,
    /// Blocked on the start trigger.
    WaitingForTrigger,
    /// Executing ticks.
    Running,
    /// Calling `terminate` on every initialised entity.
    Terminating,
    /// No trial in progress; the last one failed or was aborted.
    Aborted,
}

impl fmt::Display for TrialPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrialPhase::Idle => "idle",
            TrialPhase::Initializing => "initializing",
            TrialPhase::WaitingForTrigger => "waiting-for-trigger",
            TrialPhase::Running => "running",
            TrialPhase::Terminating => "terminating",
            TrialPhase::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

// ── TrialStatus ───────────────────────────────────────────────────

/// How a trial ended.
#[derive(Clone, Debug, PartialEq)]
pub enum TrialStatus {
    /// Ran to the configured duration.
    Completed,
    /// Ended early by a `Stop` event.
    Stopped,
    /// Ended early by the abort flag.
    Aborted,
    /// The configuration was rejected before anything ran.
    InvalidConfig {
        /// Validation message.
        reason: String,
    },
    /// An entity (or stream) failed to initialise.
    InitialisationFailed {
        /// Name and id of the failing component.
        entity: String,
        /// Error message.
        reason: String,
    },
    /// The requested real-time scheduling could not be obtained.
    SchedulingUnavailable {
        /// OS error message.
        reason: String,
    },
    /// The start trigger failed.
    TriggerFailed {
        /// Error message.
        reason: String,
    },
    /// An entity's step returned an error.
    StepFailed {
        /// Name and id of the failing entity.
        entity: String,
        /// Error message.
        reason: String,
    },
    /// A tick deadline was missed or the sleep primitive failed.
    DeadlineMissed {
        /// Tick at which pacing failed.
        tick: u64,
        /// Error message.
        reason: String,
    },
    /// A stream failed to start.
    StreamFailed {
        /// Name of the failing stream.
        stream: String,
        /// Error message.
        reason: String,
    },
    /// The simulation thread could not be spawned or panicked.
    ThreadFailed {
        /// Error message.
        reason: String,
    },
}

impl TrialStatus {
    /// Process-level status code: `0` for a trial that completed or was
    /// stopped by an event, a distinct non-zero value per failure cause.
    pub fn code(&self) -> i32 {
        match self {
            TrialStatus::Completed | TrialStatus::Stopped => 0,
            TrialStatus::Aborted => 1,
            TrialStatus::InvalidConfig { .. } => 2,
            TrialStatus::InitialisationFailed { .. } => 3,
            TrialStatus::SchedulingUnavailable { .. } => 4,
            TrialStatus::TriggerFailed { .. } => 5,
            TrialStatus::StepFailed { .. } => 6,
            TrialStatus::DeadlineMissed { .. } => 7,
            TrialStatus::StreamFailed { .. } => 8,
            TrialStatus::ThreadFailed { .. } => 9,
        }
    }

    /// Whether [`code`](TrialStatus::code) is zero.
    pub fn is_success(&self) -> bool {
        self.code() == 0
    }
}

impl fmt::Display for TrialStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrialStatus::Completed => write!(f, "completed"),
            TrialStatus::Stopped => write!(f, "stopped by event"),
            TrialStatus::Aborted => write!(f, "aborted"),
            TrialStatus::InvalidConfig { reason } => write!(f, "invalid configuration: {reason}"),
            TrialStatus::InitialisationFailed { entity, reason } => {
                write!(f, "{entity} failed to initialise: {reason}")
            }
            TrialStatus::SchedulingUnavailable { reason } => {
                write!(f, "real-time scheduling unavailable: {reason}")
            }
            TrialStatus::TriggerFailed { reason } => write!(f, "trigger failed: {reason}"),
            TrialStatus::StepFailed { entity, reason } => {
                write!(f, "{entity} failed to step: {reason}")
            }
            TrialStatus::DeadlineMissed { tick, reason } => {
                write!(f, "deadline missed at tick {tick}: {reason}")
            }
            TrialStatus::StreamFailed { stream, reason } => {
                write!(f, "stream {stream} failed: {reason}")
            }
            TrialStatus::ThreadFailed { reason } => write!(f, "simulation thread failed: {reason}"),
        }
    }
}

// ── TrialReport ───────────────────────────────────────────────────

/// Everything a finished trial hands back.
#[derive(Clone, Debug, PartialEq)]
pub struct TrialReport {
    /// How the trial ended.
    pub status: TrialStatus,
    /// Clock advances performed.
    pub ticks: u64,
    /// Simulation time at the end of the trial, in seconds.
    pub final_time: f64,
    /// Wall-clock duration of the whole trial, initialisation included.
    pub elapsed: Duration,
    /// Operator annotations collected while running, in arrival order.
    pub annotations: Vec<Annotation>,
    /// Tick timing.
    pub metrics: TickMetrics,
}

impl TrialReport {
    /// An empty report carrying `status`.
    pub fn new(status: TrialStatus) -> Self {
        Self {
            status,
            ticks: 0,
            final_time: 0.0,
            elapsed: Duration::ZERO,
            annotations: Vec::new(),
            metrics: TickMetrics::default(),
        }
    }

    /// Shorthand for `self.status.code()`.
    pub fn code(&self) -> i32 {
        self.status.code()
    }
}

// ── Simulator ─────────────────────────────────────────────────────

/// Runs trials over an entity [`Graph`].
pub struct Simulator {
    config: TrialConfig,
    abort: AbortFlag,
    trigger: Option<Box<dyn Trigger>>,
    annotations: Option<Box<dyn BufRead + Send>>,
    phase: TrialPhase,
}

impl Simulator {
    /// A simulator for trials described by `config`.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `config` fails [`TrialConfig::validate`].
    pub fn new(config: TrialConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            abort: AbortFlag::new(),
            trigger: None,
            annotations: None,
            phase: TrialPhase::Idle,
        })
    }

    /// Share `abort` instead of the simulator's own flag, e.g. one raised
    /// by a signal handler.
    pub fn with_abort_flag(mut self, abort: AbortFlag) -> Self {
        self.abort = abort;
        self
    }

    /// Wait for `trigger` between initialisation and the first tick.
    pub fn with_trigger(mut self, trigger: impl Trigger + 'static) -> Self {
        self.trigger = Some(Box::new(trigger));
        self
    }

    /// Collect annotations from `source` during the next trial.
    pub fn with_annotation_source(mut self, source: impl BufRead + Send + 'static) -> Self {
        self.annotations = Some(Box::new(source));
        self
    }

    /// The trial configuration.
    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// A handle on the abort flag polled by this simulator.
    pub fn abort_flag(&self) -> AbortFlag {
        self.abort.clone()
    }

    /// Current lifecycle state.
    pub fn phase(&self) -> TrialPhase {
        self.phase
    }

    /// Run one trial over `graph` on the calling thread.
    ///
    /// Never panics on entity failure; every failure is reported through
    /// [`TrialReport::status`].
    pub fn run(&mut self, graph: &mut Graph) -> TrialReport {
        let started = Instant::now();
        let mut clock = SimClock::new(self.config.dt);
        let mut report = TrialReport::new(TrialStatus::Completed);

        self.enter(TrialPhase::Initializing);
        graph.publish_time(&clock);

        let mut initialised = 0;
        let mut failure = None;
        for entity in graph.iter_mut() {
            if let Err(e) = entity.initialise(&clock) {
                let who = format!("{} {}", entity.name(), entity.id());
                log::error!("{who} failed to initialise: {e}");
                failure = Some(TrialStatus::InitialisationFailed {
                    entity: who,
                    reason: e.to_string(),
                });
                break;
            }
            initialised += 1;
        }

        report.status = match failure {
            Some(status) => status,
            None => {
                let collector = self.spawn_annotations(graph);
                let status = self.execute(graph, &mut clock, &mut report.metrics);
                if let Some(collector) = collector {
                    report.annotations = collector.finish();
                }
                status
            }
        };

        self.enter(TrialPhase::Terminating);
        for entity in graph.iter_mut().take(initialised) {
            entity.terminate();
        }
        let leftover = graph.events().len();
        if leftover > 0 {
            log::debug!("discarding {leftover} undelivered events");
            graph.events().clear();
        }

        report.ticks = clock.tick().0;
        report.final_time = clock.time();
        report.elapsed = started.elapsed();
        let done = if report.status.is_success() {
            TrialPhase::Idle
        } else {
            TrialPhase::Aborted
        };
        self.enter(done);
        log::info!(
            "trial {} after {} ticks (t={:.6} s, wall {:?})",
            report.status,
            report.ticks,
            report.final_time,
            report.elapsed
        );
        report
    }

    fn enter(&mut self, phase: TrialPhase) {
        log::info!("trial phase {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    fn spawn_annotations(&mut self, graph: &Graph) -> Option<AnnotationCollector> {
        let source: Box<dyn BufRead + Send> = match self.annotations.take() {
            Some(source) => source,
            None if self.config.annotations => Box::new(io::BufReader::new(io::stdin())),
            None => return None,
        };
        match AnnotationCollector::spawn(source, graph.shared_time().clone()) {
            Ok(collector) => Some(collector),
            Err(e) => {
                log::warn!("annotations disabled: {e}");
                None
            }
        }
    }

    /// Obtain the configured scheduling class and memory locking. Both are
    /// released when the returned guard drops.
    fn acquire_realtime(&self) -> Result<RealtimeGuard, TrialStatus> {
        let mut guard = RealtimeGuard::default();
        if let Some(priority) = self.config.priority {
            let unavailable = |e: io::Error| {
                log::error!("cannot obtain {priority}: {e}");
                TrialStatus::SchedulingUnavailable {
                    reason: format!("{priority}: {e}"),
                }
            };
            let (lo, hi) = os::priority_range().map_err(unavailable)?;
            if priority.0 < lo || priority.0 > hi {
                return Err(unavailable(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("outside supported range {lo}..={hi}"),
                )));
            }
            let previous = os::current_scheduling().map_err(unavailable)?;
            os::set_realtime_priority(priority.0).map_err(unavailable)?;
            guard.previous = Some(previous);
            log::info!("simulation thread running at {priority}");
        }
        if self.config.lock_memory {
            os::lock_memory().map_err(|e| {
                log::error!("cannot lock memory: {e}");
                TrialStatus::SchedulingUnavailable {
                    reason: format!("memory lock: {e}"),
                }
            })?;
            guard.locked = true;
        }
        Ok(guard)
    }

    fn execute(
        &mut self,
        graph: &mut Graph,
        clock: &mut SimClock,
        metrics: &mut TickMetrics,
    ) -> TrialStatus {
        let _realtime = match self.acquire_realtime() {
            Ok(guard) => guard,
            Err(status) => return status,
        };

        if self.trigger.is_some() {
            self.enter(TrialPhase::WaitingForTrigger);
        }
        if let Some(trigger) = self.trigger.as_mut() {
            match trigger.wait(&self.abort) {
                Ok(TriggerOutcome::Fired) => log::info!("trigger fired"),
                Ok(TriggerOutcome::Aborted) => {
                    log::info!("abort requested while waiting for trigger");
                    return TrialStatus::Aborted;
                }
                Err(e) => {
                    log::error!("trigger failed: {e}");
                    return TrialStatus::TriggerFailed {
                        reason: e.to_string(),
                    };
                }
            }
        }

        let mut pacer = pacing::pacer_for(&self.config);
        let budget = self.config.tick_duration();
        let total = self.config.total_ticks();
        self.enter(TrialPhase::Running);
        log::debug!(
            "running {total} ticks of {} s with {} pacing",
            self.config.dt,
            pacer.name()
        );
        pacer.start();

        for tick in 0..total {
            if self.abort.is_raised() {
                log::info!("abort requested at t={:.6}", clock.time());
                return TrialStatus::Aborted;
            }

            let compute = Instant::now();
            let dispatch = graph.process_events(clock);
            graph.read_inputs();
            clock.advance();
            graph.publish_time(clock);
            if let Err((id, e)) = graph.step_all(clock, tick == 0) {
                let name = graph.get(id).map(|e| e.name().to_owned()).unwrap_or_default();
                log::error!("{name} {id} failed at t={:.6}: {e}", clock.time());
                return TrialStatus::StepFailed {
                    entity: format!("{name} {id}"),
                    reason: e.to_string(),
                };
            }
            metrics.record_compute(compute.elapsed(), budget);

            if dispatch.stop_requested {
                log::info!("stop event at t={:.6}", clock.time());
                return TrialStatus::Stopped;
            }

            match pacer.wait_next() {
                Ok(lateness) => metrics.record_lateness(lateness),
                Err(e) => {
                    log::error!("{} pacing failed: {e}", pacer.name());
                    return TrialStatus::DeadlineMissed {
                        tick: clock.tick().0,
                        reason: e.to_string(),
                    };
                }
            }
        }
        TrialStatus::Completed
    }
}

impl fmt::Debug for Simulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulator")
            .field("config", &self.config)
            .field("phase", &self.phase)
            .field("abort", &self.abort.is_raised())
            .field("trigger", &self.trigger.is_some())
            .finish_non_exhaustive()
    }
}

// ── RealtimeGuard ─────────────────────────────────────────────────

/// Puts the thread's scheduling back and unlocks memory on drop, so a
/// trial run on the caller's thread leaves it as it found it.
#[derive(Debug, Default)]
struct RealtimeGuard {
    previous: Option<os::SchedulingState>,
    locked: bool,
}

impl Drop for RealtimeGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            match os::restore_scheduling(previous) {
                Ok(()) => log::debug!("scheduling restored"),
                Err(e) => log::warn!("cannot restore scheduling: {e}"),
            }
        }
        if self.locked {
            if let Err(e) = os::unlock_memory() {
                log::warn!("cannot unlock memory: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_are_distinct_for_failures() {
        let failures = [
            TrialStatus::Aborted,
            TrialStatus::InvalidConfig { reason: String::new() },
            TrialStatus::InitialisationFailed {
                entity: String::new(),
                reason: String::new(),
            },
            TrialStatus::SchedulingUnavailable { reason: String::new() },
            TrialStatus::TriggerFailed { reason: String::new() },
            TrialStatus::StepFailed {
                entity: String::new(),
                reason: String::new(),
            },
            TrialStatus::DeadlineMissed {
                tick: 0,
                reason: String::new(),
            },
            TrialStatus::StreamFailed {
                stream: String::new(),
                reason: String::new(),
            },
            TrialStatus::ThreadFailed { reason: String::new() },
        ];
        let mut codes: Vec<_> = failures.iter().map(TrialStatus::code).collect();
        assert!(codes.iter().all(|&c| c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), failures.len());
        assert_eq!(TrialStatus::Completed.code(), 0);
        assert_eq!(TrialStatus::Stopped.code(), 0);
    }

    #[test]
    fn new_rejects_invalid_config() {
        assert!(Simulator::new(TrialConfig::new(1.0, -1.0)).is_err());
    }

    #[test]
    fn empty_graph_completes() {
        let mut sim = Simulator::new(TrialConfig::new(0.01, 1e-3)).unwrap();
        let mut graph = Graph::new();
        let report = sim.run(&mut graph);
        assert_eq!(report.status, TrialStatus::Completed);
        assert_eq!(report.ticks, 11);
        assert!(report.final_time > 0.01);
        assert_eq!(sim.phase(), TrialPhase::Idle);
    }

    #[test]
    fn raised_flag_runs_no_ticks() {
        let abort = AbortFlag::new();
        abort.raise();
        let mut sim = Simulator::new(TrialConfig::new(1.0, 1e-3))
            .unwrap()
            .with_abort_flag(abort);
        let report = sim.run(&mut Graph::new());
        assert_eq!(report.status, TrialStatus::Aborted);
        assert_eq!(report.ticks, 0);
        assert_eq!(sim.phase(), TrialPhase::Aborted);
    }
}
