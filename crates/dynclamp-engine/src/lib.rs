//! Trial engine for dynclamp.
//!
//! [`Simulator`] runs one trial over an entity [`Graph`]: it initialises
//! every entity, optionally waits for an external trigger, executes the
//! fixed-tick loop (dispatch events → snapshot inputs → advance clock →
//! step) paced by one of the [`Pacing`] backends, and always terminates
//! every initialised entity. [`run_trial`] does the same on a dedicated
//! simulation thread and joins it. [`run_streams`] is the
//! acquisition-only counterpart for [`Stream`]s.
//!
//! The only failure surface of a trial is [`TrialReport::status`].
//!
//! [`Graph`]: dynclamp_entity::Graph

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod annotate;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod os;
pub mod pacing;
pub mod stream;
pub mod trial;
pub mod trigger;

pub use annotate::{Annotation, AnnotationCollector};
pub use config::{ConfigError, Pacing, SchedulingPriority, TrialConfig};
pub use engine::{Simulator, TrialPhase, TrialReport, TrialStatus};
pub use metrics::TickMetrics;
pub use pacing::{
    deadline_offset, AbsoluteDeadlinePacer, FreeRunPacer, Pacer, PacingError, PeriodicTimerPacer,
};
pub use stream::{run_streams, Stream, StreamError};
pub use trial::{run_trial, TrialOutcome};
pub use trigger::{
    ChannelTrigger, Sampler, ThresholdTrigger, Trigger, TriggerCondition, TriggerError,
    TriggerOutcome,
};
