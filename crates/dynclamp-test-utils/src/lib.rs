//! Test utilities and mock types for dynclamp development.
//!
//! [`fixtures`] holds entities that count and record what the engine does
//! to them; [`mocks`] holds stand-ins for the engine's external
//! collaborators (streams and triggers).

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;
pub mod mocks;

pub use fixtures::{
    AbortAt, CountingEntity, Delivery, EventLog, FailingEntity, InputRecorder, LifecycleCounts,
    RampEntity, ScheduledEmitter,
};
pub use mocks::{MockStream, MockTrigger, StreamCounts};
