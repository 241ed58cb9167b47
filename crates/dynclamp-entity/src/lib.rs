//! Entity contract and computational graph for dynclamp.
//!
//! An [`Entity`] is the unit of computation: it owns parameters, a state
//! vector and its graph edges, and implements the
//! read-inputs / step / output contract. The [`Graph`] owns every entity
//! in registration order, wires edges with [`Graph::connect`], takes the
//! per-tick output snapshot and dispatches queued [`Event`]s.
//!
//! [`Connection`] and [`VariableDelayConnection`] are entities that delay
//! and forward events.
//!
//! [`Event`]: dynclamp_core::Event

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod capability;
pub mod connection;
pub mod delay;
pub mod dispatch;
pub mod entity;
pub mod graph;

pub use capability::Capability;
pub use connection::{delay_steps, Connection, VariableDelayConnection};
pub use delay::{DelayGenerator, FixedDelay, NormalDelay, UniformDelay};
pub use dispatch::{DispatchOutcome, EventQueue, EventSender};
pub use entity::{Entity, EntityCore, OutputSnapshot, StepContext};
pub use graph::Graph;
