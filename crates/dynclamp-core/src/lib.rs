//! Core types for the dynclamp simulation core.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! values every other crate exchanges: entity identifiers, the
//! engine-owned simulation clock, the abort flag, events, named parameter
//! maps, the thread-safe delivery queue, and the error enums.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod params;
pub mod queue;

pub use clock::{AbortFlag, SharedTime, SimClock};
pub use error::{EntityError, GraphError};
pub use event::{Event, EventKind, EventParams};
pub use id::{EntityId, TickId};
pub use params::Parameters;
pub use queue::DeliveryQueue;
