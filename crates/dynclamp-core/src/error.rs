//! Error types shared by entities and the graph.
//!
//! Engine-level errors (configuration, pacing, triggers, streams) live in
//! `dynclamp-engine`; this module only holds what leaf crates need.

use thiserror::Error;

use crate::id::EntityId;

/// Errors raised by an entity during construction or its lifecycle.
///
/// An `Err` from `initialise()` or `step()` is fatal to the trial; an
/// `Err` from a constructor means the entity was never built.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EntityError {
    /// A required parameter was not supplied.
    #[error("missing parameter '{name}'")]
    MissingParameter {
        /// Parameter name.
        name: String,
    },
    /// A parameter value is outside its admissible range.
    #[error("parameter '{name}' out of range: {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// The rejected value.
        value: f64,
        /// Which bound was violated.
        reason: String,
    },
    /// One-time setup failed (device not found, channel busy, ...).
    #[error("initialisation failed: {reason}")]
    InitialisationFailed {
        /// Human-readable description.
        reason: String,
    },
    /// A step could not be completed (device write failed, ...).
    #[error("step failed: {reason}")]
    StepFailed {
        /// Human-readable description.
        reason: String,
    },
}

impl EntityError {
    /// Shorthand for [`EntityError::InvalidParameter`].
    pub fn invalid(name: &str, value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.to_string(),
            value,
            reason: reason.into(),
        }
    }
}

/// Errors from wiring the entity graph.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The id is not registered in the graph.
    #[error("entity {0} is not part of the graph")]
    UnknownEntity(EntityId),
    /// An entity with this id is already registered.
    #[error("entity {0} is already registered")]
    DuplicateEntity(EntityId),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_parameter_message() {
        let e = EntityError::invalid("tau", -1.0, "must be positive");
        assert_eq!(
            e.to_string(),
            "parameter 'tau' out of range: -1 (must be positive)"
        );
    }
}
