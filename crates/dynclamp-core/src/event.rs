//! Immutable asynchronous signals exchanged between entities.

use std::fmt;

use smallvec::SmallVec;

use crate::id::EntityId;

/// Optional numeric payload of an [`Event`].
///
/// Inline for up to two values (a spike's weight, a digital edge's
/// channel), which covers every built-in kind without allocating.
pub type EventParams = SmallVec<[f64; 2]>;

/// Type tag of an [`Event`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// An action potential. Parameter 0, if present, is the synaptic weight.
    Spike,
    /// A generic trigger pulse.
    Trigger,
    /// Return the receiver to its initial state.
    Reset,
    /// Flip the receiver between active and inactive.
    Toggle,
    /// End the trial after the current tick.
    Stop,
    /// Rising edge on a digital line.
    DigitalRise,
    /// Falling edge on a digital line.
    DigitalFall,
    /// An application-defined kind. Receivers that do not recognise it
    /// log and ignore it.
    Custom(u16),
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spike => write!(f, "spike"),
            Self::Trigger => write!(f, "trigger"),
            Self::Reset => write!(f, "reset"),
            Self::Toggle => write!(f, "toggle"),
            Self::Stop => write!(f, "stop"),
            Self::DigitalRise => write!(f, "digital-rise"),
            Self::DigitalFall => write!(f, "digital-fall"),
            Self::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

/// A typed, timestamped signal.
///
/// Fields are private: once built, an event cannot be changed, only
/// cloned (a connection's delay line holds clones).
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    kind: EventKind,
    origin: Option<EntityId>,
    time: f64,
    params: EventParams,
}

impl Event {
    /// Create an event. `origin` is `None` for externally injected events.
    pub fn new(kind: EventKind, origin: Option<EntityId>, time: f64) -> Self {
        Self {
            kind,
            origin,
            time,
            params: EventParams::new(),
        }
    }

    /// Attach a parameter vector.
    pub fn with_params(mut self, params: impl IntoIterator<Item = f64>) -> Self {
        self.params = params.into_iter().collect();
        self
    }

    /// Convenience constructor for a weighted spike.
    pub fn spike(origin: Option<EntityId>, time: f64, weight: f64) -> Self {
        Self::new(EventKind::Spike, origin, time).with_params([weight])
    }

    /// Copy of this event re-issued by `origin` at `time`, keeping kind
    /// and parameters. Used by delay lines to forward what they received.
    pub fn reissued(&self, origin: EntityId, time: f64) -> Self {
        Self {
            kind: self.kind,
            origin: Some(origin),
            time,
            params: self.params.clone(),
        }
    }

    /// The type tag.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The emitting entity, if any.
    pub fn origin(&self) -> Option<EntityId> {
        self.origin
    }

    /// Simulation time at creation, in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Numeric parameters.
    pub fn params(&self) -> &[f64] {
        &self.params
    }

    /// Parameter `i`, if present.
    pub fn param(&self, i: usize) -> Option<f64> {
        self.params.get(i).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spike_carries_weight() {
        let id = EntityId::next();
        let ev = Event::spike(Some(id), 0.25, 1.5);
        assert_eq!(ev.kind(), EventKind::Spike);
        assert_eq!(ev.origin(), Some(id));
        assert_eq!(ev.time(), 0.25);
        assert_eq!(ev.param(0), Some(1.5));
        assert_eq!(ev.param(1), None);
    }

    #[test]
    fn reissue_keeps_kind_and_params() {
        let src = EntityId::next();
        let relay = EntityId::next();
        let ev = Event::new(EventKind::Custom(7), Some(src), 1.0).with_params([1.0, 2.0]);
        let fwd = ev.reissued(relay, 3.0);
        assert_eq!(fwd.kind(), EventKind::Custom(7));
        assert_eq!(fwd.origin(), Some(relay));
        assert_eq!(fwd.time(), 3.0);
        assert_eq!(fwd.params(), &[1.0, 2.0]);
    }

    #[test]
    fn kind_display() {
        assert_eq!(EventKind::DigitalRise.to_string(), "digital-rise");
        assert_eq!(EventKind::Custom(3).to_string(), "custom(3)");
    }
}
