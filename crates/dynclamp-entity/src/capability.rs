//! Capability tags queried once at wiring time.

use std::fmt;

/// What role an entity plays in the graph.
///
/// [`Graph::connect`](crate::Graph::connect) hands the successor's tag to
/// the predecessor's [`accept_successor`](crate::Entity::accept_successor)
/// hook (and vice versa), so an entity can specialise its behaviour once,
/// when it is wired, instead of inspecting its neighbours every tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Capability {
    /// No special role.
    #[default]
    Generic,
    /// Has a membrane potential as its output and integrates currents.
    Neuron,
    /// Converts spikes into a conductance-driven current.
    Synapse,
    /// An ionic or injected current feeding a neuron.
    Current,
    /// Delays and forwards events.
    Connection,
    /// Produces a signal from parameters alone (constants, waveforms, spike trains).
    Generator,
    /// Backed by an external device.
    Hardware,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Generic => "generic",
            Self::Neuron => "neuron",
            Self::Synapse => "synapse",
            Self::Current => "current",
            Self::Connection => "connection",
            Self::Generator => "generator",
            Self::Hardware => "hardware",
        };
        f.write_str(s)
    }
}
