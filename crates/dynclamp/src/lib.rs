//! dynclamp: a real-time closed-loop simulation core for dynamic-clamp
//! electrophysiology.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all dynclamp sub-crates. For most users, adding `dynclamp` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use dynclamp::prelude::*;
//!
//! // A user entity that doubles the sum of its inputs.
//! struct Gain {
//!     core: EntityCore,
//!     out: f64,
//! }
//!
//! impl Entity for Gain {
//!     fn core(&self) -> &EntityCore { &self.core }
//!     fn core_mut(&mut self) -> &mut EntityCore { &mut self.core }
//!     fn name(&self) -> &str { "Gain" }
//!     fn output(&self) -> f64 { self.out }
//!     fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
//!         self.out = 2.0 * self.core.input_sum();
//!         Ok(())
//!     }
//! }
//!
//! let mut graph = Graph::new();
//! let source = graph.add(ConstantGenerator::new(1.5).unwrap()).unwrap();
//! let gain = graph
//!     .add(Gain { core: EntityCore::new(Parameters::new()), out: 0.0 })
//!     .unwrap();
//! let (recorder, trace) = Recorder::new();
//! let rec = graph.add(recorder).unwrap();
//! graph.connect(source, gain).unwrap();
//! graph.connect(gain, rec).unwrap();
//!
//! let mut sim = Simulator::new(TrialConfig::new(0.01, 1e-3)).unwrap();
//! let report = sim.run(&mut graph);
//! assert_eq!(report.status, TrialStatus::Completed);
//! assert_eq!(trace.len() as u64, report.ticks);
//! // The recorder sees the gain's previous output.
//! assert_eq!(trace.trace(0).last().map(|&(_, v)| v), Some(3.0));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `dynclamp-core` | IDs, events, clock, parameters, errors |
//! | [`entity`] | `dynclamp-entity` | Entity trait, graph, dispatch, connections |
//! | [`engine`] | `dynclamp-engine` | Simulator, pacing, triggers, streams |
//! | [`models`] | `dynclamp-models` | Reference generators, synapses, neurons |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Core types, IDs and errors (`dynclamp-core`).
///
/// Contains [`types::Event`], the [`types::SimClock`], the shared
/// [`types::AbortFlag`] and the [`types::EntityError`] returned by entity
/// hooks.
pub use dynclamp_core as types;

/// Entities and the computational graph (`dynclamp-entity`).
///
/// The [`entity::Entity`] trait is the main extension point for
/// user-defined models. [`entity::Connection`] delays events in flight.
pub use dynclamp_entity as entity;

/// Trial execution (`dynclamp-engine`).
///
/// [`engine::Simulator`] runs a trial on the calling thread,
/// [`engine::run_trial`] on a dedicated simulation thread.
pub use dynclamp_engine as engine;

/// Reference entity implementations (`dynclamp-models`).
pub use dynclamp_models as models;

/// Common imports for typical dynclamp usage.
///
/// ```rust
/// use dynclamp::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use dynclamp_core::{
        AbortFlag, EntityError, EntityId, Event, EventKind, Parameters, SimClock,
    };

    // Entity contract and graph
    pub use dynclamp_entity::{
        Capability, Connection, Entity, EntityCore, Graph, OutputSnapshot, StepContext,
    };

    // Engine
    pub use dynclamp_engine::{
        run_trial, Pacing, Simulator, Trigger, TrialConfig, TrialReport, TrialStatus,
    };

    // Models
    pub use dynclamp_models::{
        ConstantGenerator, EventCounter, ExponentialSynapse, LifNeuron, PoissonGenerator,
        Recorder,
    };
}
