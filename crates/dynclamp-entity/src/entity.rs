//! The [`Entity`] trait and its shared bookkeeping.
//!
//! # Tick contract
//!
//! Every tick the engine calls, for all entities and in this order:
//!
//! 1. [`Entity::handle_event`] for each event dispatched to it;
//! 2. [`Entity::read_and_store_inputs`] with the tick's [`OutputSnapshot`];
//! 3. [`Entity::step`] (or [`Entity::first_step`] on the very first tick).
//!
//! The snapshot is captured from every entity's [`Entity::output`] before
//! any entity reads it, and `step()` only receives `&mut self` plus a
//! [`StepContext`]. An entity therefore cannot observe another entity's
//! post-step state within the same tick.

use indexmap::IndexMap;
use smallvec::SmallVec;

use dynclamp_core::{EntityError, EntityId, Event, EventKind, Parameters, SimClock};

use crate::capability::Capability;
use crate::dispatch::EventQueue;

/// Inline edge list; most entities have a handful of neighbours.
pub(crate) type Edges = SmallVec<[EntityId; 4]>;

// ── EntityCore ───────────────────────────────────────────────────

/// Identity, parameters, state and edges shared by every entity.
///
/// Concrete entities embed one `EntityCore` and expose it through
/// [`Entity::core`] / [`Entity::core_mut`]. Edges are only mutated by
/// [`Graph::connect`](crate::Graph::connect).
#[derive(Clone, Debug)]
pub struct EntityCore {
    id: EntityId,
    params: Parameters,
    state: Vec<f64>,
    pre: Edges,
    post: Edges,
    inputs: SmallVec<[f64; 4]>,
}

impl EntityCore {
    /// New core with a fresh id and an empty state vector.
    pub fn new(params: Parameters) -> Self {
        Self::with_state(params, 0)
    }

    /// New core with a fresh id and `state_len` zeroed state variables.
    pub fn with_state(params: Parameters, state_len: usize) -> Self {
        Self {
            id: EntityId::next(),
            params,
            state: vec![0.0; state_len],
            pre: Edges::new(),
            post: Edges::new(),
            inputs: SmallVec::new(),
        }
    }

    /// Process-unique id.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// Named parameters.
    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Mutable named parameters.
    pub fn params_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    /// State vector. Index 0 is the primary output for continuous entities.
    pub fn state(&self) -> &[f64] {
        &self.state
    }

    /// Mutable state vector.
    pub fn state_mut(&mut self) -> &mut [f64] {
        &mut self.state
    }

    /// Predecessors in connection order.
    pub fn pre(&self) -> &[EntityId] {
        &self.pre
    }

    /// Successors in connection order.
    pub fn post(&self) -> &[EntityId] {
        &self.post
    }

    /// Cached predecessor outputs, parallel to [`pre`](EntityCore::pre).
    pub fn inputs(&self) -> &[f64] {
        &self.inputs
    }

    /// Sum of all cached inputs.
    pub fn input_sum(&self) -> f64 {
        self.inputs.iter().sum()
    }

    /// Copy every predecessor's snapshot output into the input cache.
    ///
    /// A predecessor missing from the snapshot contributes `0.0`.
    pub fn store_inputs(&mut self, snapshot: &OutputSnapshot) {
        for (slot, pre) in self.inputs.iter_mut().zip(self.pre.iter()) {
            *slot = snapshot.output(*pre).unwrap_or(0.0);
        }
    }

    pub(crate) fn add_pre(&mut self, id: EntityId) {
        self.pre.push(id);
        self.inputs.push(0.0);
    }

    pub(crate) fn add_post(&mut self, id: EntityId) {
        self.post.push(id);
    }

    pub(crate) fn is_connected_to(&self, id: EntityId) -> bool {
        self.post.contains(&id)
    }
}

// ── OutputSnapshot ───────────────────────────────────────────────

/// Every entity's output, captured once per tick before any entity reads.
#[derive(Debug, Default)]
pub struct OutputSnapshot {
    values: IndexMap<EntityId, f64>,
}

impl OutputSnapshot {
    /// An empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Output of `id` at capture time, if it was captured.
    pub fn output(&self, id: EntityId) -> Option<f64> {
        self.values.get(&id).copied()
    }

    /// Number of captured outputs.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.values.clear();
    }

    pub(crate) fn insert(&mut self, id: EntityId, value: f64) {
        self.values.insert(id, value);
    }
}

// ── StepContext ──────────────────────────────────────────────────

/// What an entity may touch while stepping or handling an event: the
/// clock (read-only) and the event queue (append-only).
///
/// Events emitted through the context carry the current entity as origin
/// and the current clock time, and are dispatched at the start of the
/// next tick.
pub struct StepContext<'a> {
    clock: &'a SimClock,
    origin: EntityId,
    events: &'a EventQueue,
}

impl<'a> StepContext<'a> {
    /// Context for `origin`. Normally built by the graph.
    pub fn new(clock: &'a SimClock, origin: EntityId, events: &'a EventQueue) -> Self {
        Self {
            clock,
            origin,
            events,
        }
    }

    /// The simulation clock.
    pub fn clock(&self) -> &SimClock {
        self.clock
    }

    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    /// Tick duration in seconds.
    pub fn dt(&self) -> f64 {
        self.clock.dt()
    }

    /// Id of the entity this context belongs to.
    pub fn origin(&self) -> EntityId {
        self.origin
    }

    /// Emit an event originating from this entity.
    pub fn emit(&mut self, kind: EventKind, params: impl IntoIterator<Item = f64>) {
        let event = Event::new(kind, Some(self.origin), self.time()).with_params(params);
        self.events.push(event);
    }

    /// Re-issue a received event under this entity's id.
    pub fn forward(&mut self, event: &Event) {
        self.events.push(event.reissued(self.origin, self.time()));
    }
}

// ── Entity ───────────────────────────────────────────────────────

/// A node of the computational graph.
///
/// # Lifecycle
///
/// constructed → [`initialise`](Entity::initialise) →
/// [`first_step`](Entity::first_step) once, then repeated
/// [`read_and_store_inputs`](Entity::read_and_store_inputs) +
/// [`step`](Entity::step) → [`terminate`](Entity::terminate).
/// `terminate` is called exactly once for every entity whose
/// `initialise` succeeded, including after an abort.
///
/// # Object safety
///
/// The graph stores entities as `Box<dyn Entity>`; entities move onto the
/// simulation thread, hence the `Send` bound.
pub trait Entity: Send + 'static {
    /// Shared bookkeeping.
    fn core(&self) -> &EntityCore;

    /// Mutable shared bookkeeping.
    fn core_mut(&mut self) -> &mut EntityCore;

    /// Human-readable kind name for logs.
    fn name(&self) -> &str;

    /// Primary output, read by successors through the tick snapshot.
    ///
    /// Must be a pure function of the entity's own state.
    fn output(&self) -> f64;

    /// Advance internal state by one tick using the cached inputs.
    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError>;

    /// Process-unique id.
    fn id(&self) -> EntityId {
        self.core().id()
    }

    /// Role advertised to neighbours at wiring time.
    fn capability(&self) -> Capability {
        Capability::Generic
    }

    /// Called once when `successor` is connected downstream of this entity.
    fn accept_successor(&mut self, _successor: EntityId, _capability: Capability) {}

    /// Called once when `predecessor` is connected upstream of this entity.
    fn accept_predecessor(&mut self, _predecessor: EntityId, _capability: Capability) {}

    /// One-time setup before the trial loop. An `Err` aborts the trial.
    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        Ok(())
    }

    /// Refresh the input cache from the tick snapshot.
    ///
    /// Overrides may read additional ids they were told about at wiring
    /// time, but only through `snapshot`.
    fn read_and_store_inputs(&mut self, snapshot: &OutputSnapshot) {
        self.core_mut().store_inputs(snapshot);
    }

    /// The first tick of a trial. Device-backed entities configure their
    /// hardware here so it never happens inside a hot tick.
    fn first_step(&mut self, ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        self.step(ctx)
    }

    /// React to an event dispatched to this entity.
    ///
    /// The default ignores the event.
    fn handle_event(&mut self, _event: &Event, _ctx: &mut StepContext<'_>) {}

    /// Release resources (zero an output channel, close a device).
    fn terminate(&mut self) {}
}
