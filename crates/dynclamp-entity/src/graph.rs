//! Registration-ordered container of entities and their edges.

use indexmap::IndexMap;

use dynclamp_core::{EntityError, EntityId, GraphError, SharedTime, SimClock};

use crate::dispatch::{EventQueue, EventSender};
use crate::entity::{Entity, OutputSnapshot, StepContext};

/// The computational graph of one experiment.
///
/// Entities are kept in registration order, which is also the order in
/// which they are initialised, stepped and terminated. The configuration
/// loader is expected to register them already sorted.
///
/// The graph assumes that direct-output dependencies are acyclic in
/// spirit; cycles are legal (every entity reads last tick's outputs), and
/// event cycles between mutually connected synapses go through the queue.
pub struct Graph {
    pub(crate) entities: IndexMap<EntityId, Box<dyn Entity>>,
    pub(crate) events: EventQueue,
    snapshot: OutputSnapshot,
    time: SharedTime,
}

impl Graph {
    /// An empty graph.
    pub fn new() -> Self {
        Self {
            entities: IndexMap::new(),
            events: EventQueue::new(),
            snapshot: OutputSnapshot::new(),
            time: SharedTime::new(),
        }
    }

    /// Register an entity and return its id.
    pub fn add<E: Entity>(&mut self, entity: E) -> Result<EntityId, GraphError> {
        self.add_boxed(Box::new(entity))
    }

    /// Register a boxed entity and return its id.
    pub fn add_boxed(&mut self, entity: Box<dyn Entity>) -> Result<EntityId, GraphError> {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            return Err(GraphError::DuplicateEntity(id));
        }
        log::debug!("registered {} {id}", entity.name());
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Create the directed edge `from → to`.
    ///
    /// `to` becomes a successor of `from` and `from` a predecessor of `to`,
    /// with a fresh input slot. Each side's wiring hook is told the other
    /// side's [`Capability`](crate::Capability).
    ///
    /// Returns `Ok(true)` if the edge was created, `Ok(false)` (with a
    /// warning) for a self-loop or an edge that already exists.
    pub fn connect(&mut self, from: EntityId, to: EntityId) -> Result<bool, GraphError> {
        let from_cap = self
            .entities
            .get(&from)
            .ok_or(GraphError::UnknownEntity(from))?
            .capability();
        let to_cap = self
            .entities
            .get(&to)
            .ok_or(GraphError::UnknownEntity(to))?
            .capability();

        if from == to {
            log::warn!("refusing to connect {from} to itself");
            return Ok(false);
        }

        if let Some(source) = self.entities.get_mut(&from) {
            if source.core().is_connected_to(to) {
                log::warn!("{from} is already connected to {to}");
                return Ok(false);
            }
            source.core_mut().add_post(to);
            source.accept_successor(to, to_cap);
        }
        if let Some(target) = self.entities.get_mut(&to) {
            target.core_mut().add_pre(from);
            target.accept_predecessor(from, from_cap);
        }
        log::debug!("connected {from} ({from_cap}) -> {to} ({to_cap})");
        Ok(true)
    }

    /// Number of registered entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the graph has no entities.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Whether `id` is registered.
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    /// Entity by id.
    pub fn get(&self, id: EntityId) -> Option<&dyn Entity> {
        self.entities.get(&id).map(|e| e.as_ref())
    }

    /// Mutable entity by id.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut (dyn Entity + 'static)> {
        self.entities.get_mut(&id).map(|e| e.as_mut())
    }

    /// Entities in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Entity> + '_ {
        self.entities.values().map(|e| e.as_ref())
    }

    /// Mutable entities in registration order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut (dyn Entity + 'static)> + '_ {
        self.entities.values_mut().map(|e| e.as_mut())
    }

    /// The shared event queue.
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    /// A handle for injecting events from another thread.
    pub fn event_sender(&self) -> EventSender {
        EventSender::new(self.events.clone(), self.time.clone())
    }

    /// The view of simulation time handed to producer threads.
    pub fn shared_time(&self) -> &SharedTime {
        &self.time
    }

    /// Publish the clock's time to producer threads.
    pub fn publish_time(&self, clock: &SimClock) {
        self.time.publish(clock);
    }

    /// Capture every output, then refresh every entity's input cache.
    ///
    /// The capture completes before any entity reads, which is what makes
    /// the snapshot consistent within a tick.
    pub fn read_inputs(&mut self) {
        self.snapshot.clear();
        for (id, entity) in &self.entities {
            self.snapshot.insert(*id, entity.output());
        }
        for entity in self.entities.values_mut() {
            entity.read_and_store_inputs(&self.snapshot);
        }
    }

    /// The snapshot taken by the last [`read_inputs`](Graph::read_inputs).
    pub fn snapshot(&self) -> &OutputSnapshot {
        &self.snapshot
    }

    /// Step every entity in registration order.
    ///
    /// With `first == true` calls [`Entity::first_step`] instead of
    /// [`Entity::step`]. Stops at the first failure and reports which
    /// entity failed.
    pub fn step_all(
        &mut self,
        clock: &SimClock,
        first: bool,
    ) -> Result<(), (EntityId, EntityError)> {
        for (id, entity) in self.entities.iter_mut() {
            let mut ctx = StepContext::new(clock, *id, &self.events);
            let result = if first {
                entity.first_step(&mut ctx)
            } else {
                entity.step(&mut ctx)
            };
            result.map_err(|e| (*id, e))?;
        }
        Ok(())
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("entities", &self.entities.len())
            .field("queued_events", &self.events.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Capability;
    use crate::entity::EntityCore;
    use dynclamp_core::{Event, EventKind, Parameters};
    use std::sync::{Arc, Mutex};

    type Hooks = Arc<Mutex<Vec<(EntityId, Capability)>>>;
    type Received = Arc<Mutex<Vec<EventKind>>>;

    /// Output = state[0]; step sets state[0] to the sum of inputs plus one.
    struct Adder {
        core: EntityCore,
        hooks: Hooks,
        received: Received,
    }

    impl Adder {
        fn new(initial: f64) -> Self {
            let mut core = EntityCore::with_state(Parameters::new(), 1);
            core.state_mut()[0] = initial;
            Self {
                core,
                hooks: Hooks::default(),
                received: Received::default(),
            }
        }
    }

    impl Entity for Adder {
        fn core(&self) -> &EntityCore {
            &self.core
        }
        fn core_mut(&mut self) -> &mut EntityCore {
            &mut self.core
        }
        fn name(&self) -> &str {
            "adder"
        }
        fn output(&self) -> f64 {
            self.core.state()[0]
        }
        fn capability(&self) -> Capability {
            Capability::Neuron
        }
        fn accept_successor(&mut self, successor: EntityId, capability: Capability) {
            self.hooks.lock().unwrap().push((successor, capability));
        }
        fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
            let sum = self.core.input_sum();
            self.core.state_mut()[0] = sum + 1.0;
            Ok(())
        }
        fn handle_event(&mut self, event: &Event, _ctx: &mut StepContext<'_>) {
            self.received.lock().unwrap().push(event.kind());
        }
    }

    fn output_of(graph: &Graph, id: EntityId) -> f64 {
        graph.get(id).unwrap().output()
    }

    #[test]
    fn connect_twice_creates_one_edge() {
        let mut g = Graph::new();
        let a = g.add(Adder::new(0.0)).unwrap();
        let b = g.add(Adder::new(0.0)).unwrap();
        assert_eq!(g.connect(a, b), Ok(true));
        assert_eq!(g.connect(a, b), Ok(false));
        assert_eq!(g.get(a).unwrap().core().post(), &[b]);
        assert_eq!(g.get(b).unwrap().core().pre(), &[a]);
        assert_eq!(g.get(b).unwrap().core().inputs().len(), 1);
    }

    #[test]
    fn self_connection_is_rejected() {
        let mut g = Graph::new();
        let a = g.add(Adder::new(0.0)).unwrap();
        assert_eq!(g.connect(a, a), Ok(false));
        assert!(g.get(a).unwrap().core().post().is_empty());
        assert!(g.get(a).unwrap().core().pre().is_empty());
    }

    #[test]
    fn connect_unknown_entity_fails() {
        let mut g = Graph::new();
        let a = g.add(Adder::new(0.0)).unwrap();
        let ghost = EntityId::next();
        assert_eq!(g.connect(a, ghost), Err(GraphError::UnknownEntity(ghost)));
    }

    #[test]
    fn wiring_hook_fires_once_with_capability() {
        let mut g = Graph::new();
        let src = Adder::new(0.0);
        let hooks = Arc::clone(&src.hooks);
        let a = g.add(src).unwrap();
        let b = g.add(Adder::new(0.0)).unwrap();
        g.connect(a, b).unwrap();
        g.connect(a, b).unwrap();
        assert_eq!(*hooks.lock().unwrap(), [(b, Capability::Neuron)]);
    }

    #[test]
    fn step_sees_pre_tick_outputs_only() {
        // a -> b. Both step in the same tick; b must see a's pre-step output.
        let mut g = Graph::new();
        let a = g.add(Adder::new(10.0)).unwrap();
        let b = g.add(Adder::new(0.0)).unwrap();
        g.connect(a, b).unwrap();

        let mut clock = SimClock::new(1.0);
        g.read_inputs();
        clock.advance();
        g.step_all(&clock, true).unwrap();
        // a had no inputs -> 1.0; b read a's old output 10.0 -> 11.0.
        assert_eq!(output_of(&g, a), 1.0);
        assert_eq!(output_of(&g, b), 11.0);
        assert_eq!(g.snapshot().output(a), Some(10.0));
    }

    #[test]
    fn mutating_predecessor_after_read_does_not_leak() {
        let mut g = Graph::new();
        let a = g.add(Adder::new(3.0)).unwrap();
        let b = g.add(Adder::new(0.0)).unwrap();
        g.connect(a, b).unwrap();

        let clock = SimClock::new(1.0);
        g.read_inputs();
        // Out-of-band change between the read and step phases.
        g.get_mut(a).unwrap().core_mut().state_mut()[0] = 1000.0;
        g.step_all(&clock, false).unwrap();
        assert_eq!(output_of(&g, b), 4.0);
    }

    #[test]
    fn events_go_to_successors_of_origin() {
        let mut g = Graph::new();
        let a = g.add(Adder::new(0.0)).unwrap();
        let succ = Adder::new(0.0);
        let succ_log = Arc::clone(&succ.received);
        let b = g.add(succ).unwrap();
        let bystander = Adder::new(0.0);
        let bystander_log = Arc::clone(&bystander.received);
        g.add(bystander).unwrap();
        g.connect(a, b).unwrap();

        let clock = SimClock::new(1.0);
        g.events().push(Event::new(EventKind::Trigger, Some(a), 0.0));
        g.events().push(Event::new(EventKind::Reset, Some(a), 0.0));
        let outcome = g.process_events(&clock);
        assert_eq!(outcome.events, 2);
        assert_eq!(outcome.deliveries, 2);
        assert!(!outcome.stop_requested);
        assert!(g.events().is_empty());
        assert_eq!(*succ_log.lock().unwrap(), [EventKind::Trigger, EventKind::Reset]);
        assert!(bystander_log.lock().unwrap().is_empty());
    }

    #[test]
    fn originless_events_are_broadcast() {
        let mut g = Graph::new();
        g.add(Adder::new(0.0)).unwrap();
        g.add(Adder::new(0.0)).unwrap();
        let sender = g.event_sender();
        sender.send_kind(EventKind::Stop, []);
        let outcome = g.process_events(&SimClock::new(1.0));
        assert_eq!(outcome.deliveries, 2);
        assert!(outcome.stop_requested);
    }

    #[test]
    fn events_from_unknown_origin_are_dropped() {
        let mut g = Graph::new();
        g.add(Adder::new(0.0)).unwrap();
        g.events()
            .push(Event::new(EventKind::Trigger, Some(EntityId::next()), 0.0));
        let outcome = g.process_events(&SimClock::new(1.0));
        assert_eq!(outcome.events, 1);
        assert_eq!(outcome.deliveries, 0);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let mut g = Graph::new();
        let a = Adder::new(0.0);
        let copy = Adder {
            core: a.core.clone(),
            hooks: Hooks::default(),
            received: Received::default(),
        };
        let id = g.add(a).unwrap();
        assert_eq!(g.add(copy), Err(GraphError::DuplicateEntity(id)));
    }
}
