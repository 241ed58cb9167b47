//! Event queueing and once-per-tick dispatch.
//!
//! All events, whether emitted by an entity during its step or injected
//! by a hardware-servicing thread, land in one [`EventQueue`] backed by a
//! [`DeliveryQueue`]. At the top of every tick
//! [`Graph::process_events`] drains what is queued at that moment and
//! delivers each event, in enqueue order, to every successor of its
//! origin. Events produced while dispatching wait for the next tick.

use std::collections::VecDeque;
use std::sync::Arc;

use dynclamp_core::{DeliveryQueue, Event, EventKind, SharedTime, SimClock};

use crate::entity::{Edges, StepContext};
use crate::graph::Graph;

/// Multi-producer event queue shared by the graph and its producers.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    inner: Arc<DeliveryQueue<Event>>,
}

impl EventQueue {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event. Thread-safe.
    pub fn push(&self, event: Event) {
        self.inner.push_back(event);
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether no event is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Take every queued event in FIFO order.
    pub fn drain(&self) -> VecDeque<Event> {
        self.inner.drain()
    }

    /// Discard all queued events.
    pub fn clear(&self) {
        self.inner.clear();
    }
}

/// Handle for injecting events from outside the simulation thread.
///
/// Cheap to clone and `Send`. Events built with
/// [`send_kind`](EventSender::send_kind) are stamped with the last time
/// the engine published, and have no origin, so they are broadcast to
/// every entity.
#[derive(Clone, Debug)]
pub struct EventSender {
    queue: EventQueue,
    time: SharedTime,
}

impl EventSender {
    pub(crate) fn new(queue: EventQueue, time: SharedTime) -> Self {
        Self { queue, time }
    }

    /// Enqueue a fully built event.
    pub fn send(&self, event: Event) {
        self.queue.push(event);
    }

    /// Enqueue an originless event stamped with the current simulation time.
    pub fn send_kind(&self, kind: EventKind, params: impl IntoIterator<Item = f64>) {
        self.queue
            .push(Event::new(kind, None, self.time.get()).with_params(params));
    }
}

/// Summary of one [`Graph::process_events`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// Events taken from the queue.
    pub events: usize,
    /// `handle_event` invocations performed.
    pub deliveries: usize,
    /// A [`EventKind::Stop`] event was among them.
    pub stop_requested: bool,
}

impl Graph {
    /// Deliver every currently queued event.
    ///
    /// An event with an origin goes to each of the origin's successors in
    /// connection order; an originless event goes to every entity in
    /// registration order. Events whose origin is not in the graph are
    /// logged and dropped.
    pub fn process_events(&mut self, clock: &SimClock) -> DispatchOutcome {
        let pending = self.events.drain();
        let mut outcome = DispatchOutcome {
            events: pending.len(),
            ..DispatchOutcome::default()
        };

        for event in pending {
            if event.kind() == EventKind::Stop {
                outcome.stop_requested = true;
            }

            let targets: Edges = match event.origin() {
                Some(origin) => match self.entities.get(&origin) {
                    Some(sender) => sender.core().post().iter().copied().collect(),
                    None => {
                        log::warn!(
                            "dropping {} event from {origin}: origin not in graph",
                            event.kind()
                        );
                        continue;
                    }
                },
                None => self.entities.keys().copied().collect(),
            };

            for target in targets {
                if let Some(entity) = self.entities.get_mut(&target) {
                    let mut ctx = StepContext::new(clock, target, &self.events);
                    entity.handle_event(&event, &mut ctx);
                    outcome.deliveries += 1;
                }
            }
        }

        if outcome.events > 0 {
            log::trace!(
                "t={:.6}: dispatched {} events ({} deliveries)",
                clock.time(),
                outcome.events,
                outcome.deliveries
            );
        }
        outcome
    }
}
