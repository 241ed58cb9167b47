//! Event counting with an optional stop limit.

use dynclamp_core::{EntityError, Event, EventKind, Parameters, SimClock};
use dynclamp_entity::{Entity, EntityCore, StepContext};

/// Counts delivered events of one kind.
///
/// With a limit, the counter emits a single `Stop` event when the count
/// reaches it, which ends the trial after the following tick. A `limit`
/// parameter set before `initialise` replaces the limit. The output is the
/// count so far.
#[derive(Debug)]
pub struct EventCounter {
    core: EntityCore,
    kind: EventKind,
    limit: Option<u64>,
    count: u64,
    stop_sent: bool,
}

impl EventCounter {
    /// Count `kind` events without ever stopping the trial.
    pub fn new(kind: EventKind) -> Self {
        Self {
            core: EntityCore::new(Parameters::new()),
            kind,
            limit: None,
            count: 0,
            stop_sent: false,
        }
    }

    /// Count `kind` events and stop the trial once `limit` have arrived.
    ///
    /// # Errors
    ///
    /// Returns `Err` if `limit` is zero.
    pub fn with_limit(kind: EventKind, limit: u64) -> Result<Self, EntityError> {
        if limit == 0 {
            return Err(EntityError::invalid("limit", 0.0, "must be at least 1"));
        }
        let mut counter = Self::new(kind);
        counter.core.params_mut().set("limit", limit as f64);
        counter.limit = Some(limit);
        Ok(counter)
    }

    /// Events counted since `initialise`.
    pub fn count(&self) -> u64 {
        self.count
    }
}

impl Entity for EventCounter {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn name(&self) -> &str {
        "EventCounter"
    }

    fn output(&self) -> f64 {
        self.count as f64
    }

    fn initialise(&mut self, _clock: &SimClock) -> Result<(), EntityError> {
        if let Some(limit) = self.core.params().get("limit") {
            if !limit.is_finite() || limit < 1.0 {
                return Err(EntityError::invalid("limit", limit, "must be at least 1"));
            }
            self.limit = Some(limit.ceil() as u64);
        }
        self.count = 0;
        self.stop_sent = false;
        Ok(())
    }

    fn step(&mut self, _ctx: &mut StepContext<'_>) -> Result<(), EntityError> {
        Ok(())
    }

    fn handle_event(&mut self, event: &Event, ctx: &mut StepContext<'_>) {
        if event.kind() != self.kind {
            return;
        }
        self.count += 1;
        if !self.stop_sent && self.limit.is_some_and(|limit| self.count >= limit) {
            log::info!(
                "{}: {} {} events, requesting stop",
                self.core.id(),
                self.count,
                self.kind
            );
            self.stop_sent = true;
            ctx.emit(EventKind::Stop, []);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dynclamp_entity::EventQueue;

    #[test]
    fn emits_one_stop_at_the_limit() {
        let mut counter = EventCounter::with_limit(EventKind::Spike, 3).unwrap();
        let queue = EventQueue::new();
        let clock = SimClock::new(1e-3);
        counter.initialise(&clock).unwrap();
        let mut ctx = StepContext::new(&clock, counter.id(), &queue);
        for _ in 0..5 {
            counter.handle_event(&Event::new(EventKind::Spike, None, 0.0), &mut ctx);
            counter.handle_event(&Event::new(EventKind::Toggle, None, 0.0), &mut ctx);
        }
        assert_eq!(counter.count(), 5);
        let emitted: Vec<_> = queue.drain().into_iter().map(|e| e.kind()).collect();
        assert_eq!(emitted, [EventKind::Stop]);
    }

    #[test]
    fn limit_parameter_applies_at_initialise() {
        let mut counter = EventCounter::new(EventKind::Spike);
        counter.core_mut().params_mut().set("limit", 2.0);
        let queue = EventQueue::new();
        let clock = SimClock::new(1e-3);
        counter.initialise(&clock).unwrap();
        let mut ctx = StepContext::new(&clock, counter.id(), &queue);
        for _ in 0..2 {
            counter.handle_event(&Event::new(EventKind::Spike, None, 0.0), &mut ctx);
        }
        assert_eq!(queue.drain().len(), 1);

        counter.core_mut().params_mut().set("limit", 0.0);
        assert!(counter.initialise(&clock).is_err());
    }

    #[test]
    fn zero_limit_is_rejected() {
        assert!(EventCounter::with_limit(EventKind::Spike, 0).is_err());
    }
}
