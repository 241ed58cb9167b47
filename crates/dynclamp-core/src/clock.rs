//! The engine-owned simulation clock and the cross-thread trial flags.
//!
//! [`SimClock`] replaces a process-wide mutable time counter: the engine
//! owns the only mutable instance and lends `&SimClock` to entities. Two
//! pieces of state cross thread boundaries without a lock:
//!
//! - [`AbortFlag`]: one-way `false -> true` within a trial, polled by the
//!   tick loop and by trigger waits.
//! - [`SharedTime`]: the last published simulation time, written by the
//!   engine thread once per tick and read by producer threads that need
//!   to timestamp what they enqueue.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::id::TickId;

/// Fixed-step simulation clock.
///
/// Time is derived from the tick counter (`t = tick * dt`) rather than
/// accumulated, so successive values advance by exactly `dt` with no
/// floating-point drift over long trials.
#[derive(Clone, Debug, PartialEq)]
pub struct SimClock {
    tick: TickId,
    dt: f64,
}

impl SimClock {
    /// Create a clock at `t = 0` with the given tick duration in seconds.
    pub fn new(dt: f64) -> Self {
        Self { tick: TickId(0), dt }
    }

    /// Current simulation time in seconds.
    pub fn time(&self) -> f64 {
        self.tick.0 as f64 * self.dt
    }

    /// Tick duration in seconds.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of clock advances since the last reset.
    pub fn tick(&self) -> TickId {
        self.tick
    }

    /// Advance by one tick. Only the engine calls this.
    pub fn advance(&mut self) {
        self.tick.0 += 1;
    }

    /// Return to `t = 0`, keeping `dt`.
    pub fn reset(&mut self) {
        self.tick = TickId(0);
    }
}

/// Cooperative cancellation flag for a trial.
///
/// Cheap to clone; every clone observes the same flag. Raising it is
/// async-signal-safe (a single atomic store), so a signal handler may
/// hold a clone. The engine never lowers the flag; call
/// [`reset`](AbortFlag::reset) between trials.
#[derive(Clone, Debug, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// A new, lowered flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the running trial stops at the next tick boundary.
    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether an abort has been requested.
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Lower the flag. Must not be called while a trial is running.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Read-mostly view of the current simulation time for other threads.
///
/// Stores the `f64` bit pattern in an atomic. Single writer (the engine
/// thread), any number of readers.
#[derive(Clone, Debug, Default)]
pub struct SharedTime(Arc<AtomicU64>);

impl SharedTime {
    /// A new view reading `0.0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the clock's current time.
    pub fn publish(&self, clock: &SimClock) {
        self.0.store(clock.time().to_bits(), Ordering::Release);
    }

    /// Last published simulation time in seconds.
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Acquire))
    }
}
