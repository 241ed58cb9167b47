//! Thread-safe double-ended delivery queue.
//!
//! [`DeliveryQueue`] is the only structure in the simulation core that is
//! mutated from several threads at once: hardware-servicing threads push
//! events while the simulation thread drains them once per tick. Every
//! mutation is serialized by one mutex, and waiters on the condition
//! variable are woken on every push.
//!
//! Poisoning is ignored: the queue's contents stay structurally valid even
//! if a visitor panicked while holding the lock.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Mutex + condition-variable guarded `VecDeque`.
#[derive(Debug)]
pub struct DeliveryQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
}

impl<T> DeliveryQueue<T> {
    /// An empty queue.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the back and wake all waiters.
    pub fn push_back(&self, item: T) {
        self.lock().push_back(item);
        self.not_empty.notify_all();
    }

    /// Prepend to the front and wake all waiters.
    pub fn push_front(&self, item: T) {
        self.lock().push_front(item);
        self.not_empty.notify_all();
    }

    /// Remove the front item, blocking while the queue is empty.
    pub fn pop_front(&self) -> T {
        let mut items = self.wait_non_empty();
        loop {
            if let Some(item) = items.pop_front() {
                return item;
            }
            items = self
                .not_empty
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the back item, blocking while the queue is empty.
    pub fn pop_back(&self) -> T {
        let mut items = self.wait_non_empty();
        loop {
            if let Some(item) = items.pop_back() {
                return item;
            }
            items = self
                .not_empty
                .wait(items)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Remove the front item, waiting at most `timeout`.
    pub fn pop_front_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut items = self.lock();
        loop {
            if let Some(item) = items.pop_front() {
                return Some(item);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            items = self
                .not_empty
                .wait_timeout(items, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Remove the front item without blocking.
    pub fn try_pop_front(&self) -> Option<T> {
        self.lock().pop_front()
    }

    /// Take every queued item in FIFO order, leaving the queue empty.
    ///
    /// Items pushed after the lock is taken are left for the next call.
    pub fn drain(&self) -> VecDeque<T> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of queued items.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Discard all queued items.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Visit every item front to back while holding the lock.
    ///
    /// Pushes from other threads block until the visitor returns, so the
    /// visitor must not push to this queue.
    pub fn for_each(&self, mut visitor: impl FnMut(&T)) {
        let items = self.lock();
        for item in items.iter() {
            visitor(item);
        }
    }

    fn wait_non_empty(&self) -> MutexGuard<'_, VecDeque<T>> {
        let items = self.lock();
        self.not_empty
            .wait_while(items, |q| q.is_empty())
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for DeliveryQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn fifo_order() {
        let q = DeliveryQueue::new();
        for i in 0..5 {
            q.push_back(i);
        }
        let drained: Vec<_> = q.drain().into_iter().collect();
        assert_eq!(drained, [0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn push_front_and_pop_back() {
        let q = DeliveryQueue::new();
        q.push_back(2);
        q.push_front(1);
        q.push_back(3);
        assert_eq!(q.len(), 3);
        assert_eq!(q.pop_back(), 3);
        assert_eq!(q.pop_front(), 1);
        assert_eq!(q.try_pop_front(), Some(2));
        assert_eq!(q.try_pop_front(), None);
    }

    #[test]
    fn blocking_pop_wakes_on_push() {
        let q = Arc::new(DeliveryQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop_front())
        };
        thread::sleep(Duration::from_millis(20));
        q.push_back(42u32);
        assert_eq!(consumer.join().unwrap(), 42);
    }

    #[test]
    fn pop_timeout_expires_on_empty() {
        let q: DeliveryQueue<u8> = DeliveryQueue::new();
        assert_eq!(q.pop_front_timeout(Duration::from_millis(5)), None);
        q.push_back(1);
        assert_eq!(q.pop_front_timeout(Duration::from_millis(5)), Some(1));
    }

    #[test]
    fn visitor_sees_all_items_in_order() {
        let q = DeliveryQueue::new();
        q.push_back('a');
        q.push_back('b');
        let mut seen = String::new();
        q.for_each(|c| seen.push(*c));
        assert_eq!(seen, "ab");
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let q = Arc::new(DeliveryQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for i in 0..100 {
                        q.push_back(p * 1000 + i);
                    }
                })
            })
            .collect();
        for h in producers {
            h.join().unwrap();
        }
        let mut all: Vec<_> = q.drain().into_iter().collect();
        assert_eq!(all.len(), 400);
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 400);
    }
}
