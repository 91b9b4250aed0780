//! Bounded event sink for inspecting recent guard activity.
//!
//! In-memory buffer, not a persistent log: events are lost on process restart
//! and the oldest event is silently dropped once capacity is reached.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::events::EventListener;

/// A ring-buffer event sink of fixed capacity.
///
/// Subscribe it to a guard's event bus via
/// [`EventBus::subscribe_arc`](crate::EventBus::subscribe_arc) and read back
/// the retained window with [`buffered_events`](Self::buffered_events).
pub struct CircularEventConsumer<E> {
    events: Mutex<VecDeque<E>>,
    capacity: usize,
    total_dropped: AtomicU64,
}

impl<E> CircularEventConsumer<E> {
    /// Creates a new consumer retaining at most `capacity` events.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            events: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            total_dropped: AtomicU64::new(0),
        }
    }

    /// Current number of buffered events.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Maximum number of retained events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events evicted because the buffer was full.
    pub fn total_dropped(&self) -> u64 {
        self.total_dropped.load(Ordering::Relaxed)
    }
}

impl<E: Clone> CircularEventConsumer<E> {
    /// Returns a snapshot of the buffered events in insertion order.
    pub fn buffered_events(&self) -> Vec<E> {
        self.events.lock().iter().cloned().collect()
    }
}

impl<E> EventListener<E> for CircularEventConsumer<E>
where
    E: Clone + Send + Sync,
{
    fn on_event(&self, event: &E) {
        let mut events = self.events.lock();
        if events.len() >= self.capacity {
            events.pop_front();
            self.total_dropped.fetch_add(1, Ordering::Relaxed);
        }
        events.push_back(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_events_in_insertion_order() {
        let consumer: CircularEventConsumer<u32> = CircularEventConsumer::new(5);
        for i in 0..3 {
            consumer.on_event(&i);
        }
        assert_eq!(consumer.buffered_events(), vec![0, 1, 2]);
        assert_eq!(consumer.len(), 3);
        assert_eq!(consumer.total_dropped(), 0);
    }

    #[test]
    fn drops_oldest_on_overflow() {
        let consumer: CircularEventConsumer<u32> = CircularEventConsumer::new(3);
        for i in 0..5 {
            consumer.on_event(&i);
        }
        assert_eq!(consumer.buffered_events(), vec![2, 3, 4]);
        assert_eq!(consumer.len(), 3);
        assert_eq!(consumer.total_dropped(), 2);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn zero_capacity_is_rejected() {
        let _ = CircularEventConsumer::<u32>::new(0);
    }
}
