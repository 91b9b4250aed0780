//! Event system shared by all rampart guards.
//!
//! Every guard instance owns an [`EventBus`]: a hot single-producer,
//! multi-consumer stream of immutable lifecycle events. Subscribing returns a
//! [`Subscription`] handle; dropping the handle detaches the listener. Late
//! subscribers miss earlier events and no history is kept on the bus itself
//! (use [`crate::CircularEventConsumer`] to retain a bounded window).

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::SystemTime;

use parking_lot::{Mutex, RwLock};

/// Trait implemented by every event a guard emits.
pub trait GuardEvent: Send + Sync + fmt::Debug {
    /// Returns the type of event (e.g., "StateTransition", "Retry").
    fn event_type(&self) -> &'static str;

    /// Returns the wall-clock time at which the event was created.
    fn created_at(&self) -> SystemTime;

    /// Returns the name of the guard instance that emitted this event.
    fn guard_name(&self) -> &str;
}

/// Trait for listening to guard events.
pub trait EventListener<E>: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &E);
}

/// A simple function-based event listener.
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F> {
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<E, F> EventListener<E> for FnListener<F>
where
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.f)(event)
    }
}

struct BusShared<E> {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(u64, Arc<dyn EventListener<E>>)>>,
    // Serializes deliveries so every subscriber observes the same event order.
    order: Mutex<()>,
}

/// A per-instance hot stream of guard events.
///
/// Emission is best-effort and synchronous: listeners run on the emitting
/// thread, a panicking listener is isolated so the remaining listeners still
/// run, and no events are buffered for absent subscribers.
pub struct EventBus<E> {
    shared: Arc<BusShared<E>>,
}

impl<E> EventBus<E> {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(BusShared {
                next_id: AtomicU64::new(0),
                listeners: RwLock::new(Vec::new()),
                order: Mutex::new(()),
            }),
        }
    }

    /// Attaches a listener, returning the handle that detaches it on drop.
    pub fn subscribe<L>(&self, listener: L) -> Subscription<E>
    where
        L: EventListener<E> + 'static,
    {
        self.subscribe_arc(Arc::new(listener))
    }

    /// Attaches an already-shared listener.
    ///
    /// Useful for sinks the caller wants to keep reading from, such as a
    /// [`crate::CircularEventConsumer`].
    pub fn subscribe_arc(&self, listener: Arc<dyn EventListener<E>>) -> Subscription<E> {
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared.listeners.write().push((id, listener));
        Subscription {
            id,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Emits an event to all current subscribers.
    ///
    /// If a listener panics, the panic is caught and the remaining listeners
    /// are still called.
    pub fn emit(&self, event: &E) {
        let _order = self.shared.order.lock();
        let listeners: Vec<Arc<dyn EventListener<E>>> = self
            .shared
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    /// Returns the number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.listeners.read().len()
    }

    /// Returns true if no subscriber is attached.
    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to an active subscription; dropping it detaches the listener.
pub struct Subscription<E> {
    id: u64,
    shared: Weak<BusShared<E>>,
}

impl<E> Subscription<E> {
    /// Detaches the listener. Equivalent to dropping the handle.
    pub fn dispose(self) {}
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.listeners.write().retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::SystemTime;

    #[derive(Debug, Clone)]
    struct TestEvent {
        name: String,
        created_at: SystemTime,
    }

    impl TestEvent {
        fn new() -> Self {
            Self {
                name: "test".to_string(),
                created_at: SystemTime::now(),
            }
        }
    }

    impl GuardEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            "Test"
        }

        fn created_at(&self) -> SystemTime {
            self.created_at
        }

        fn guard_name(&self) -> &str {
            &self.name
        }
    }

    #[test]
    fn delivers_to_subscriber() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let _sub = bus.subscribe(FnListener::new(move |_: &TestEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(&TestEvent::new());
        bus.emit(&TestEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn delivers_to_multiple_subscribers() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let f = Arc::clone(&first);
        let s = Arc::clone(&second);
        let _sub1 = bus.subscribe(FnListener::new(move |_: &TestEvent| {
            f.fetch_add(1, Ordering::SeqCst);
        }));
        let _sub2 = bus.subscribe(FnListener::new(move |_: &TestEvent| {
            s.fetch_add(2, Ordering::SeqCst);
        }));

        bus.emit(&TestEvent::new());
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dropping_subscription_detaches_listener() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let sub = bus.subscribe(FnListener::new(move |_: &TestEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit(&TestEvent::new());
        drop(sub);
        assert_eq!(bus.subscriber_count(), 0);

        bus.emit(&TestEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let bus: EventBus<TestEvent> = EventBus::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let _panicky = bus.subscribe(FnListener::new(|_: &TestEvent| {
            panic!("listener failure");
        }));
        let _sub = bus.subscribe(FnListener::new(move |_: &TestEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(&TestEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn late_subscriber_misses_earlier_events() {
        let bus: EventBus<TestEvent> = EventBus::new();
        bus.emit(&TestEvent::new());

        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let _sub = bus.subscribe(FnListener::new(move |_: &TestEvent| {
            c.fetch_add(1, Ordering::SeqCst);
        }));

        bus.emit(&TestEvent::new());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
