//! Listener registry for [`SyncEvent`]s.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use stockroom_core::SyncEvent;

type Listener = Arc<dyn Fn(&SyncEvent) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: Vec<(u64, Listener)>,
}

/// Fan-out of sync events to registered listeners.
///
/// Listeners run synchronously on the task that emitted the event, in
/// registration order. A listener that panics is logged and skipped; the
/// other listeners and the emitting drain pass carry on.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. It stays registered until
    /// [`Subscription::unsubscribe`] is called; dropping the handle does not
    /// remove it.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&SyncEvent) + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.listeners.push((id, Arc::new(listener)));

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every listener. Returns how many listeners
    /// panicked.
    pub fn emit(&self, event: &SyncEvent) -> usize {
        // Snapshot so listeners can subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener> = lock(&self.registry)
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        let mut panicked = 0;
        for listener in listeners {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| listener(event))) {
                panicked += 1;
                tracing::error!(
                    event = event.name(),
                    panic = panic_message(payload.as_ref()),
                    "event listener panicked"
                );
            }
        }
        panicked
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        lock(&self.registry).listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to a registered listener.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the listener. Events already being delivered may still reach
    /// it once.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).listeners.retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // Listeners never run under the lock, so a poisoned registry is still
    // consistent.
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(bus: &EventBus) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        let sub = bus.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        (count, sub)
    }

    #[test]
    fn test_emit_reaches_all_listeners() {
        let bus = EventBus::new();
        let (a, _sa) = counter(&bus);
        let (b, _sb) = counter(&bus);

        bus.emit(&SyncEvent::SyncStarted);
        bus.emit(&SyncEvent::SyncStarted);

        assert_eq!(a.load(Ordering::SeqCst), 2);
        assert_eq!(b.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (a, sub) = counter(&bus);

        bus.emit(&SyncEvent::SyncStarted);
        sub.unsubscribe();
        bus.emit(&SyncEvent::SyncStarted);

        assert_eq!(a.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_dropping_subscription_keeps_listener() {
        let bus = EventBus::new();
        let (a, sub) = counter(&bus);
        drop(sub);

        bus.emit(&SyncEvent::SyncStarted);
        assert_eq!(a.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let _bad = bus.subscribe(|_| panic!("listener bug"));
        let (good, _sub) = counter(&bus);

        let panicked = bus.emit(&SyncEvent::SyncCompleted { synced: 1, failed: 0 });

        assert_eq!(panicked, 1);
        assert_eq!(good.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(), 2);
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped() {
        let bus = EventBus::new();
        let (_, sub) = counter(&bus);
        drop(bus);
        sub.unsubscribe();
    }
}
