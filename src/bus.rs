//! In-process publish/subscribe for [`DispatchEvent`]s.
//!
//! Delivery is synchronous: `publish` runs every handler registered for the
//! event's type, in registration order, on the caller's thread. There is no
//! queue, persistence, or retry; a late subscriber never sees a past event.
//! A failing or panicking handler is logged and skipped; the publisher and
//! the remaining handlers are unaffected.

use crate::error::Result;
use crate::events::{DispatchEvent, EventType};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, warn};

/// Event handler callback.
pub type Handler = Arc<dyn Fn(&DispatchEvent) -> Result<()> + Send + Sync>;

struct Registration {
    id: u64,
    event_type: EventType,
    handler: Handler,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<Registration>,
}

/// Cloneable handle to a shared handler registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`].
///
/// Dropping it leaves the handler registered; call
/// [`unsubscribe`](Subscription::unsubscribe) to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    /// Remove the handler. Events published afterwards are not delivered to it.
    pub fn unsubscribe(self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).handlers.retain(|r| r.id != self.id);
        }
    }
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    // A panicking handler never runs under this lock, but recover anyway.
    registry.lock().unwrap_or_else(|poison| poison.into_inner())
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for events of `event_type`.
    pub fn subscribe<F>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(&DispatchEvent) -> Result<()> + Send + Sync + 'static,
    {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry.handlers.push(Registration {
            id,
            event_type,
            handler: Arc::new(handler),
        });

        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Deliver `event` to every handler registered for its type.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn publish(&self, event: &DispatchEvent) -> usize {
        // Snapshot so handlers may subscribe or publish re-entrantly.
        let handlers: Vec<Handler> = lock(&self.registry)
            .handlers
            .iter()
            .filter(|r| r.event_type == event.event_type)
            .map(|r| Arc::clone(&r.handler))
            .collect();

        if handlers.is_empty() {
            debug!(event_type = %event.event_type, "no subscribers for event");
            return 0;
        }

        let mut delivered = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    warn!(event_type = %event.event_type, event_id = %event.id, error = %e, "event handler failed");
                }
                Err(_) => {
                    warn!(event_type = %event.event_type, event_id = %event.id, "event handler panicked");
                }
            }
        }
        delivered
    }

    /// Publish a batch in order.
    pub fn publish_all(&self, events: &[DispatchEvent]) {
        for event in events {
            self.publish(event);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.registry).handlers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrewError;
    use chrono::Utc;

    fn event(event_type: EventType) -> DispatchEvent {
        DispatchEvent::new("e-1", event_type, "alpha", Utc::now())
    }

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&DispatchEvent) -> Result<()> + Send + Sync>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_for_factory = Arc::clone(&seen);
        let factory = move |label: &str| {
            let seen = Arc::clone(&seen_for_factory);
            let label = label.to_string();
            Box::new(move |_: &DispatchEvent| {
                seen.lock().unwrap().push(label.clone());
                Ok(())
            }) as Box<dyn Fn(&DispatchEvent) -> Result<()> + Send + Sync>
        };
        (seen, factory)
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let (seen, make) = recorder();
        bus.subscribe(EventType::TaskCreated, make("first"));
        bus.subscribe(EventType::TaskCreated, make("second"));
        bus.subscribe(EventType::TaskCompleted, make("other-type"));

        let delivered = bus.publish(&event(EventType::TaskCreated));

        assert_eq!(delivered, 2);
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_failing_handlers_do_not_stop_siblings() {
        let bus = EventBus::new();
        let (seen, make) = recorder();
        bus.subscribe(EventType::TaskClaimed, |_| {
            Err(CrewError::ActionFailed("boom".to_string()))
        });
        bus.subscribe(EventType::TaskClaimed, |_| panic!("handler bug"));
        bus.subscribe(EventType::TaskClaimed, make("survivor"));

        let delivered = bus.publish(&event(EventType::TaskClaimed));

        assert_eq!(delivered, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let (seen, make) = recorder();
        let sub = bus.subscribe(EventType::MessageSent, make("gone"));
        bus.subscribe(EventType::MessageSent, make("kept"));

        sub.unsubscribe();
        bus.publish(&event(EventType::MessageSent));

        assert_eq!(*seen.lock().unwrap(), vec!["kept"]);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_late_subscriber_sees_no_past_events() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(&event(EventType::TeamCreated)), 0);

        let (seen, make) = recorder();
        bus.subscribe(EventType::TeamCreated, make("late"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handlers_may_publish_reentrantly() {
        let bus = EventBus::new();
        let (seen, make) = recorder();
        let inner_bus = bus.clone();
        bus.subscribe(EventType::TaskCompleted, move |e| {
            let mut next = e.clone();
            next.event_type = EventType::TaskUnblocked;
            inner_bus.publish(&next);
            Ok(())
        });
        bus.subscribe(EventType::TaskUnblocked, make("unblocked"));

        bus.publish(&event(EventType::TaskCompleted));

        assert_eq!(*seen.lock().unwrap(), vec!["unblocked"]);
    }
}
