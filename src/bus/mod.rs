//! In-process fan-out of named server events.
//!
//! The bus decouples the stream transport from its consumers: the
//! connection manager publishes, hooks and views subscribe.
//!
//! # Invariants
//!
//! 1. Listeners for one name are invoked in registration order.
//! 2. Every `subscribe` is independent; identical callbacks are not merged.
//! 3. `publish` iterates a snapshot taken when it starts. Listeners removed
//!    mid-publish still fire for that call, listeners added mid-publish do not.
//! 4. A panicking listener is logged and skipped; the rest still run.
//! 5. Listeners run outside the registry lock, so they may subscribe,
//!    unsubscribe, or publish re-entrantly.

mod subscription;

pub use subscription::{Subscription, SubscriptionId};

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{error, trace, warn};

use crate::events::{decode_or_default, EventEnvelope, EventName, ServerEventKind};

/// Callback invoked with an event payload.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<EventName, Vec<(SubscriptionId, Listener)>>,
}

#[derive(Default)]
pub(crate) struct BusInner {
    registry: Mutex<Registry>,
}

impl BusInner {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        // Listeners never run under the lock, so poisoning cannot leave the
        // registry half-updated.
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn contains(&self, name: &EventName, id: SubscriptionId) -> bool {
        self.lock()
            .listeners
            .get(name)
            .is_some_and(|entries| entries.iter().any(|(entry_id, _)| *entry_id == id))
    }

    pub(crate) fn remove(&self, name: &EventName, id: SubscriptionId) -> bool {
        let mut registry = self.lock();
        let Some(entries) = registry.listeners.get_mut(name) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            registry.listeners.remove(name);
        }
        removed
    }
}

/// Publish/subscribe registry keyed by event name. Cheap to clone; clones
/// share the same registry.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` under `name`.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn subscribe<F>(&self, name: impl Into<EventName>, listener: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribe_listener(name.into(), Arc::new(listener))
    }

    /// Register an already shared listener.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty.
    pub fn subscribe_listener(&self, name: EventName, listener: Listener) -> Subscription {
        assert!(!name.is_empty(), "event name must not be empty");

        let mut registry = self.inner.lock();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry
            .listeners
            .entry(name.clone())
            .or_default()
            .push((id, listener));
        drop(registry);

        trace!("Subscribed {:?} to '{}'", id, name);
        Subscription::new(Arc::downgrade(&self.inner), name, id)
    }

    /// Subscribe with the payload decoded into the registered shape of `E`.
    ///
    /// Payloads that do not match are logged and not delivered. A frame
    /// without data delivers the payload's default.
    pub fn subscribe_typed<E, F>(&self, listener: F) -> Subscription
    where
        E: ServerEventKind,
        F: Fn(E::Payload) + Send + Sync + 'static,
    {
        self.subscribe(E::NAME, move |payload: &Value| {
            match decode_or_default::<E::Payload>(E::NAME, payload) {
                Ok(decoded) => listener(decoded),
                Err(e) => warn!("Dropping '{}' event for typed listener: {}", E::NAME, e),
            }
        })
    }

    /// Invoke every listener registered for `name` with `payload`.
    pub fn publish(&self, name: &str, payload: &Value) {
        let snapshot: Vec<(SubscriptionId, Listener)> = {
            let registry = self.inner.lock();
            match registry.listeners.get(name) {
                Some(entries) => entries.clone(),
                None => return,
            }
        };

        trace!("Publishing '{}' to {} listener(s)", name, snapshot.len());
        for (id, listener) in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| listener(payload)));
            if let Err(panic) = result {
                error!(
                    "Listener {:?} for '{}' panicked: {}",
                    id,
                    name,
                    panic_message(panic.as_ref())
                );
            }
        }
    }

    pub fn publish_envelope(&self, envelope: &EventEnvelope) {
        self.publish(envelope.name.as_str(), &envelope.payload);
    }

    pub fn listener_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .listeners
            .get(name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Drop every registration. Outstanding handles become no-ops.
    pub fn clear(&self) {
        self.inner.lock().listeners.clear();
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Listener) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_clone = log.clone();
        let make = move |tag: &str| -> Listener {
            let log = log_clone.clone();
            let tag = tag.to_string();
            Arc::new(move |_: &Value| log.lock().unwrap().push(tag.clone()))
        };
        (log, make)
    }

    #[test]
    fn test_publish_in_registration_order() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.subscribe_listener("e".into(), make("a"));
        let _b = bus.subscribe_listener("e".into(), make("b"));
        let _c = bus.subscribe_listener("e".into(), make("c"));

        bus.publish("e", &json!({}));
        assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_publish_without_listeners_is_noop() {
        let bus = EventBus::new();
        bus.publish("nobody", &Value::Null);
        assert_eq!(bus.listener_count("nobody"), 0);
    }

    #[test]
    fn test_unsubscribe_removes_only_that_listener() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let shared = make("dup");
        let first = bus.subscribe_listener("e".into(), shared.clone());
        let _second = bus.subscribe_listener("e".into(), shared);

        first.unsubscribe();
        first.unsubscribe();

        assert_eq!(bus.listener_count("e"), 1);
        bus.publish("e", &Value::Null);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_drop_unsubscribes() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe("e", |_| {});
            assert_eq!(bus.listener_count("e"), 1);
        }
        assert_eq!(bus.listener_count("e"), 0);
    }

    #[test]
    fn test_panicking_listener_is_isolated() {
        let bus = EventBus::new();
        let (log, make) = recorder();
        let _a = bus.subscribe_listener("e".into(), make("a"));
        let _b = bus.subscribe("e", |_| panic!("listener failure"));
        let _c = bus.subscribe_listener("e".into(), make("c"));

        bus.publish("e", &Value::Null);
        assert_eq!(*log.lock().unwrap(), vec!["a", "c"]);
    }

    #[test]
    fn test_snapshot_semantics_during_publish() {
        let bus = EventBus::new();
        let (log, make) = recorder();

        let late: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let bus_clone = bus.clone();
        let late_clone = late.clone();
        let victim_clone = victim.clone();
        let late_listener = make("late");
        let _first = bus.subscribe("e", move |_| {
            if let Some(sub) = victim_clone.lock().unwrap().as_ref() {
                sub.unsubscribe();
            }
            let sub = bus_clone.subscribe_listener("e".into(), late_listener.clone());
            *late_clone.lock().unwrap() = Some(sub);
        });
        *victim.lock().unwrap() = Some(bus.subscribe_listener("e".into(), make("victim")));

        bus.publish("e", &Value::Null);
        // Removed mid-publish still fires; added mid-publish does not.
        assert_eq!(*log.lock().unwrap(), vec!["victim"]);
        assert_eq!(bus.listener_count("e"), 2);
    }

    #[test]
    #[should_panic(expected = "event name must not be empty")]
    fn test_empty_name_panics() {
        let bus = EventBus::new();
        let _sub = bus.subscribe("", |_| {});
    }

    #[test]
    fn test_unsubscribe_after_bus_dropped_is_noop() {
        let bus = EventBus::new();
        let sub = bus.subscribe("e", |_| {});
        drop(bus);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }

    #[test]
    fn test_clear_removes_everything() {
        let bus = EventBus::new();
        let a = bus.subscribe("a", |_| {});
        let _b = bus.subscribe("b", |_| {});
        assert!(a.is_active());
        bus.clear();
        assert_eq!(bus.listener_count("a"), 0);
        assert_eq!(bus.listener_count("b"), 0);
        assert!(!a.is_active());
    }
}
