//! Scoped "when event E fires, invalidate K and/or run F" bindings.
//!
//! An [`EventHook`] owns exactly one bus subscription for as long as it
//! lives. Dropping it is the unmount: the subscription goes away and no
//! further events reach its actions.
//!
//! # Example
//!
//! ```ignore
//! use hpbiz_realtime::hook::EventHook;
//! use hpbiz_realtime::query_key;
//!
//! let hook = EventHook::builder(&bus, "sa_company_list_refresh")
//!     .with_cache(&cache)
//!     .invalidate(query_key!["companies", page])
//!     .on_event(|payload| tracing::info!("companies changed: {}", payload))
//!     .mount();
//! ```

use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::bus::{EventBus, Listener, Subscription};
use crate::events::EventName;
use crate::query::{QueryCache, QueryKey};

/// How supplied keys are matched against cached entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidateScope {
    /// Only the structurally equal key.
    #[default]
    Exact,
    /// Every cached key starting with the supplied key.
    Prefix,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HookOptions {
    pub scope: InvalidateScope,
}

/// What a hook does when its event fires.
#[derive(Clone)]
pub enum HookAction {
    Invalidate(Vec<QueryKey>),
    Callback(Listener),
    Both(Vec<QueryKey>, Listener),
}

impl From<QueryKey> for HookAction {
    fn from(key: QueryKey) -> Self {
        HookAction::Invalidate(vec![key])
    }
}

impl From<Vec<QueryKey>> for HookAction {
    fn from(keys: Vec<QueryKey>) -> Self {
        HookAction::Invalidate(keys)
    }
}

impl From<Listener> for HookAction {
    fn from(callback: Listener) -> Self {
        HookAction::Callback(callback)
    }
}

struct HookActions {
    keys: Vec<QueryKey>,
    callback: Option<Listener>,
    scope: InvalidateScope,
    cache: Option<QueryCache>,
}

impl HookActions {
    fn run(&self, name: &EventName, payload: &Value) {
        if let Some(cache) = &self.cache {
            for key in &self.keys {
                match self.scope {
                    InvalidateScope::Exact => cache.invalidate(key),
                    InvalidateScope::Prefix => {
                        let n = cache.invalidate_prefix(key);
                        debug!("'{}' invalidated {} key(s) under {}", name, n, key);
                    }
                }
            }
        }
        if let Some(callback) = &self.callback {
            callback(payload);
        }
    }
}

/// Builder for an [`EventHook`].
pub struct EventHookBuilder {
    bus: EventBus,
    name: EventName,
    cache: Option<QueryCache>,
    keys: Vec<QueryKey>,
    callback: Option<Listener>,
    scope: InvalidateScope,
}

impl EventHookBuilder {
    pub fn with_cache(mut self, cache: &QueryCache) -> Self {
        self.cache = Some(cache.clone());
        self
    }

    pub fn invalidate(mut self, key: QueryKey) -> Self {
        self.keys.push(key);
        self
    }

    pub fn invalidate_all(mut self, keys: impl IntoIterator<Item = QueryKey>) -> Self {
        self.keys.extend(keys);
        self
    }

    pub fn scope(mut self, scope: InvalidateScope) -> Self {
        self.scope = scope;
        self
    }

    /// Callback run after the keys have been invalidated.
    pub fn on_event<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Register the subscription.
    ///
    /// # Panics
    ///
    /// Panics if keys were supplied without a cache, or if the event name is
    /// empty.
    pub fn mount(self) -> EventHook {
        assert!(
            self.keys.is_empty() || self.cache.is_some(),
            "hook for '{}' has query keys but no cache",
            self.name
        );
        let actions = Arc::new(HookActions {
            keys: self.keys,
            callback: self.callback,
            scope: self.scope,
            cache: self.cache,
        });
        let mut hook = EventHook {
            bus: self.bus,
            name: self.name,
            actions,
            subscription: None,
        };
        hook.subscribe();
        hook
    }
}

/// A mounted subscription hook. Unmounts on drop.
pub struct EventHook {
    bus: EventBus,
    name: EventName,
    actions: Arc<HookActions>,
    subscription: Option<Subscription>,
}

impl EventHook {
    pub fn builder(bus: &EventBus, name: impl Into<EventName>) -> EventHookBuilder {
        EventHookBuilder {
            bus: bus.clone(),
            name: name.into(),
            cache: None,
            keys: Vec::new(),
            callback: None,
            scope: InvalidateScope::default(),
        }
    }

    fn subscribe(&mut self) {
        let actions = Arc::clone(&self.actions);
        let name = self.name.clone();
        self.subscription = Some(
            self.bus
                .subscribe(self.name.clone(), move |payload| actions.run(&name, payload)),
        );
    }

    pub fn event_name(&self) -> &EventName {
        &self.name
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.as_ref().is_some_and(Subscription::is_active)
    }

    /// Move the hook to another event. The old subscription is removed
    /// before the new one is registered.
    pub fn rebind(&mut self, name: impl Into<EventName>) {
        let name = name.into();
        if name == self.name && self.is_mounted() {
            return;
        }
        if let Some(old) = self.subscription.take() {
            old.unsubscribe();
        }
        self.name = name;
        self.subscribe();
    }

    /// Explicit unmount; equivalent to dropping the hook.
    pub fn unmount(mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }
}

/// Function-style entry point: `(eventName, queryKeysOrCallback, options)`.
pub fn use_event(
    bus: &EventBus,
    cache: &QueryCache,
    name: impl Into<EventName>,
    action: impl Into<HookAction>,
    options: HookOptions,
) -> EventHook {
    let (keys, callback) = match action.into() {
        HookAction::Invalidate(keys) => (keys, None),
        HookAction::Callback(callback) => (Vec::new(), Some(callback)),
        HookAction::Both(keys, callback) => (keys, Some(callback)),
    };
    let mut builder = EventHook::builder(bus, name)
        .with_cache(cache)
        .invalidate_all(keys)
        .scope(options.scope);
    builder.callback = callback;
    builder.mount()
}
