use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Weak;

use super::BusInner;
use crate::events::EventName;

/// Identifier of one registration on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Live binding between a listener and an event name.
///
/// Dropping the handle unsubscribes. [`unsubscribe`](Subscription::unsubscribe)
/// does the same explicitly and is idempotent.
#[must_use = "dropping a Subscription immediately unsubscribes its listener"]
pub struct Subscription {
    bus: Weak<BusInner>,
    name: EventName,
    id: SubscriptionId,
    active: AtomicBool,
}

impl Subscription {
    pub(super) fn new(bus: Weak<BusInner>, name: EventName, id: SubscriptionId) -> Self {
        Self {
            bus,
            name,
            id,
            active: AtomicBool::new(true),
        }
    }

    /// Remove this listener from the bus. Only the first call has an effect.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(bus) = self.bus.upgrade() {
            bus.remove(&self.name, self.id);
        }
    }

    /// False after `unsubscribe`, after `EventBus::clear`, or once the bus
    /// is gone.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
            && self
                .bus
                .upgrade()
                .is_some_and(|bus| bus.contains(&self.name, self.id))
    }

    pub fn event_name(&self) -> &EventName {
        &self.name
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
