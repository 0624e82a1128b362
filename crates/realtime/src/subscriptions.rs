//! Event-kind to handler registry.
//!
//! Handlers for a kind run in registration order, synchronously, inside
//! [`SubscriptionRegistry::dispatch`]. The handler list is snapshotted
//! before invocation so a handler may subscribe or unsubscribe without
//! deadlocking; such changes take effect from the next dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use campus_core::events::EventKind;

/// Callback invoked with the raw JSON payload of an inbound event.
pub type EventHandler = Arc<dyn Fn(&serde_json::Value) + Send + Sync>;

/// Token returned by [`SubscriptionRegistry::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind`, after any existing handlers.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&serde_json::Value) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        tracing::debug!(%kind, subscription = id.0, "Handler subscribed");
        id
    }

    /// Remove a handler. Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        for list in handlers.values_mut() {
            if let Some(pos) = list.iter().position(|(sid, _)| *sid == id) {
                list.remove(pos);
                return true;
            }
        }
        false
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Invoke every handler for `kind` with `payload`, in registration
    /// order. Returns the number of handlers invoked.
    pub fn dispatch(&self, kind: EventKind, payload: &serde_json::Value) -> usize {
        let snapshot: Vec<EventHandler> = self
            .lock()
            .get(&kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &snapshot {
            handler(payload);
        }
        snapshot.len()
    }

    fn lock(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<EventKind, Vec<(SubscriptionId, EventHandler)>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
