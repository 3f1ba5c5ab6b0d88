use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use super::lock;
use crate::storage::StorageKey;

/// Callback invoked with the key that changed.
pub type Listener = Arc<dyn Fn(&StorageKey) + Send + Sync>;

#[derive(Default)]
struct BusInner {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<StorageKey, Vec<(u64, Listener)>>>,
}

/// Publish/subscribe keyed by storage key.
///
/// Listeners run synchronously inside [`ChangeBus::publish`], in registration
/// order. A panicking listener is logged and skipped; the rest still run.
#[derive(Clone, Default)]
pub struct ChangeBus {
    inner: Arc<BusInner>,
}

/// Registration handle. Dropping it (or calling
/// [`Subscription::unsubscribe`]) removes the listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    bus: Weak<BusInner>,
    key: StorageKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.bus.upgrade() else {
            return;
        };
        let mut listeners = lock(&inner.listeners);
        if let Some(entries) = listeners.get_mut(&self.key) {
            entries.retain(|(id, _)| *id != self.id);
            if entries.is_empty() {
                listeners.remove(&self.key);
            }
        }
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, key: StorageKey, listener: F) -> Subscription
    where
        F: Fn(&StorageKey) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners)
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            bus: Arc::downgrade(&self.inner),
            key,
            id,
        }
    }

    /// Notify every listener registered for `key`.
    ///
    /// Returns how many listeners completed without panicking.
    pub fn publish(&self, key: &StorageKey) -> usize {
        // Snapshot so listeners may (un)subscribe without deadlocking
        let snapshot: Vec<Listener> = match lock(&self.inner.listeners).get(key) {
            Some(entries) => entries.iter().map(|(_, l)| Arc::clone(l)).collect(),
            None => return 0,
        };

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(key))) {
                Ok(()) => delivered += 1,
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!(key = %key, error = %message, "Change listener panicked");
                }
            }
        }
        tracing::trace!(key = %key, delivered, "Published change");
        delivered
    }

    pub fn listener_count(&self, key: &StorageKey) -> usize {
        lock(&self.inner.listeners).get(key).map_or(0, Vec::len)
    }
}
