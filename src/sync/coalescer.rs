use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use super::lock;
use crate::storage::{KeyedStore, StorageError, StorageKey};

/// Outcome of one underlying read, shared by every caller that joined it.
/// `None` means the read failed.
type PendingRead = Shared<BoxFuture<'static, Option<Value>>>;

/// Either a cached value or the read to await (joined or newly started).
enum Lookup {
    Hit(Value),
    Pending(PendingRead),
}

#[derive(Default)]
struct CoalescerState {
    cache: HashMap<StorageKey, Value>,
    /// Each entry is tagged so a completion can tell whether a write or
    /// invalidation replaced it while it was suspended.
    inflight: HashMap<StorageKey, (u64, PendingRead)>,
}

/// Per-key value cache with at most one in-flight read per key.
#[derive(Clone)]
pub struct ReadCoalescer {
    store: KeyedStore,
    state: Arc<Mutex<CoalescerState>>,
    next_read: Arc<AtomicU64>,
}

impl ReadCoalescer {
    pub fn new(store: KeyedStore) -> Self {
        Self {
            store,
            state: Arc::new(Mutex::new(CoalescerState::default())),
            next_read: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cached value, or the result of the single in-flight read for `key`.
    ///
    /// Never fails: a failed read is logged and yields `default`, and nothing
    /// is cached so the next call retries. Callers joining an in-flight read
    /// share its outcome, including the default of the caller that started it
    /// when the key is absent.
    pub async fn get(&self, key: &StorageKey, default: Value) -> Value {
        match self.lookup(key, &default) {
            Lookup::Hit(value) => value,
            Lookup::Pending(pending) => pending.await.unwrap_or(default),
        }
    }

    /// Like [`get`](Self::get) but reports a failed read instead of
    /// substituting the default. Used by read-modify-write paths, which must
    /// not write back over data they could not see.
    pub async fn try_get(&self, key: &StorageKey, default: Value) -> Result<Value, StorageError> {
        match self.lookup(key, &default) {
            Lookup::Hit(value) => Ok(value),
            Lookup::Pending(pending) => pending
                .await
                .ok_or_else(|| StorageError::read(key, "read failed; see earlier log")),
        }
    }

    /// Cached value without I/O.
    pub fn peek(&self, key: &StorageKey) -> Option<Value> {
        lock(&self.state).cache.get(key).cloned()
    }

    pub fn is_inflight(&self, key: &StorageKey) -> bool {
        lock(&self.state).inflight.contains_key(key)
    }

    /// Record a value that was just persisted. Any read still in flight for
    /// the key is detached so its stale result is not cached.
    pub(crate) fn store_written(&self, key: &StorageKey, value: Value) {
        let mut state = lock(&self.state);
        state.inflight.remove(key);
        state.cache.insert(key.clone(), value);
    }

    /// Forget `key` so the next read goes to storage.
    pub(crate) fn invalidate(&self, key: &StorageKey) {
        let mut state = lock(&self.state);
        state.inflight.remove(key);
        state.cache.remove(key);
    }

    fn lookup(&self, key: &StorageKey, default: &Value) -> Lookup {
        let mut state = lock(&self.state);
        if let Some(value) = state.cache.get(key) {
            return Lookup::Hit(value.clone());
        }
        if let Some((_, pending)) = state.inflight.get(key) {
            tracing::trace!(key = %key, "Joining in-flight read");
            return Lookup::Pending(pending.clone());
        }

        let read_id = self.next_read.fetch_add(1, Ordering::Relaxed);
        let pending = self.load(key.clone(), default.clone(), read_id).boxed().shared();
        state
            .inflight
            .insert(key.clone(), (read_id, pending.clone()));
        Lookup::Pending(pending)
    }

    fn load(
        &self,
        key: StorageKey,
        default: Value,
        read_id: u64,
    ) -> impl std::future::Future<Output = Option<Value>> + Send + 'static {
        let store = self.store.clone();
        let shared_state = Arc::clone(&self.state);
        async move {
            tracing::debug!(key = %key, "Reading from storage");
            let result = store.read(&key, default).await;

            let mut state = lock(&shared_state);
            let current = state
                .inflight
                .get(&key)
                .is_some_and(|(id, _)| *id == read_id);
            if current {
                state.inflight.remove(&key);
            }

            match result {
                Ok(value) => {
                    if current {
                        state.cache.insert(key, value.clone());
                    }
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Read failed, falling back to default");
                    None
                }
            }
        }
    }
}
