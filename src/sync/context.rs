use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::bus::{ChangeBus, Subscription};
use super::coalescer::ReadCoalescer;
use super::lock;
use crate::storage::{KeyedStore, StorageError, StorageKey};

/// The synchronization layer: one instance per process, cloned (cheaply) into
/// every consumer.
///
/// Reads go through the [`ReadCoalescer`]. Writes persist through the
/// [`KeyedStore`], then update the cache, then publish on the [`ChangeBus`],
/// always in that order, so a listener never observes a publish the cache
/// does not reflect yet.
#[derive(Clone)]
pub struct SyncContext {
    store: KeyedStore,
    reads: ReadCoalescer,
    bus: ChangeBus,
    write_locks: Arc<Mutex<HashMap<StorageKey, Arc<tokio::sync::Mutex<()>>>>>,
}

impl SyncContext {
    pub fn new(store: KeyedStore) -> Self {
        Self {
            reads: ReadCoalescer::new(store.clone()),
            store,
            bus: ChangeBus::new(),
            write_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    pub fn reads(&self) -> &ReadCoalescer {
        &self.reads
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub async fn get(&self, key: &StorageKey, default: Value) -> Value {
        self.reads.get(key, default).await
    }

    /// Typed read. A stored value that does not decode as `T` is logged and
    /// treated as a miss.
    pub async fn get_json<T>(&self, key: &StorageKey, default: T) -> T
    where
        T: Serialize + DeserializeOwned,
    {
        let fallback = match serde_json::to_value(&default) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Default value is not serializable");
                Value::Null
            }
        };
        let value = self.reads.get(key, fallback).await;
        decode(key, value).unwrap_or(default)
    }

    /// Cached value without I/O.
    pub fn cached(&self, key: &StorageKey) -> Option<Value> {
        self.reads.peek(key)
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Persist `value`, then cache it, then publish.
    ///
    /// On failure the cache keeps its pre-write value and nothing is
    /// published.
    pub async fn set(&self, key: &StorageKey, value: Value) -> Result<(), StorageError> {
        let guard = self.write_lock(key);
        let _held = guard.lock().await;
        self.write_unlocked(key, value).await
    }

    pub async fn set_json<T: Serialize>(&self, key: &StorageKey, value: &T) -> Result<(), StorageError> {
        let value = serde_json::to_value(value).map_err(|e| StorageError::write(key, e))?;
        self.set(key, value).await
    }

    /// Read-modify-write, serialized against other writes to the same key.
    ///
    /// `f` receives the current value (or `default`) and returns the value to
    /// write, or `None` to leave storage untouched. A failed read aborts
    /// without writing.
    pub async fn update_json<T, F>(
        &self,
        key: &StorageKey,
        default: T,
        f: F,
    ) -> Result<Option<T>, StorageError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(T) -> Option<T>,
    {
        let guard = self.write_lock(key);
        let _held = guard.lock().await;

        let fallback = serde_json::to_value(&default).map_err(|e| StorageError::write(key, e))?;
        let current = self.reads.try_get(key, fallback).await?;
        let current = decode(key, current).unwrap_or(default);

        let Some(next) = f(current) else {
            return Ok(None);
        };
        let value = serde_json::to_value(&next).map_err(|e| StorageError::write(key, e))?;
        self.write_unlocked(key, value).await?;
        Ok(Some(next))
    }

    async fn write_unlocked(&self, key: &StorageKey, value: Value) -> Result<(), StorageError> {
        if let Err(e) = self.store.write(key, &value).await {
            tracing::warn!(key = %key, error = %e, "Write failed, cache left unchanged");
            return Err(e);
        }
        self.reads.store_written(key, value);
        self.bus.publish(key);
        tracing::debug!(key = %key, "Wrote value");
        Ok(())
    }

    fn write_lock(&self, key: &StorageKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = lock(&self.write_locks);
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    // ========================================================================
    // Change notification
    // ========================================================================

    pub fn subscribe<F>(&self, key: StorageKey, listener: F) -> Subscription
    where
        F: Fn(&StorageKey) + Send + Sync + 'static,
    {
        self.bus.subscribe(key, listener)
    }

    /// Handle a change made outside this process (another tab, another
    /// device): forget the cached value and tell subscribers to re-read.
    pub fn notify_external_change(&self, key: &StorageKey) {
        self.reads.invalidate(key);
        self.bus.publish(key);
    }
}

fn decode<T: DeserializeOwned>(key: &StorageKey, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(v) => Some(v),
        Err(source) => {
            let err = StorageError::Parse {
                key: key.to_string(),
                source,
            };
            tracing::warn!(key = %key, error = %err, "Stored value has unexpected shape");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Database, RemoteStore};
    use crate::util::parse_base_url;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn local_ctx() -> SyncContext {
        SyncContext::new(KeyedStore::local(Database::open(":memory:").await.unwrap()))
    }

    #[tokio::test]
    async fn test_set_updates_cache_before_publishing() {
        let ctx = local_ctx().await;
        let key = StorageKey::cache_enabled();
        let seen = Arc::new(Mutex::new(None));

        let observer = ctx.clone();
        let seen_in = Arc::clone(&seen);
        let _sub = ctx.subscribe(key.clone(), move |k| {
            *lock(&seen_in) = observer.cached(k);
        });

        ctx.set(&key, json!(false)).await.unwrap();

        assert_eq!(*lock(&seen), Some(json!(false)));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_cache_and_skips_publish() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"success": true, "value": true})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let remote = RemoteStore::new(
            reqwest::Client::new(),
            parse_base_url(&server.uri()).unwrap(),
        );
        let ctx = SyncContext::new(KeyedStore::remote(
            Database::open(":memory:").await.unwrap(),
            remote,
        ));
        let key = StorageKey::cache_enabled();
        let published = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&published);
        let _sub = ctx.subscribe(key.clone(), move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(ctx.get(&key, json!(false)).await, json!(true));
        let result = ctx.set(&key, json!(false)).await;

        assert!(matches!(result, Err(StorageError::Write { .. })));
        assert_eq!(ctx.cached(&key), Some(json!(true)));
        assert_eq!(published.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_get_json_falls_back_on_shape_mismatch() {
        let ctx = local_ctx().await;
        let key = StorageKey::expanded_containers();
        ctx.set(&key, json!({"not": "a list"})).await.unwrap();

        let ids: Vec<String> = ctx.get_json(&key, vec!["default".to_string()]).await;
        assert_eq!(ids, vec!["default".to_string()]);
    }

    #[tokio::test]
    async fn test_update_json_serializes_same_key_writers() {
        let ctx = local_ctx().await;
        let key = StorageKey::selected_sources();

        let tasks: Vec<_> = (0..10)
            .map(|i| {
                let ctx = ctx.clone();
                let key = key.clone();
                tokio::spawn(async move {
                    ctx.update_json(&key, Vec::<String>::new(), |mut ids| {
                        ids.push(format!("source-{i}"));
                        Some(ids)
                    })
                    .await
                    .unwrap();
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let ids: Vec<String> = ctx.get_json(&key, Vec::new()).await;
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn test_update_json_none_skips_write() {
        let ctx = local_ctx().await;
        let key = StorageKey::cache_enabled();
        let published = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&published);
        let _sub = ctx.subscribe(key.clone(), move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        let result = ctx.update_json(&key, true, |_| None).await.unwrap();

        assert_eq!(result, None);
        assert_eq!(published.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_external_change_forces_reread() {
        let ctx = local_ctx().await;
        let key = StorageKey::cache_enabled();
        ctx.set(&key, json!(true)).await.unwrap();
        let published = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&published);
        let _sub = ctx.subscribe(key.clone(), move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        ctx.notify_external_change(&key);

        assert_eq!(ctx.cached(&key), None);
        assert_eq!(published.load(Ordering::SeqCst), 1);
        // Value still in storage, re-read on demand
        assert_eq!(ctx.get(&key, json!(false)).await, json!(true));
    }
}
