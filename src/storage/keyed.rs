use serde_json::Value;

use super::remote::RemoteStore;
use super::schema::Database;
use super::types::{Namespace, StorageError, StorageKey, StorageMode};

/// Concrete backing for one namespace.
#[derive(Clone)]
enum Backing {
    Device(Database),
    Remote(RemoteStore),
}

/// Routes each key to its backing store by namespace.
///
/// Device keys always go to the local database. Settings and day payloads go
/// to the remote store in [`StorageMode::Remote`], else to the local database.
#[derive(Clone)]
pub struct KeyedStore {
    device: Database,
    shared: Backing,
}

impl KeyedStore {
    /// Everything in the device store.
    pub fn local(db: Database) -> Self {
        Self {
            device: db.clone(),
            shared: Backing::Device(db),
        }
    }

    /// Settings and day payloads on the server, device keys local.
    pub fn remote(db: Database, remote: RemoteStore) -> Self {
        Self {
            device: db,
            shared: Backing::Remote(remote),
        }
    }

    pub fn with_mode(mode: StorageMode, db: Database, remote: RemoteStore) -> Self {
        match mode {
            StorageMode::Local => Self::local(db),
            StorageMode::Remote => Self::remote(db, remote),
        }
    }

    fn backing(&self, key: &StorageKey) -> Backing {
        match key.namespace() {
            Namespace::Device => Backing::Device(self.device.clone()),
            Namespace::Setting | Namespace::DailyPayload(_) => self.shared.clone(),
        }
    }

    /// Read `key`, returning `default` when it is absent.
    pub async fn read(&self, key: &StorageKey, default: Value) -> Result<Value, StorageError> {
        let found = match self.backing(key) {
            Backing::Device(db) => db.get_value(key).await?,
            Backing::Remote(remote) => remote.get_value(key).await?,
        };
        Ok(found.unwrap_or(default))
    }

    /// Read a raw key string; unknown namespaces fail with
    /// [`StorageError::UnknownKey`].
    pub async fn read_raw(&self, key: &str, default: Value) -> Result<Value, StorageError> {
        let key = StorageKey::parse(key)?;
        self.read(&key, default).await
    }

    /// Persist the whole value or fail with [`StorageError::Write`].
    pub async fn write(&self, key: &StorageKey, value: &Value) -> Result<(), StorageError> {
        match self.backing(key) {
            Backing::Device(db) => db.set_value(key, value).await,
            Backing::Remote(remote) => remote.set_value(key, value).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::parse_base_url;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_local_mode_round_trip() {
        let store = KeyedStore::local(Database::open(":memory:").await.unwrap());
        let key = StorageKey::cache_enabled();

        assert_eq!(store.read(&key, json!(true)).await.unwrap(), json!(true));
        store.write(&key, &json!(false)).await.unwrap();
        assert_eq!(store.read(&key, json!(true)).await.unwrap(), json!(false));
    }

    #[tokio::test]
    async fn test_read_raw_unknown_key() {
        let store = KeyedStore::local(Database::open(":memory:").await.unwrap());
        let result = store.read_raw("something:else", Value::Null).await;
        assert!(matches!(result, Err(StorageError::UnknownKey(_))));
    }

    #[tokio::test]
    async fn test_remote_mode_routes_by_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/storage/setting/cache:enabled"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"success": true, "value": false})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let db = Database::open(":memory:").await.unwrap();
        let remote = RemoteStore::new(
            reqwest::Client::new(),
            parse_base_url(&server.uri()).unwrap(),
        );
        let store = KeyedStore::remote(db.clone(), remote);

        // Setting comes from the server
        let enabled = store
            .read(&StorageKey::cache_enabled(), json!(true))
            .await
            .unwrap();
        assert_eq!(enabled, json!(false));

        // Device key stays local: no request is made
        let key = StorageKey::expanded_containers();
        store.write(&key, &json!(["a"])).await.unwrap();
        assert_eq!(db.get_value(&key).await.unwrap(), Some(json!(["a"])));
    }
}
