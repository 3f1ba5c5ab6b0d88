mod keyed;
mod kv;
mod remote;
mod schema;
mod types;

pub use keyed::KeyedStore;
pub use remote::RemoteStore;
pub use schema::Database;
pub use types::{
    Namespace, StorageError, StorageKey, StorageMode, CACHE_ENABLED_KEY, DAILY_PREFIX,
    EXPANDED_CONTAINERS_KEY, SELECTED_SOURCES_KEY, SETTING_PREFIX,
};
