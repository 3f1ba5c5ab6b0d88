use serde_json::Value;

use super::schema::Database;
use super::types::{StorageError, StorageKey};

impl Database {
    // ========================================================================
    // Key/Value Operations
    // ========================================================================

    /// Read the JSON value stored under `key`.
    ///
    /// Returns `None` when the key is absent. A stored value that is not valid
    /// JSON is logged and treated as absent.
    pub async fn get_value(&self, key: &StorageKey) -> Result<Option<Value>, StorageError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::read(key, e))?;

        let Some((text,)) = row else {
            return Ok(None);
        };

        match serde_json::from_str(&text) {
            Ok(value) => Ok(Some(value)),
            Err(source) => {
                let err = StorageError::Parse {
                    key: key.to_string(),
                    source,
                };
                tracing::warn!(key = %key, error = %err, "Discarding malformed local value");
                Ok(None)
            }
        }
    }

    /// Store `value` under `key` (UPSERT).
    ///
    /// A single statement, so the value is either fully replaced or untouched.
    pub async fn set_value(&self, key: &StorageKey, value: &Value) -> Result<(), StorageError> {
        let text = serde_json::to_string(value).map_err(|e| StorageError::write(key, e))?;

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key.as_str())
        .bind(&text)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::write(key, e))?;

        Ok(())
    }
}
