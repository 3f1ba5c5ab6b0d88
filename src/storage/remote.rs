use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::types::{Namespace, StorageError, StorageKey};

/// Body returned by `GET /api/storage/...`.
#[derive(Debug, Deserialize)]
struct ReadEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    value: Option<Value>,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Body returned by `POST /api/storage/...`.
#[derive(Debug, Deserialize)]
struct WriteEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Server-backed storage transport.
///
/// Settings map to `/api/storage/setting/<key>` and day payloads to
/// `/api/storage/daily/<date>`. Timeouts are whatever the supplied client
/// is configured with.
#[derive(Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: Url,
}

impl RemoteStore {
    /// `base_url` must end with `/` (see [`crate::util::parse_base_url`]).
    pub fn new(client: reqwest::Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    fn endpoint(&self, key: &StorageKey) -> Result<Url, StorageError> {
        let (group, name) = match key.namespace() {
            Namespace::Setting => ("setting", key.as_str().to_string()),
            Namespace::DailyPayload(date) => ("daily", date.format("%Y-%m-%d").to_string()),
            Namespace::Device => return Err(StorageError::UnknownKey(key.to_string())),
        };

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::read(key, "base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["api", "storage", group, name.as_str()]);
        Ok(url)
    }

    pub async fn get_value(&self, key: &StorageKey) -> Result<Option<Value>, StorageError> {
        let url = self.endpoint(key)?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::read(key, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(key = %key, "Remote key not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StorageError::read(
                key,
                format!("HTTP status {}", status.as_u16()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| StorageError::read(key, e))?;
        let envelope: ReadEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(source) => {
                let err = StorageError::Parse {
                    key: key.to_string(),
                    source,
                };
                tracing::warn!(key = %key, error = %err, "Discarding malformed remote value");
                return Ok(None);
            }
        };

        if !envelope.success {
            return Err(StorageError::read(
                key,
                envelope
                    .error
                    .unwrap_or_else(|| "backend reported failure".to_string()),
            ));
        }

        let value = match key.namespace() {
            Namespace::DailyPayload(_) => envelope.payload,
            _ => envelope.value,
        };
        Ok(value.filter(|v| !v.is_null()))
    }

    pub async fn set_value(&self, key: &StorageKey, value: &Value) -> Result<(), StorageError> {
        let url = self.endpoint(key)?;
        let body = match key.namespace() {
            Namespace::DailyPayload(_) => json!({ "payload": value }),
            _ => json!({ "value": value }),
        };

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::write(key, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::write(
                key,
                format!("HTTP status {}", status.as_u16()),
            ));
        }

        // An empty 2xx body counts as success; an explicit `success: false` does not
        let body = response
            .text()
            .await
            .map_err(|e| StorageError::write(key, e))?;
        if body.trim().is_empty() {
            return Ok(());
        }
        match serde_json::from_str::<WriteEnvelope>(&body) {
            Ok(envelope) if envelope.success => Ok(()),
            Ok(envelope) => Err(StorageError::write(
                key,
                envelope
                    .error
                    .unwrap_or_else(|| "backend reported failure".to_string()),
            )),
            Err(e) => Err(StorageError::write(key, format!("malformed response: {e}"))),
        }
    }
}
