use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::util::normalize_iso_date;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum StorageError {
    /// Key matches no known namespace.
    #[error("Unknown storage key: {0}")]
    UnknownKey(String),

    /// Persisting a value failed; nothing was written.
    #[error("Failed to write '{key}': {reason}")]
    Write { key: String, reason: String },

    /// Reading a value failed (transport or backend error).
    #[error("Failed to read '{key}': {reason}")]
    Read { key: String, reason: String },

    /// Stored JSON could not be decoded.
    #[error("Malformed value stored under '{key}': {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Opening or migrating the local store failed.
    #[error("Local store error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    pub(crate) fn write(key: &StorageKey, reason: impl fmt::Display) -> Self {
        StorageError::Write {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn read(key: &StorageKey, reason: impl fmt::Display) -> Self {
        StorageError::Read {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

pub const SETTING_PREFIX: &str = "cache:";
pub const DAILY_PREFIX: &str = "newsletters:scrapes:";
pub const CACHE_ENABLED_KEY: &str = "cache:enabled";
pub const EXPANDED_CONTAINERS_KEY: &str = "expandedContainers:v1";
pub const SELECTED_SOURCES_KEY: &str = "podcastSources-1";

/// Device-local keys that never leave the machine.
const DEVICE_KEYS: &[&str] = &[EXPANDED_CONTAINERS_KEY, SELECTED_SOURCES_KEY];

/// Storage namespace, resolved once when a key is constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// `cache:<name>` user settings.
    Setting,
    /// `newsletters:scrapes:<date>` day payloads.
    DailyPayload(NaiveDate),
    /// UI persistence that always stays in device storage.
    Device,
}

/// A storage key together with its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey {
    raw: String,
    namespace: Namespace,
}

impl StorageKey {
    /// Resolve a raw key string.
    ///
    /// Fails with [`StorageError::UnknownKey`] when no namespace matches, or
    /// when a day key's suffix is not a valid date.
    pub fn parse(raw: &str) -> Result<Self, StorageError> {
        if let Some(name) = raw.strip_prefix(SETTING_PREFIX) {
            if name.is_empty() {
                return Err(StorageError::UnknownKey(raw.to_string()));
            }
            return Ok(Self {
                raw: raw.to_string(),
                namespace: Namespace::Setting,
            });
        }

        if let Some(suffix) = raw.strip_prefix(DAILY_PREFIX) {
            // Only the canonical form is a valid key; normalization happens at ingestion
            return match normalize_iso_date(suffix) {
                Some(date) if date.format("%Y-%m-%d").to_string() == suffix => {
                    Ok(Self::daily(date))
                }
                _ => Err(StorageError::UnknownKey(raw.to_string())),
            };
        }

        if DEVICE_KEYS.contains(&raw) {
            return Ok(Self {
                raw: raw.to_string(),
                namespace: Namespace::Device,
            });
        }

        Err(StorageError::UnknownKey(raw.to_string()))
    }

    /// Key of the day payload for `date`.
    pub fn daily(date: NaiveDate) -> Self {
        Self {
            raw: format!("{DAILY_PREFIX}{}", date.format("%Y-%m-%d")),
            namespace: Namespace::DailyPayload(date),
        }
    }

    pub fn cache_enabled() -> Self {
        Self {
            raw: CACHE_ENABLED_KEY.to_string(),
            namespace: Namespace::Setting,
        }
    }

    pub fn expanded_containers() -> Self {
        Self {
            raw: EXPANDED_CONTAINERS_KEY.to_string(),
            namespace: Namespace::Device,
        }
    }

    pub fn selected_sources() -> Self {
        Self {
            raw: SELECTED_SOURCES_KEY.to_string(),
            namespace: Namespace::Device,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for StorageKey {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

// ============================================================================
// Storage Mode
// ============================================================================

/// Where settings and day payloads live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Server-backed storage API.
    #[default]
    Remote,
    /// Everything in the device store.
    Local,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_setting_key() {
        let key = StorageKey::parse("cache:enabled").unwrap();
        assert_eq!(key.namespace(), &Namespace::Setting);
        assert_eq!(key, StorageKey::cache_enabled());
    }

    #[test]
    fn test_parse_daily_key() {
        let key = StorageKey::parse("newsletters:scrapes:2024-08-01").unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 8, 1).unwrap();
        assert_eq!(key.namespace(), &Namespace::DailyPayload(date));
        assert_eq!(key, StorageKey::daily(date));
    }

    #[test]
    fn test_parse_device_keys() {
        assert_eq!(
            StorageKey::parse("expandedContainers:v1").unwrap().namespace(),
            &Namespace::Device
        );
        assert_eq!(
            StorageKey::parse("podcastSources-1").unwrap().namespace(),
            &Namespace::Device
        );
    }

    #[test]
    fn test_unknown_keys_rejected() {
        for raw in [
            "",
            "cache:",
            "random",
            "newsletters:scrapes:",
            "newsletters:scrapes:not-a-date",
            "newsletters:scrapes:2024-08-01T00:00:00Z",
            "expandedContainers:v2",
        ] {
            assert!(
                matches!(StorageKey::parse(raw), Err(StorageError::UnknownKey(_))),
                "{raw:?} should be unknown"
            );
        }
    }

    #[test]
    fn test_display_round_trips() {
        let key = StorageKey::daily(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(key.to_string(), "newsletters:scrapes:2024-01-09");
        assert_eq!(key.to_string().parse::<StorageKey>().unwrap(), key);
    }
}
