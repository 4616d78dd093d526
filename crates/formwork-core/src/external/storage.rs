//! Storage collaborator contract
//!
//! The engine computes the storage key and converts values at the boundary:
//! non-primitive values are JSON-serialized before being handed over, and
//! returned strings that look like serialized objects/arrays are parsed back.
//! Adapter failures never reach the value pipeline; they read as "no
//! persisted value".

use formwork_value::Value;
use futures::stream::BoxStream;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Key-value persistence contract
pub trait StorageAdapter: Send + Sync {
    /// Read the raw persisted string for a key
    fn get(&self, key: &str) -> Option<String>;

    /// Persist a raw string under a key
    fn set(&self, key: &str, value: String);

    /// Remove a persisted key
    fn remove(&self, key: &str);

    /// Stream of external changes to a key
    ///
    /// Emits the new raw value (`None` for removal). Used to merge writes
    /// from other consumers of the same backend into the value pipeline.
    fn listen(&self, key: &str) -> BoxStream<'static, Option<String>>;
}

/// Serialize a value for the storage boundary
#[must_use]
pub fn serialize_for_storage(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Parse a raw stored string back into a value
///
/// Strings that look like serialized composites/numbers parse as JSON;
/// anything else stays a plain string.
#[must_use]
pub fn parse_stored(raw: &str) -> Value {
    let trimmed = raw.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    } else {
        Value::String(raw.to_string())
    }
}

/// In-memory storage backend
///
/// Backs tests and single-process embedding; change notifications go through
/// a broadcast channel so `listen` sees writes from any handle.
#[derive(Debug)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    changed: broadcast::Sender<(String, Option<String>)>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        let (changed, _) = broadcast::channel(64);
        Self {
            entries: Mutex::new(HashMap::new()),
            changed,
        }
    }
}

impl MemoryStorage {
    /// Create an empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is persisted
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.entries.lock().insert(key.to_string(), value.clone());
        let _ = self.changed.send((key.to_string(), Some(value)));
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
        let _ = self.changed.send((key.to_string(), None));
    }

    fn listen(&self, key: &str) -> BoxStream<'static, Option<String>> {
        let rx = self.changed.subscribe();
        let key = key.to_string();
        futures::stream::unfold((rx, key), |(mut rx, key)| async move {
            loop {
                match rx.recv().await {
                    Ok((changed_key, value)) if changed_key == key => {
                        return Some((value, (rx, key)));
                    }
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_pass_through_unquoted() {
        assert_eq!(serialize_for_storage(&json!("plain")), "plain");
        assert_eq!(parse_stored("plain"), json!("plain"));
    }

    #[test]
    fn composites_round_trip_as_json() {
        let value = json!({"a": [1, 2]});
        let raw = serialize_for_storage(&value);
        assert_eq!(parse_stored(&raw), value);
    }

    #[test]
    fn memory_storage_get_set_remove() {
        let storage = MemoryStorage::new();
        assert!(storage.get("k").is_none());
        storage.set("k", "v".to_string());
        assert_eq!(storage.get("k").as_deref(), Some("v"));
        storage.remove("k");
        assert!(storage.get("k").is_none());
    }

    #[tokio::test]
    async fn listen_sees_matching_writes_only() {
        let storage = MemoryStorage::new();
        let mut changes = storage.listen("watched");
        storage.set("other", "x".to_string());
        storage.set("watched", "y".to_string());
        let next = changes.next().await.unwrap();
        assert_eq!(next.as_deref(), Some("y"));
    }
}
