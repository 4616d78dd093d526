//! Metadata keys for round-trip entry identification
//!
//! When metadata injection is enabled, object values carry `_key`, `_name`,
//! and `_uid` entries ahead of the real keys. `_name` is what lets array
//! reconciliation tell which field template produced an entry after the value
//! round-trips through storage or the network; `_uid` survives reordering so
//! an entry keeps its identity when its index changes.

use crate::uid::Uid;
use crate::{Map, Value};

/// Structural key metadata entry
pub const META_KEY: &str = "_key";
/// Field name metadata entry
pub const META_NAME: &str = "_name";
/// Value-scoped unique id metadata entry
pub const META_UID: &str = "_uid";

/// True for one of the reserved metadata keys
#[inline]
#[must_use]
pub fn is_meta_key(key: &str) -> bool {
    matches!(key, META_KEY | META_NAME | META_UID)
}

/// Inject metadata entries ahead of the real keys
///
/// A `_uid` already present in the incoming map is preserved, so recomputing
/// a value does not change entry identity.
#[must_use]
pub fn inject_metadata(map: Map, key: &str, name: &str) -> Map {
    let uid = map
        .get(META_UID)
        .and_then(Value::as_str)
        .map(Uid::from_existing)
        .unwrap_or_else(Uid::random);

    let mut with_meta = Map::new();
    with_meta.insert(META_KEY.to_string(), Value::String(key.to_string()));
    with_meta.insert(META_NAME.to_string(), Value::String(name.to_string()));
    with_meta.insert(META_UID.to_string(), Value::String(uid.as_str().to_string()));
    for (entry_key, entry_value) in map {
        if !is_meta_key(&entry_key) {
            with_meta.insert(entry_key, entry_value);
        }
    }
    with_meta
}

/// Remove all metadata entries
#[must_use]
pub fn strip_metadata(map: Map) -> Map {
    map.into_iter().filter(|(key, _)| !is_meta_key(key)).collect()
}

/// Field name recorded in an entry's metadata, if any
#[inline]
#[must_use]
pub fn entry_name(value: &Value) -> Option<&str> {
    value.as_object()?.get(META_NAME)?.as_str()
}

/// Uid recorded in an entry's metadata, if any
#[inline]
#[must_use]
pub fn entry_uid(value: &Value) -> Option<&str> {
    value.as_object()?.get(META_UID)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inject_places_meta_ahead_of_real_keys() {
        let map = json!({"title": "a"}).as_object().unwrap().clone();
        let with_meta = inject_metadata(map, "k1", "item");
        let keys: Vec<&str> = with_meta.keys().map(String::as_str).collect();
        assert_eq!(keys, vec![META_KEY, META_NAME, META_UID, "title"]);
    }

    #[test]
    fn inject_preserves_existing_uid() {
        let map = json!({"_uid": "abc123xyz", "title": "a"})
            .as_object()
            .unwrap()
            .clone();
        let with_meta = inject_metadata(map, "k1", "item");
        assert_eq!(with_meta.get(META_UID).unwrap(), "abc123xyz");
    }

    #[test]
    fn strip_removes_all_meta() {
        let map = json!({"_key": "k", "_name": "n", "_uid": "u", "title": "a"})
            .as_object()
            .unwrap()
            .clone();
        let stripped = strip_metadata(map);
        assert_eq!(stripped.len(), 1);
        assert!(stripped.contains_key("title"));
    }

    #[test]
    fn entry_name_reads_metadata() {
        let value = json!({"_name": "x", "title": "a"});
        assert_eq!(entry_name(&value), Some("x"));
        assert_eq!(entry_name(&json!({"title": "a"})), None);
        assert_eq!(entry_name(&json!(3)), None);
    }
}
