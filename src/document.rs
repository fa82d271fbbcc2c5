//! Document field-tree helpers shared by the planner, matcher, and index.
//!
//! Documents are opaque `serde_json::Value` objects. The core only ever
//! needs two things from one: a stable fingerprint (for `QueryPattern` and
//! the matcher's equality fast path) and dotted-path field access (for
//! predicates over nested documents).

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde_json::Value;

/// Looks up a dotted field path (`"a.b.c"`) inside a document. Each
/// component indexes an object; arrays are not traversed by field name.
pub fn get_field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = document;
    for part in path.split('.') {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

/// A stable, deterministic hash of a JSON value's field tree. Object keys
/// are hashed in sorted order so that field order in the source document
/// does not affect the fingerprint.
pub fn fingerprint(value: &Value) -> u64 {
    let mut hasher = DefaultHasher::new();
    hash_value(value, &mut hasher);
    hasher.finish()
}

fn hash_value<H: Hasher>(value: &Value, hasher: &mut H) {
    match value {
        Value::Null => 0u8.hash(hasher),
        Value::Bool(b) => {
            1u8.hash(hasher);
            b.hash(hasher);
        }
        Value::Number(n) => {
            2u8.hash(hasher);
            n.to_string().hash(hasher);
        }
        Value::String(s) => {
            3u8.hash(hasher);
            s.hash(hasher);
        }
        Value::Array(items) => {
            4u8.hash(hasher);
            items.len().hash(hasher);
            for item in items {
                hash_value(item, hasher);
            }
        }
        Value::Object(map) => {
            5u8.hash(hasher);
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.len().hash(hasher);
            for key in keys {
                key.hash(hasher);
                hash_value(&map[key], hasher);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_get_field_nested() {
        let doc = json!({"a": {"b": {"c": 42}}});
        assert_eq!(get_field(&doc, "a.b.c"), Some(&json!(42)));
        assert_eq!(get_field(&doc, "a.b.missing"), None);
        assert_eq!(get_field(&doc, "missing"), None);
    }

    #[test]
    fn test_fingerprint_field_order_independent() {
        let a = json!({"x": 1, "y": 2});
        let b = json!({"y": 2, "x": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_distinguishes_values() {
        let a = json!({"x": 1});
        let b = json!({"x": 2});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let doc = json!({"a": [1, 2, 3], "b": "text"});
        assert_eq!(fingerprint(&doc), fingerprint(&doc));
    }
}
