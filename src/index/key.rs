//! `IndexKey`: a total ordering over the JSON scalar types an index can
//! hold, matching the original's BSON canonical type ordering for the
//! scalars this crate supports.

/// A single indexed field's key. Declaration order gives the total
/// ordering `Null < Bool < Int < Float < String`; arrays and objects are
/// never indexed directly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IndexKey {
    Null,
    Bool(bool),
    Int(i64),
    /// Stored as bits under a total-ordering transform so `BTreeMap`'s
    /// derived `Ord` sorts floats correctly, including negatives.
    Float(u64),
    String(String),
}

impl IndexKey {
    pub fn from_bool(v: bool) -> Self {
        IndexKey::Bool(v)
    }

    pub fn from_int(v: i64) -> Self {
        IndexKey::Int(v)
    }

    pub fn from_float(v: f64) -> Self {
        let bits = v.to_bits();
        let ordered = if (bits >> 63) == 1 { !bits } else { bits ^ (1 << 63) };
        IndexKey::Float(ordered)
    }

    pub fn from_string(v: impl Into<String>) -> Self {
        IndexKey::String(v.into())
    }

    /// Converts a JSON scalar to an `IndexKey`. Arrays and objects return
    /// `None`; a caller indexing an array field extracts one key per
    /// element instead (making the index multi-key).
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(IndexKey::Null),
            serde_json::Value::Bool(b) => Some(IndexKey::from_bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(IndexKey::from_int(i))
                } else {
                    n.as_f64().map(IndexKey::from_float)
                }
            }
            serde_json::Value::String(s) => Some(IndexKey::from_string(s)),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ordering() {
        let keys = vec![
            IndexKey::Null,
            IndexKey::from_bool(false),
            IndexKey::from_bool(true),
            IndexKey::from_int(-100),
            IndexKey::from_int(100),
            IndexKey::from_float(-1.5),
            IndexKey::from_float(1.5),
            IndexKey::from_string("aaa"),
            IndexKey::from_string("zzz"),
        ];
        for i in 1..keys.len() {
            assert!(keys[i - 1] < keys[i], "expected {:?} < {:?}", keys[i - 1], keys[i]);
        }
    }

    #[test]
    fn test_from_json_arrays_and_objects_unindexable() {
        assert_eq!(IndexKey::from_json(&serde_json::json!([1, 2])), None);
        assert_eq!(IndexKey::from_json(&serde_json::json!({"a": 1})), None);
        assert_eq!(IndexKey::from_json(&serde_json::json!(null)), Some(IndexKey::Null));
    }

    #[test]
    fn test_float_negative_ordering() {
        let a = IndexKey::from_float(-10.0);
        let b = IndexKey::from_float(-0.5);
        let c = IndexKey::from_float(0.5);
        assert!(a < b);
        assert!(b < c);
    }
}
