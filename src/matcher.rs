//! The racer's compiled predicate. Per the design notes, the racer owns
//! one `Matcher` per clause: it can be asked `matches(document)` and,
//! when an index scan projects the fields it needs, `matches_key`
//! against the index key alone, without fetching the document.
//!
//! Grounded on the original single-field `PredicateFilter` (strict
//! equality, no coercion, missing-or-null field never matches),
//! extended with regex, existence, and geo-distance predicates.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::document::get_field;
use crate::index::IndexKey;
use crate::planner::{predicates_by_field, Clause, FilterOp, Predicate};

#[derive(Clone)]
pub struct Matcher {
    predicates: Clause,
    regexes: Vec<Option<Regex>>,
}

impl Matcher {
    pub fn new(clause: Clause) -> Self {
        let regexes = clause
            .iter()
            .map(|p| match &p.op {
                FilterOp::Regex(pattern) => Regex::new(pattern).ok(),
                _ => None,
            })
            .collect();
        Self { predicates: clause, regexes }
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.predicates.iter().enumerate().all(|(i, p)| self.matches_predicate(i, document, p))
    }

    fn matches_predicate(&self, index: usize, document: &Value, predicate: &Predicate) -> bool {
        let field_value = match get_field(document, &predicate.field) {
            Some(v) if !v.is_null() => v,
            _ => return matches!(predicate.op, FilterOp::Exists(false)),
        };

        match &predicate.op {
            FilterOp::Eq(expected) => field_value == expected,
            FilterOp::Gte(bound) => Self::compare(field_value, bound).map(|o| o.is_ge()).unwrap_or(false),
            FilterOp::Gt(bound) => Self::compare(field_value, bound).map(|o| o.is_gt()).unwrap_or(false),
            FilterOp::Lte(bound) => Self::compare(field_value, bound).map(|o| o.is_le()).unwrap_or(false),
            FilterOp::Lt(bound) => Self::compare(field_value, bound).map(|o| o.is_lt()).unwrap_or(false),
            FilterOp::Exists(true) => true,
            FilterOp::Exists(false) => false,
            FilterOp::Regex(_) => match (&self.regexes[index], field_value.as_str()) {
                (Some(re), Some(s)) => re.is_match(s),
                _ => false,
            },
            FilterOp::Near { lon, lat, max_distance_m } => Self::near_match(field_value, *lon, *lat, *max_distance_m),
        }
    }

    fn compare(actual: &Value, bound: &Value) -> Option<std::cmp::Ordering> {
        match (actual, bound) {
            (Value::Number(a), Value::Number(b)) => {
                if let (Some(ai), Some(bi)) = (a.as_i64(), b.as_i64()) {
                    return Some(ai.cmp(&bi));
                }
                a.as_f64()?.partial_cmp(&b.as_f64()?)
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// `[lon, lat]` array field within `max_distance_m` (great-circle,
    /// haversine) of the query point, or always true when unbounded.
    fn near_match(field_value: &Value, lon: f64, lat: f64, max_distance_m: Option<f64>) -> bool {
        let max = match max_distance_m {
            Some(m) => m,
            None => return true,
        };
        let Some(arr) = field_value.as_array() else { return false };
        let (Some(flon), Some(flat)) = (arr.first().and_then(Value::as_f64), arr.get(1).and_then(Value::as_f64)) else {
            return false;
        };
        haversine_meters(lon, lat, flon, flat) <= max
    }

    /// Projected key lookup without the document: `None` when any
    /// predicate's field is unrepresented in `field_keys` or the
    /// predicate is not a range (regex/exists/near need the document).
    pub fn matches_key(&self, field_keys: &HashMap<String, IndexKey>) -> Option<bool> {
        let grouped = predicates_by_field(&self.predicates);
        for (field, preds) in grouped {
            if preds.iter().any(|p| !p.is_boundable()) {
                return None;
            }
            let key = field_keys.get(field)?;
            let set = crate::planner::IntervalSet::from_boundable_predicates(&preds)?;
            if !set.contains(key) {
                return Some(false);
            }
        }
        Some(true)
    }
}

fn haversine_meters(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_equality_match() {
        let doc = json!({"name": "Alice", "age": 30});
        let matcher = Matcher::new(vec![Predicate::eq("name", json!("Alice"))]);
        assert!(matcher.matches(&doc));
        let matcher = Matcher::new(vec![Predicate::eq("name", json!("Bob"))]);
        assert!(!matcher.matches(&doc));
    }

    #[test]
    fn test_no_type_coercion() {
        let doc = json!({"value": 123});
        let matcher = Matcher::new(vec![Predicate::eq("value", json!("123"))]);
        assert!(!matcher.matches(&doc));
    }

    #[test]
    fn test_missing_and_null_fields_never_match() {
        let doc = json!({"name": null});
        let matcher = Matcher::new(vec![Predicate::eq("name", json!("Alice"))]);
        assert!(!matcher.matches(&doc));
        let matcher = Matcher::new(vec![Predicate::eq("age", json!(30))]);
        assert!(!matcher.matches(&doc));
    }

    #[test]
    fn test_exists_predicate() {
        let present = json!({"email": "a@b.com"});
        let absent = json!({});
        let matcher = Matcher::new(vec![Predicate::exists("email", true)]);
        assert!(matcher.matches(&present));
        assert!(!matcher.matches(&absent));
        let matcher = Matcher::new(vec![Predicate::exists("email", false)]);
        assert!(!matcher.matches(&present));
        assert!(matcher.matches(&absent));
    }

    #[test]
    fn test_regex_predicate() {
        let doc = json!({"name": "Alice"});
        let matcher = Matcher::new(vec![Predicate::regex("name", "^A")]);
        assert!(matcher.matches(&doc));
        let matcher = Matcher::new(vec![Predicate::regex("name", "^Z")]);
        assert!(!matcher.matches(&doc));
    }

    #[test]
    fn test_near_predicate_within_radius() {
        let doc = json!({"loc": [0.0, 0.0]});
        let matcher = Matcher::new(vec![Predicate::near("loc", 0.001, 0.0, Some(1000.0))]);
        assert!(matcher.matches(&doc));
        let matcher = Matcher::new(vec![Predicate::near("loc", 50.0, 0.0, Some(1000.0))]);
        assert!(!matcher.matches(&doc));
    }

    #[test]
    fn test_matches_key_decidable_range() {
        let matcher = Matcher::new(vec![Predicate::gte("age", json!(18))]);
        let mut keys = HashMap::new();
        keys.insert("age".to_string(), IndexKey::from_int(25));
        assert_eq!(matcher.matches_key(&keys), Some(true));
        keys.insert("age".to_string(), IndexKey::from_int(10));
        assert_eq!(matcher.matches_key(&keys), Some(false));
    }

    #[test]
    fn test_matches_key_undecidable_for_regex() {
        let matcher = Matcher::new(vec![Predicate::regex("name", "^A")]);
        let keys = HashMap::new();
        assert_eq!(matcher.matches_key(&keys), None);
    }
}
