//! `IndexTree`: a `BTreeMap`-backed sorted multimap over composite keys.
//!
//! `Vec<IndexKey>` is lexicographically `Ord` for free, so a compound
//! `IndexSpec` of N fields needs nothing beyond `BTreeMap<Vec<IndexKey>, _>`
//! — the single-field `BTreeMap<IndexKey, _>` the original carried
//! generalizes to composite keys without a new comparator.

use std::collections::BTreeMap;
use std::ops::Bound;

use super::key::IndexKey;
use crate::storage::RecordLocation;

/// A compound-key sorted multimap: each key maps to the locations of every
/// live document that produced it, sorted ascending.
#[derive(Debug, Default)]
pub struct IndexTree {
    tree: BTreeMap<Vec<IndexKey>, Vec<RecordLocation>>,
    /// True once any single document has contributed more than one key
    /// (e.g. indexing an array field), per the multi-key flag.
    multi_key: bool,
}

impl IndexTree {
    pub fn new() -> Self {
        Self { tree: BTreeMap::new(), multi_key: false }
    }

    pub fn is_multi_key(&self) -> bool {
        self.multi_key
    }

    /// Inserts `loc` for every key in `keys`, a document's full set of
    /// keys for this index (more than one element marks the index
    /// multi-key for the lifetime of the tree).
    pub fn insert_document(&mut self, keys: Vec<Vec<IndexKey>>, loc: RecordLocation) {
        if keys.len() > 1 {
            self.multi_key = true;
        }
        for key in keys {
            self.insert(key, loc);
        }
    }

    pub fn insert(&mut self, key: Vec<IndexKey>, loc: RecordLocation) {
        let locations = self.tree.entry(key).or_default();
        if let Err(pos) = locations.binary_search(&loc) {
            locations.insert(pos, loc);
        }
    }

    pub fn remove(&mut self, key: &[IndexKey], loc: RecordLocation) {
        if let Some(locations) = self.tree.get_mut(key) {
            if let Ok(pos) = locations.binary_search(&loc) {
                locations.remove(pos);
            }
            if locations.is_empty() {
                self.tree.remove(key);
            }
        }
    }

    pub fn lookup_eq(&self, key: &[IndexKey]) -> Vec<RecordLocation> {
        self.tree.get(key).cloned().unwrap_or_default()
    }

    /// Inclusive range lookup over composite keys, ascending by default;
    /// callers that need descending order reverse the result themselves
    /// (the cursor owns iteration direction, not the tree).
    pub fn lookup_range(&self, min: Option<&[IndexKey]>, max: Option<&[IndexKey]>) -> Vec<RecordLocation> {
        let min_bound: Bound<Vec<IndexKey>> = match min {
            Some(k) => Bound::Included(k.to_vec()),
            None => Bound::Unbounded,
        };
        let max_bound: Bound<Vec<IndexKey>> = match max {
            Some(k) => Bound::Included(k.to_vec()),
            None => Bound::Unbounded,
        };

        let mut result = Vec::new();
        for (_, locations) in self.tree.range((min_bound, max_bound)) {
            result.extend(locations.iter().copied());
        }
        result.sort();
        result
    }

    pub fn clear(&mut self) {
        self.tree.clear();
        self.multi_key = false;
    }

    pub fn key_count(&self) -> usize {
        self.tree.len()
    }

    pub fn location_count(&self) -> usize {
        self.tree.values().map(|v| v.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(offset: u64) -> RecordLocation {
        RecordLocation::new(0, offset)
    }

    #[test]
    fn test_composite_key_ordering() {
        let mut tree = IndexTree::new();
        tree.insert(vec![IndexKey::from_int(1), IndexKey::from_string("b")], loc(10));
        tree.insert(vec![IndexKey::from_int(1), IndexKey::from_string("a")], loc(20));
        tree.insert(vec![IndexKey::from_int(0), IndexKey::from_string("z")], loc(30));

        let range = tree.lookup_range(None, None);
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn test_insert_document_marks_multi_key() {
        let mut tree = IndexTree::new();
        assert!(!tree.is_multi_key());
        tree.insert_document(vec![vec![IndexKey::from_int(1)], vec![IndexKey::from_int(2)]], loc(5));
        assert!(tree.is_multi_key());
    }

    #[test]
    fn test_remove_drops_empty_key() {
        let mut tree = IndexTree::new();
        let key = vec![IndexKey::from_int(1)];
        tree.insert(key.clone(), loc(1));
        tree.remove(&key, loc(1));
        assert_eq!(tree.key_count(), 0);
    }

    #[test]
    fn test_lookup_range_bounds() {
        let mut tree = IndexTree::new();
        for i in 0..5 {
            tree.insert(vec![IndexKey::from_int(i)], loc(i as u64));
        }
        let range = tree.lookup_range(Some(&[IndexKey::from_int(1)]), Some(&[IndexKey::from_int(3)]));
        assert_eq!(range, vec![loc(1), loc(2), loc(3)]);
    }
}
