//! Table scan (natural order, forward or backward) and index scan
//! (directional, multi-key aware) cursors. Both pre-resolve their full
//! ordered location list up front and then walk it, fetching each
//! document lazily through a `DocumentSource`.

use serde_json::Value;

use super::{Cursor, DocumentSource, TouchState, YieldState};
use crate::dupset::DupSet;
use crate::errors::CoreResult;
use crate::index::{IndexKey, IndexSpec};
use crate::matcher::Matcher;
use crate::storage::RecordLocation;

pub struct TableScanCursor<S: DocumentSource> {
    source: S,
    locations: Vec<RecordLocation>,
    forward: bool,
    pos: usize,
    current: Option<(RecordLocation, Value)>,
    matcher: Option<Matcher>,
    dupset: DupSet,
    n_scanned: u64,
    noted: Option<RecordLocation>,
}

impl<S: DocumentSource> TableScanCursor<S> {
    pub fn new(source: S, mut locations: Vec<RecordLocation>, forward: bool, matcher: Option<Matcher>) -> Self {
        locations.sort();
        if !forward {
            locations.reverse();
        }
        Self { source, locations, forward, pos: 0, current: None, matcher, dupset: DupSet::new(540), n_scanned: 0, noted: None }
    }
}

impl<S: DocumentSource> Cursor for TableScanCursor<S> {
    fn ok(&self) -> bool {
        self.current.is_some()
    }

    fn advance(&mut self) -> CoreResult<bool> {
        while self.pos < self.locations.len() {
            let loc = self.locations[self.pos];
            self.pos += 1;
            self.n_scanned += 1;
            if let Some(doc) = self.source.fetch(loc) {
                self.current = Some((loc, doc));
                return Ok(true);
            }
        }
        self.current = None;
        Ok(false)
    }

    fn current_location(&self) -> Option<RecordLocation> {
        self.current.as_ref().map(|(loc, _)| *loc)
    }

    fn current_document(&self) -> Option<&Value> {
        self.current.as_ref().map(|(_, doc)| doc)
    }

    fn current_key(&self) -> Option<&[IndexKey]> {
        None
    }

    fn index_key_pattern(&self) -> Option<&IndexSpec> {
        None
    }

    fn is_multi_key(&self) -> bool {
        false
    }

    fn matcher(&self) -> Option<&Matcher> {
        self.matcher.as_ref()
    }

    fn key_fields_only(&self) -> bool {
        false
    }

    fn get_set_dup(&mut self, location: RecordLocation) -> bool {
        self.dupset.get_set_dup(location)
    }

    fn prepare_to_yield(&mut self) -> YieldState {
        YieldState { last_key: None, last_location: self.current_location() }
    }

    fn recover_from_yield(&mut self, state: YieldState) -> CoreResult<()> {
        if let Some(last) = state.last_location {
            self.pos = self
                .locations
                .iter()
                .position(|l| if self.forward { *l > last } else { *l < last })
                .unwrap_or(self.locations.len());
        }
        Ok(())
    }

    fn prepare_to_touch_earlier_iterate(&mut self) -> TouchState {
        TouchState { last_location: self.current_location() }
    }

    fn recover_from_touching_earlier_iterate(&mut self, _state: TouchState) -> CoreResult<()> {
        Ok(())
    }

    fn n_scanned(&self) -> u64 {
        self.n_scanned
    }

    fn note_location(&mut self, location: RecordLocation) {
        self.noted = Some(location);
    }

    fn check_location(&self, location: RecordLocation) -> bool {
        self.noted == Some(location)
    }
}

/// One (key, location) pair from an index range scan.
pub struct IndexScanCursor<S: DocumentSource> {
    source: S,
    spec: IndexSpec,
    entries: Vec<(Vec<IndexKey>, RecordLocation)>,
    multi_key: bool,
    key_fields_only: bool,
    pos: usize,
    current: Option<(RecordLocation, Value)>,
    matcher: Option<Matcher>,
    dupset: DupSet,
    n_scanned: u64,
    noted: Option<RecordLocation>,
}

impl<S: DocumentSource> IndexScanCursor<S> {
    pub fn new(
        source: S,
        spec: IndexSpec,
        mut entries: Vec<(Vec<IndexKey>, RecordLocation)>,
        forward: bool,
        multi_key: bool,
        key_fields_only: bool,
        matcher: Option<Matcher>,
    ) -> Self {
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        if !forward {
            entries.reverse();
        }
        Self {
            source,
            spec,
            entries,
            multi_key,
            key_fields_only,
            pos: 0,
            current: None,
            matcher,
            dupset: DupSet::new(540),
            n_scanned: 0,
            noted: None,
        }
    }
}

impl<S: DocumentSource> Cursor for IndexScanCursor<S> {
    fn ok(&self) -> bool {
        self.current.is_some()
    }

    fn advance(&mut self) -> CoreResult<bool> {
        while self.pos < self.entries.len() {
            let (_, loc) = self.entries[self.pos].clone();
            self.pos += 1;
            self.n_scanned += 1;
            if self.multi_key && self.dupset.get_set_dup(loc) {
                continue;
            }
            if let Some(doc) = self.source.fetch(loc) {
                self.current = Some((loc, doc));
                return Ok(true);
            }
        }
        self.current = None;
        Ok(false)
    }

    fn current_location(&self) -> Option<RecordLocation> {
        self.current.as_ref().map(|(loc, _)| *loc)
    }

    fn current_document(&self) -> Option<&Value> {
        self.current.as_ref().map(|(_, doc)| doc)
    }

    fn current_key(&self) -> Option<&[IndexKey]> {
        if self.pos == 0 {
            None
        } else {
            self.entries.get(self.pos - 1).map(|(k, _)| k.as_slice())
        }
    }

    fn index_key_pattern(&self) -> Option<&IndexSpec> {
        Some(&self.spec)
    }

    fn is_multi_key(&self) -> bool {
        self.multi_key
    }

    fn matcher(&self) -> Option<&Matcher> {
        self.matcher.as_ref()
    }

    fn key_fields_only(&self) -> bool {
        self.key_fields_only
    }

    fn get_set_dup(&mut self, location: RecordLocation) -> bool {
        self.dupset.get_set_dup(location)
    }

    fn prepare_to_yield(&mut self) -> YieldState {
        YieldState { last_key: self.current_key().map(|k| k.to_vec()), last_location: self.current_location() }
    }

    fn recover_from_yield(&mut self, state: YieldState) -> CoreResult<()> {
        if let (Some(last_key), Some(last_loc)) = (state.last_key, state.last_location) {
            self.pos = self
                .entries
                .iter()
                .position(|(k, l)| (k.clone(), *l) > (last_key.clone(), last_loc))
                .unwrap_or(self.entries.len());
        }
        Ok(())
    }

    fn prepare_to_touch_earlier_iterate(&mut self) -> TouchState {
        TouchState { last_location: self.current_location() }
    }

    fn recover_from_touching_earlier_iterate(&mut self, _state: TouchState) -> CoreResult<()> {
        Ok(())
    }

    fn n_scanned(&self) -> u64 {
        self.n_scanned
    }

    fn note_location(&mut self, location: RecordLocation) {
        self.noted = Some(location);
    }

    fn check_location(&self, location: RecordLocation) -> bool {
        self.noted == Some(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    struct MapSource(HashMap<RecordLocation, Value>);
    impl DocumentSource for MapSource {
        fn fetch(&self, location: RecordLocation) -> Option<Value> {
            self.0.get(&location).cloned()
        }
    }

    fn loc(offset: u64) -> RecordLocation {
        RecordLocation::new(0, offset)
    }

    #[test]
    fn test_table_scan_forward_order() {
        let mut map = HashMap::new();
        map.insert(loc(30), json!({"_id": "c"}));
        map.insert(loc(10), json!({"_id": "a"}));
        map.insert(loc(20), json!({"_id": "b"}));
        let mut cursor = TableScanCursor::new(MapSource(map), vec![loc(30), loc(10), loc(20)], true, None);
        let mut seen = Vec::new();
        while cursor.advance().unwrap() {
            seen.push(cursor.current_location().unwrap());
        }
        assert_eq!(seen, vec![loc(10), loc(20), loc(30)]);
        assert_eq!(cursor.n_scanned(), 3);
    }

    #[test]
    fn test_table_scan_recovers_past_yield_point() {
        let mut map = HashMap::new();
        for i in [10, 20, 30] {
            map.insert(loc(i), json!({"_id": i}));
        }
        let mut cursor = TableScanCursor::new(MapSource(map), vec![loc(10), loc(20), loc(30)], true, None);
        cursor.advance().unwrap();
        let state = cursor.prepare_to_yield();
        cursor.recover_from_yield(state).unwrap();
        cursor.advance().unwrap();
        assert_eq!(cursor.current_location(), Some(loc(20)));
    }

    #[test]
    fn test_index_scan_multi_key_dedup() {
        let mut map = HashMap::new();
        map.insert(loc(1), json!({"tags": ["a", "b"]}));
        let spec = IndexSpec::single("by_tag", "tags", crate::index::IndexDirection::Asc);
        let entries = vec![(vec![IndexKey::from_string("a")], loc(1)), (vec![IndexKey::from_string("b")], loc(1))];
        let mut cursor = IndexScanCursor::new(MapSource(map), spec, entries, true, true, false, None);
        let mut count = 0;
        while cursor.advance().unwrap() {
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
