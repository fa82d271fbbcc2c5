//! Long-lived cursor handles, registered once a result set outlives a
//! single request and reclaimed either by an explicit namespace drop or
//! by idle timeout.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::Cursor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CursorId(u64);

impl CursorId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

struct Entry {
    namespace: String,
    cursor: Box<dyn Cursor>,
    last_touched: Instant,
}

pub struct ClientCursorTable {
    entries: HashMap<CursorId, Entry>,
    next_id: u64,
    idle_timeout: Duration,
}

impl ClientCursorTable {
    pub fn new(idle_timeout_secs: u64) -> Self {
        Self { entries: HashMap::new(), next_id: 1, idle_timeout: Duration::from_secs(idle_timeout_secs) }
    }

    pub fn register(&mut self, namespace: impl Into<String>, cursor: Box<dyn Cursor>) -> CursorId {
        let id = CursorId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, Entry { namespace: namespace.into(), cursor, last_touched: Instant::now() });
        id
    }

    pub fn get_mut(&mut self, id: CursorId) -> Option<&mut dyn Cursor> {
        let entry = self.entries.get_mut(&id)?;
        entry.last_touched = Instant::now();
        Some(entry.cursor.as_mut())
    }

    pub fn remove(&mut self, id: CursorId) -> Option<Box<dyn Cursor>> {
        self.entries.remove(&id).map(|e| e.cursor)
    }

    pub fn contains(&self, id: CursorId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Drops every cursor open against `namespace` (collection drop).
    pub fn invalidate_namespace(&mut self, namespace: &str) {
        self.entries.retain(|_, entry| entry.namespace != namespace);
    }

    /// Drops every cursor idle past the configured timeout; returns the
    /// reaped ids.
    pub fn reap_idle(&mut self) -> Vec<CursorId> {
        let timeout = self.idle_timeout;
        let now = Instant::now();
        let expired: Vec<CursorId> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_touched) >= timeout)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::CoreResult;
    use crate::index::{IndexKey, IndexSpec};
    use crate::matcher::Matcher;
    use crate::storage::RecordLocation;
    use serde_json::Value;

    struct StubCursor;
    impl Cursor for StubCursor {
        fn ok(&self) -> bool {
            true
        }
        fn advance(&mut self) -> CoreResult<bool> {
            Ok(false)
        }
        fn current_location(&self) -> Option<RecordLocation> {
            None
        }
        fn current_document(&self) -> Option<&Value> {
            None
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
            None
        }
        fn key_fields_only(&self) -> bool {
            false
        }
        fn get_set_dup(&mut self, _location: RecordLocation) -> bool {
            false
        }
        fn prepare_to_yield(&mut self) -> super::super::YieldState {
            Default::default()
        }
        fn recover_from_yield(&mut self, _state: super::super::YieldState) -> CoreResult<()> {
            Ok(())
        }
        fn prepare_to_touch_earlier_iterate(&mut self) -> super::super::TouchState {
            Default::default()
        }
        fn recover_from_touching_earlier_iterate(&mut self, _state: super::super::TouchState) -> CoreResult<()> {
            Ok(())
        }
        fn n_scanned(&self) -> u64 {
            0
        }
        fn note_location(&mut self, _location: RecordLocation) {}
        fn check_location(&self, _location: RecordLocation) -> bool {
            false
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut table = ClientCursorTable::new(600);
        let id = table.register("people", Box::new(StubCursor));
        assert!(table.get_mut(id).is_some());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_invalidate_namespace_drops_its_cursors() {
        let mut table = ClientCursorTable::new(600);
        let id_a = table.register("people", Box::new(StubCursor));
        let id_b = table.register("orders", Box::new(StubCursor));
        table.invalidate_namespace("people");
        assert!(!table.contains(id_a));
        assert!(table.contains(id_b));
    }

    #[test]
    fn test_reap_idle_with_zero_timeout() {
        let mut table = ClientCursorTable::new(0);
        table.register("people", Box::new(StubCursor));
        let reaped = table.reap_idle();
        assert_eq!(reaped.len(), 1);
        assert!(table.is_empty());
    }
}
