//! Normal (non-capped) namespace storage: the `NamespaceCatalog` and
//! `RecordFileManager` external collaborators, plus in-memory
//! implementations for tests and the CLI demo.
//!
//! Capped bookkeeping is entirely its own arena-based free-list logic
//! (`storage::capped`); these traits exist only for namespaces that grow
//! without bound.

use std::collections::HashMap;

use serde_json::Value;

use super::durable::DurableWriter;
use super::record::{DocumentRecord, RecordLocation};
use crate::errors::CoreResult;

/// What kind of storage engine backs a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    Normal,
    Capped,
}

/// Opaque namespace identifier handed out by a `NamespaceCatalog`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NamespaceId(pub u32);

/// Maps a namespace name to its id and kind.
pub trait NamespaceCatalog {
    fn create(&mut self, name: &str, kind: NamespaceKind) -> CoreResult<NamespaceId>;
    fn resolve(&self, name: &str) -> Option<(NamespaceId, NamespaceKind)>;
    fn drop_namespace(&mut self, name: &str) -> CoreResult<()>;
}

/// Allocates and frees records for a normal (non-capped) namespace.
pub trait RecordFileManager {
    fn allocate(&mut self, writer: &mut dyn DurableWriter, document: Value) -> CoreResult<RecordLocation>;
    fn delete(&mut self, writer: &mut dyn DurableWriter, loc: RecordLocation) -> CoreResult<()>;
    fn get(&self, loc: RecordLocation) -> Option<&Value>;
}

/// In-memory `NamespaceCatalog`, sufficient for the CLI demo and tests.
#[derive(Debug, Default)]
pub struct MemoryNamespaceCatalog {
    by_name: HashMap<String, (NamespaceId, NamespaceKind)>,
    next_id: u32,
}

impl MemoryNamespaceCatalog {
    pub fn new() -> Self {
        Self { by_name: HashMap::new(), next_id: 0 }
    }
}

impl NamespaceCatalog for MemoryNamespaceCatalog {
    fn create(&mut self, name: &str, kind: NamespaceKind) -> CoreResult<NamespaceId> {
        if let Some((id, _)) = self.by_name.get(name) {
            return Ok(*id);
        }
        let id = NamespaceId(self.next_id);
        self.next_id += 1;
        self.by_name.insert(name.to_string(), (id, kind));
        Ok(id)
    }

    fn resolve(&self, name: &str) -> Option<(NamespaceId, NamespaceKind)> {
        self.by_name.get(name).copied()
    }

    fn drop_namespace(&mut self, name: &str) -> CoreResult<()> {
        self.by_name.remove(name);
        Ok(())
    }
}

/// In-memory, append-only `RecordFileManager`: locations are monotonically
/// increasing offsets into `file_id`, freed slots are simply forgotten
/// (normal namespaces do not reuse space the way the capped engine does).
#[derive(Clone)]
pub struct MemoryRecordFileManager {
    file_id: u32,
    next_offset: u64,
    live: HashMap<RecordLocation, Value>,
    namespace: String,
}

impl MemoryRecordFileManager {
    pub fn new(namespace: impl Into<String>, file_id: u32) -> Self {
        Self { file_id, next_offset: 0, live: HashMap::new(), namespace: namespace.into() }
    }

    pub fn live_locations(&self) -> impl Iterator<Item = &RecordLocation> {
        self.live.keys()
    }
}

impl RecordFileManager for MemoryRecordFileManager {
    fn allocate(&mut self, writer: &mut dyn DurableWriter, document: Value) -> CoreResult<RecordLocation> {
        let record = DocumentRecord::live(self.namespace.clone(), document.clone());
        let bytes = record.serialize();
        let loc = RecordLocation::new(self.file_id, self.next_offset);
        let region = writer.writing(self.file_id, self.next_offset, bytes.len());
        region.copy_from_slice(&bytes);
        self.next_offset += bytes.len() as u64;
        self.live.insert(loc, document);
        Ok(loc)
    }

    fn delete(&mut self, writer: &mut dyn DurableWriter, loc: RecordLocation) -> CoreResult<()> {
        if self.live.remove(&loc).is_none() {
            return Ok(());
        }
        let tombstone = DocumentRecord::tombstone(self.namespace.clone());
        let bytes = tombstone.serialize();
        let region = writer.writing(self.file_id, self.next_offset, bytes.len());
        region.copy_from_slice(&bytes);
        self.next_offset += bytes.len() as u64;
        Ok(())
    }

    fn get(&self, loc: RecordLocation) -> Option<&Value> {
        self.live.get(&loc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::durable::MemoryDurableWriter;
    use serde_json::json;

    #[test]
    fn test_catalog_create_is_idempotent() {
        let mut catalog = MemoryNamespaceCatalog::new();
        let a = catalog.create("users", NamespaceKind::Normal).unwrap();
        let b = catalog.create("users", NamespaceKind::Normal).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_catalog_resolve_missing() {
        let catalog = MemoryNamespaceCatalog::new();
        assert!(catalog.resolve("missing").is_none());
    }

    #[test]
    fn test_allocate_and_delete() {
        let mut manager = MemoryRecordFileManager::new("users", 0);
        let mut writer = MemoryDurableWriter::new();
        let loc = manager.allocate(&mut writer, json!({"a": 1})).unwrap();
        assert_eq!(manager.get(loc), Some(&json!({"a": 1})));
        manager.delete(&mut writer, loc).unwrap();
        assert_eq!(manager.get(loc), None);
    }
}
