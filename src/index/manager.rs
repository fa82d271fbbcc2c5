//! `IndexManager`: in-memory indexes rebuilt from storage on startup,
//! maintained incrementally thereafter.
//!
//! Generalized from a single-field `HashSet<String>` of indexed fields to
//! a set of compound `IndexSpec`s, each keyed by its leading field for
//! the plan generator's "which indexes could serve this predicate"
//! lookup.

use std::collections::HashMap;

use serde_json::Value;

use super::errors::{IndexError, IndexResult};
use super::key::IndexKey;
use super::spec::IndexSpec;
use super::tree::IndexTree;
use crate::document::get_field;
use crate::storage::RecordLocation;

/// A document as seen by the index manager during rebuild or incremental
/// maintenance.
#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub namespace: String,
    pub is_tombstone: bool,
    pub document: Value,
    pub location: RecordLocation,
}

/// Scans storage sequentially during index rebuild.
pub trait StorageScan {
    fn scan_next(&mut self) -> IndexResult<Option<DocumentInfo>>;
    fn reset(&mut self) -> IndexResult<()>;
    fn current_offset(&self) -> u64;
}

struct NamedIndex {
    spec: IndexSpec,
    tree: IndexTree,
}

/// Maintains the primary-key index plus every secondary `IndexSpec`
/// registered for a namespace.
pub struct IndexManager {
    pk_index: IndexTree,
    indexes: Vec<NamedIndex>,
    /// Maps leading field name to the indexes' positions whose first
    /// field is that name, for the plan generator's candidate lookup.
    by_leading_field: HashMap<String, Vec<usize>>,
    doc_locations: HashMap<String, RecordLocation>,
}

impl IndexManager {
    pub fn new(specs: Vec<IndexSpec>) -> Self {
        let mut by_leading_field: HashMap<String, Vec<usize>> = HashMap::new();
        let indexes: Vec<NamedIndex> = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| {
                by_leading_field.entry(spec.leading_field().to_string()).or_default().push(i);
                NamedIndex { spec, tree: IndexTree::new() }
            })
            .collect();

        Self { pk_index: IndexTree::new(), indexes, by_leading_field, doc_locations: HashMap::new() }
    }

    pub fn pk_only() -> Self {
        Self::new(Vec::new())
    }

    /// Every `IndexSpec` whose leading field is `field`, for plan
    /// generation.
    pub fn specs_for_leading_field(&self, field: &str) -> Vec<&IndexSpec> {
        self.by_leading_field
            .get(field)
            .into_iter()
            .flatten()
            .map(|&i| &self.indexes[i].spec)
            .collect()
    }

    pub fn all_specs(&self) -> Vec<&IndexSpec> {
        self.indexes.iter().map(|ix| &ix.spec).collect()
    }

    pub fn is_multi_key(&self, index_name: &str) -> bool {
        self.indexes.iter().find(|ix| ix.spec.name == index_name).map(|ix| ix.tree.is_multi_key()).unwrap_or(false)
    }

    pub fn rebuild_from_storage<S: StorageScan>(&mut self, storage: &mut S) -> IndexResult<()> {
        self.pk_index.clear();
        for index in &mut self.indexes {
            index.tree.clear();
        }
        self.doc_locations.clear();

        storage.reset()?;

        loop {
            let doc = match storage.scan_next() {
                Ok(Some(d)) => d,
                Ok(None) => break,
                Err(e) => return Err(IndexError::data_corruption(storage.current_offset(), e.message())),
            };

            if doc.is_tombstone {
                continue;
            }
            self.index_document(&doc);
        }

        Ok(())
    }

    fn keys_for_spec(spec: &IndexSpec, document: &Value) -> Option<Vec<IndexKey>> {
        let mut keys = Vec::with_capacity(spec.fields.len());
        for (field, _) in &spec.fields {
            let value = get_field(document, field)?;
            keys.push(IndexKey::from_json(value)?);
        }
        Some(keys)
    }

    fn index_document(&mut self, doc: &DocumentInfo) {
        let pk = get_field(&doc.document, "_id").and_then(IndexKey::from_json);
        if let Some(pk_key) = pk {
            self.pk_index.insert(vec![pk_key], doc.location);
        }
        self.doc_locations.insert(doc.namespace.clone(), doc.location);

        for index in &mut self.indexes {
            if let Some(keys) = Self::keys_for_spec(&index.spec, &doc.document) {
                index.tree.insert_document(vec![keys], doc.location);
            }
        }
    }

    fn unindex_document(&mut self, document: &Value, location: RecordLocation) {
        if let Some(pk_key) = get_field(document, "_id").and_then(IndexKey::from_json) {
            self.pk_index.remove(&[pk_key], location);
        }
        for index in &mut self.indexes {
            if let Some(keys) = Self::keys_for_spec(&index.spec, document) {
                index.tree.remove(&keys, location);
            }
        }
    }

    pub fn apply_write(&mut self, doc: &DocumentInfo) {
        self.index_document(doc);
    }

    pub fn apply_delete(&mut self, document: &Value, location: RecordLocation) {
        self.unindex_document(document, location);
    }

    pub fn lookup_pk(&self, value: &Value) -> Vec<RecordLocation> {
        match IndexKey::from_json(value) {
            Some(key) => self.pk_index.lookup_eq(&[key]),
            None => Vec::new(),
        }
    }

    pub fn lookup_eq(&self, index_name: &str, key: &[IndexKey]) -> Vec<RecordLocation> {
        self.indexes
            .iter()
            .find(|ix| ix.spec.name == index_name)
            .map(|ix| ix.tree.lookup_eq(key))
            .unwrap_or_default()
    }

    pub fn lookup_range(&self, index_name: &str, min: Option<&[IndexKey]>, max: Option<&[IndexKey]>) -> Vec<RecordLocation> {
        self.indexes
            .iter()
            .find(|ix| ix.spec.name == index_name)
            .map(|ix| ix.tree.lookup_range(min, max))
            .unwrap_or_default()
    }

    pub fn all_pk_locations(&self) -> Vec<RecordLocation> {
        self.pk_index.lookup_range(None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::spec::IndexDirection;
    use serde_json::json;

    struct MockStorage {
        documents: Vec<DocumentInfo>,
        position: usize,
        corrupt_at: Option<usize>,
    }

    impl MockStorage {
        fn new(documents: Vec<DocumentInfo>) -> Self {
            Self { documents, position: 0, corrupt_at: None }
        }

        fn with_corruption_at(mut self, index: usize) -> Self {
            self.corrupt_at = Some(index);
            self
        }
    }

    impl StorageScan for MockStorage {
        fn scan_next(&mut self) -> IndexResult<Option<DocumentInfo>> {
            if self.position >= self.documents.len() {
                return Ok(None);
            }
            if self.corrupt_at == Some(self.position) {
                return Err(IndexError::data_corruption(self.documents[self.position].location.offset, "checksum mismatch"));
            }
            let doc = self.documents[self.position].clone();
            self.position += 1;
            Ok(Some(doc))
        }

        fn reset(&mut self) -> IndexResult<()> {
            self.position = 0;
            Ok(())
        }

        fn current_offset(&self) -> u64 {
            self.documents.get(self.position).map(|d| d.location.offset).unwrap_or(0)
        }
    }

    fn make_doc(id: &str, age: i64, offset: u64) -> DocumentInfo {
        DocumentInfo {
            namespace: "users".to_string(),
            is_tombstone: false,
            document: json!({"_id": id, "age": age}),
            location: RecordLocation::new(0, offset),
        }
    }

    fn make_tombstone(id: &str, offset: u64) -> DocumentInfo {
        DocumentInfo {
            namespace: "users".to_string(),
            is_tombstone: true,
            document: json!({"_id": id}),
            location: RecordLocation::new(0, offset),
        }
    }

    fn age_index() -> IndexManager {
        IndexManager::new(vec![IndexSpec::single("by_age", "age", IndexDirection::Asc)])
    }

    #[test]
    fn test_rebuild_from_storage() {
        let docs = vec![make_doc("user_1", 25, 100), make_doc("user_2", 30, 200), make_doc("user_3", 25, 300)];
        let mut storage = MockStorage::new(docs);
        let mut manager = age_index();
        manager.rebuild_from_storage(&mut storage).unwrap();

        assert_eq!(manager.lookup_pk(&json!("user_1")), vec![RecordLocation::new(0, 100)]);
        let age_25 = manager.lookup_eq("by_age", &[IndexKey::from_int(25)]);
        assert_eq!(age_25, vec![RecordLocation::new(0, 100), RecordLocation::new(0, 300)]);
    }

    #[test]
    fn test_delete_removes_index_entry() {
        let mut manager = IndexManager::pk_only();
        let doc = make_doc("user_1", 25, 100);
        manager.apply_write(&doc);
        assert_eq!(manager.lookup_pk(&json!("user_1")), vec![RecordLocation::new(0, 100)]);
        manager.apply_delete(&doc.document, doc.location);
        assert!(manager.lookup_pk(&json!("user_1")).is_empty());
    }

    #[test]
    fn test_lookup_range_deterministic() {
        let docs = vec![
            make_doc("user_1", 20, 100),
            make_doc("user_2", 25, 200),
            make_doc("user_3", 30, 300),
            make_doc("user_4", 35, 400),
        ];
        let mut storage = MockStorage::new(docs);
        let mut manager = age_index();
        manager.rebuild_from_storage(&mut storage).unwrap();

        let result = manager.lookup_range("by_age", Some(&[IndexKey::from_int(25)]), Some(&[IndexKey::from_int(35)]));
        assert_eq!(result, vec![RecordLocation::new(0, 200), RecordLocation::new(0, 300), RecordLocation::new(0, 400)]);
    }

    #[test]
    fn test_corruption_during_rebuild_halts() {
        let docs = vec![make_doc("user_1", 25, 100), make_doc("user_2", 30, 200)];
        let mut storage = MockStorage::new(docs).with_corruption_at(1);
        let mut manager = IndexManager::pk_only();
        let result = manager.rebuild_from_storage(&mut storage);
        assert!(result.is_err());
        assert_eq!(result.unwrap_err().code().code(), "DATA_CORRUPTION");
    }

    #[test]
    fn test_tombstones_ignored() {
        let docs = vec![make_doc("user_1", 25, 100), make_tombstone("user_2", 200), make_doc("user_3", 30, 300)];
        let mut storage = MockStorage::new(docs);
        let mut manager = IndexManager::pk_only();
        manager.rebuild_from_storage(&mut storage).unwrap();
        assert!(manager.lookup_pk(&json!("user_2")).is_empty());
        assert_eq!(manager.lookup_pk(&json!("user_1")), vec![RecordLocation::new(0, 100)]);
    }

    #[test]
    fn test_specs_for_leading_field() {
        let manager = age_index();
        assert_eq!(manager.specs_for_leading_field("age").len(), 1);
        assert_eq!(manager.specs_for_leading_field("missing").len(), 0);
    }
}
