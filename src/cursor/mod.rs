//! Cursor abstraction: every iterator variant exposes the same
//! operation set from spec.md §4.A, including the yield contract that
//! lets a cursor survive a concurrent write between `advance` calls.

mod capped;
mod client;
mod geo;
mod scan;

pub use capped::CappedForwardCursor;
pub use client::{ClientCursorTable, CursorId};
pub use geo::Geo2DCursor;
pub use scan::{IndexScanCursor, TableScanCursor};

use serde_json::Value;

use crate::errors::CoreResult;
use crate::index::{IndexKey, IndexSpec};
use crate::matcher::Matcher;
use crate::storage::capped::CappedNamespace;
use crate::storage::{MemoryRecordFileManager, RecordFileManager, RecordLocation};

/// Fetches a document by its stable location. The external collaborator
/// every cursor variant reads through; implemented by the normal and
/// capped storage engines.
pub trait DocumentSource {
    fn fetch(&self, location: RecordLocation) -> Option<Value>;
}

impl DocumentSource for CappedNamespace {
    fn fetch(&self, location: RecordLocation) -> Option<Value> {
        self.get(location).cloned()
    }
}

impl DocumentSource for MemoryRecordFileManager {
    fn fetch(&self, location: RecordLocation) -> Option<Value> {
        RecordFileManager::get(self, location).cloned()
    }
}

/// State captured by `prepare_to_yield`, enough to resume strictly past
/// the last item returned, or fail recovery with a well-defined error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YieldState {
    pub last_key: Option<Vec<IndexKey>>,
    pub last_location: Option<RecordLocation>,
}

/// State captured by `prepare_to_touch_earlier_iterate`: only the live
/// iteration key, guaranteed resumable even if that document is deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TouchState {
    pub last_location: Option<RecordLocation>,
}

/// `get_cursor`'s index-selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorPolicy {
    /// Any plan may be used, including a table scan.
    Any,
    /// Only plans backed by an index (no table scan).
    IndexOnly,
    /// Prefer the primary key index; fall back to natural (table scan)
    /// order otherwise.
    IdElseNatural,
}

/// Every iterator exposes this operation set, whether it fronts a table
/// scan, one index, a capped namespace's live chain, a 2D nearest-first
/// geo scan, or (see `racer::RacerCursor`) several plans racing at once.
pub trait Cursor {
    fn ok(&self) -> bool;
    fn advance(&mut self) -> CoreResult<bool>;
    fn current_location(&self) -> Option<RecordLocation>;
    fn current_document(&self) -> Option<&Value>;
    /// `None` for plans with no index (table scan).
    fn current_key(&self) -> Option<&[IndexKey]>;
    fn index_key_pattern(&self) -> Option<&IndexSpec>;
    fn is_multi_key(&self) -> bool;
    fn matcher(&self) -> Option<&Matcher>;
    /// True when every field the query needs is present in the index
    /// key, so the document need not be fetched.
    fn key_fields_only(&self) -> bool;
    /// Membership test + insert against this cursor's own dedup set
    /// (distinct from a racer's cross-plan `DupSet`); used by multi-key
    /// index cursors to suppress re-visiting one document under two of
    /// its keys.
    fn get_set_dup(&mut self, location: RecordLocation) -> bool;
    fn prepare_to_yield(&mut self) -> YieldState;
    fn recover_from_yield(&mut self, state: YieldState) -> CoreResult<()>;
    fn prepare_to_touch_earlier_iterate(&mut self) -> TouchState;
    fn recover_from_touching_earlier_iterate(&mut self, state: TouchState) -> CoreResult<()>;
    fn n_scanned(&self) -> u64;
    fn note_location(&mut self, location: RecordLocation);
    fn check_location(&self, location: RecordLocation) -> bool;
}
