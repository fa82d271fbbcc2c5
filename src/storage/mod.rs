//! Storage subsystem: record format, checksums, the `DurableWriter`
//! collaborator seam, the capped storage engine, and the normal-namespace
//! allocator.
//!
//! Capped and normal namespaces are deliberately separate engines: capped
//! collections reuse space via their own free-list/compaction logic
//! (`capped`), while normal namespaces grow without bound and never reuse
//! a deleted record's space (`normal`).

pub mod capped;
mod checksum;
mod durable;
mod errors;
mod normal;
mod record;

pub use checksum::compute_checksum;
pub use durable::{DurableWriter, MemoryDurableWriter};
pub use errors::{StorageError, StorageResult};
pub use normal::{
    MemoryNamespaceCatalog, MemoryRecordFileManager, NamespaceCatalog, NamespaceId, NamespaceKind,
    RecordFileManager,
};
pub use record::{DocumentRecord, RecordLocation};
