//! The capped storage engine: a fixed-capacity, cyclic FIFO collection.
//!
//! See `engine` for the allocator/compaction/truncation algorithms and
//! `layout` for the packed on-disk header shapes they write through a
//! `DurableWriter`.

mod engine;
mod layout;

pub use engine::{CapFirstNewRecord, CappedNamespace, Extent, ExtentId};
