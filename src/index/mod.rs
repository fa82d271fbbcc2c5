//! Index subsystem: sorted multimaps over compound `IndexSpec`s, derived
//! state rebuilt from storage on startup.
//!
//! - Derived state: indexes mirror storage, never the source of truth.
//! - In-memory only: no persistence.
//! - Deterministic: `BTreeMap` iteration order, sorted locations.
//! - Updates occur after storage writes; lookups return sorted locations.

mod errors;
mod key;
mod manager;
mod spec;
mod tree;

pub use errors::{IndexError, IndexErrorCode, IndexResult};
pub use key::IndexKey;
pub use manager::{DocumentInfo, IndexManager, StorageScan};
pub use spec::{IndexDirection, IndexSpec};
pub use tree::IndexTree;
