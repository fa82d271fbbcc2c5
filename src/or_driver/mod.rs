//! `$or` clause driver: runs each top-level disjunct in order, eliminating
//! clauses whose coverage is already subsumed by earlier ones and
//! deduping across all of them with one shared `DupSet`.

mod cursor;
mod ranges;

pub use cursor::OrDriverCursor;
pub use ranges::surviving_clause_indices;
