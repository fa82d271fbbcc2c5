//! Observability subsystem.
//!
//! Structured, synchronous, deterministic logging used by the racer and the
//! capped storage engine to record plan choices, takeovers, cache
//! invalidation, and extent wraps. Carried from the teacher even though
//! `spec.md`'s Non-goals exclude aggregation: this is ambient plumbing, not
//! a scoped-out query feature.

mod logger;

pub use logger::{Logger, Severity};
