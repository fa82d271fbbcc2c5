//! Query planner: enumerates candidate plans for a clause per the
//! hint / snapshot / optimal-short-circuit / candidate-enumeration /
//! out-of-order-gate algorithm, caches the winner by `QueryPattern`.
//!
//! Every fallible function here returns `crate::errors::CoreResult` —
//! there is no planner-specific error type, since the one failure this
//! module can report (`NoOrderedPlan`) already has a crate-wide code.

mod ast;
mod cache;
mod generator;
mod intervals;
mod pattern;
mod plan;

pub use ast::{predicates_by_field, Clause, FilterOp, Predicate, Query, SortDirection, SortSpec};
pub use cache::{CachedPlan, PlanCache};
pub use generator::{generate, PlanSet};
pub use intervals::{EndPoint, Interval, IntervalSet};
pub use pattern::QueryPattern;
pub use plan::{PlanKind, QueryPlan};
