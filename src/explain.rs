//! `explain_query_info()`'s report: the same counters the winning plan
//! accumulates while iterating, surfaced for diagnostics rather than
//! folded into the query result itself.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cursor::Cursor;
use crate::planner::QueryPlan;

/// A snapshot of one query's execution, named after the fields a caller
/// inspecting a slow query actually wants: how many results were
/// returned versus how many records were touched to find them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplainReport {
    /// Documents returned to the caller.
    pub n: u64,
    /// Index entries or table-scan records examined.
    pub nscanned: u64,
    /// Documents actually fetched (less than `nscanned` when the winning
    /// plan's index covers every field the query needs).
    pub nscanned_objects: u64,
    /// Times the cursor yielded and recovered.
    pub n_yields: u64,
    /// Yields dropped because their location had moved out from under a
    /// capped namespace's cyclic allocator.
    pub n_chunk_skips: u64,
    /// Human-readable dump of the winning plan's per-field bounds; `None`
    /// for a table scan.
    pub index_bounds: Option<String>,
    pub is_multi_key: bool,
    pub scan_and_order: bool,
    pub index_only: bool,
}

impl ExplainReport {
    pub fn from_plan_and_cursor(plan: &QueryPlan, cursor: &dyn Cursor, n: u64, n_yields: u64, n_chunk_skips: u64) -> Self {
        let nscanned_objects = if cursor.key_fields_only() { 0 } else { n };
        Self {
            n,
            nscanned: cursor.n_scanned(),
            nscanned_objects,
            n_yields,
            n_chunk_skips,
            index_bounds: describe_bounds(plan),
            is_multi_key: cursor.is_multi_key(),
            scan_and_order: plan.scan_and_order_required,
            index_only: cursor.key_fields_only(),
        }
    }
}

fn describe_bounds(plan: &QueryPlan) -> Option<String> {
    match &plan.kind {
        crate::planner::PlanKind::TableScan { .. } => None,
        crate::planner::PlanKind::IndexScan { bounds, .. } => {
            let mut fields: Vec<&String> = bounds.keys().collect();
            fields.sort();
            let rendered: Vec<String> = fields
                .into_iter()
                .map(|f| format!("{}: {} range(s)", f, bounds[f].intervals().len()))
                .collect();
            Some(rendered.join(", "))
        }
    }
}

impl fmt::Display for ExplainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== EXPLAIN PLAN ===")?;
        writeln!(f, "n                : {}", self.n)?;
        writeln!(f, "nscanned         : {}", self.nscanned)?;
        writeln!(f, "nscannedObjects  : {}", self.nscanned_objects)?;
        writeln!(f, "nYields          : {}", self.n_yields)?;
        writeln!(f, "nChunkSkips      : {}", self.n_chunk_skips)?;
        writeln!(f, "indexBounds      : {}", self.index_bounds.as_deref().unwrap_or("(table scan)"))?;
        writeln!(f, "isMultiKey       : {}", self.is_multi_key)?;
        writeln!(f, "scanAndOrder     : {}", self.scan_and_order)?;
        write!(f, "indexOnly        : {}", self.index_only)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{IndexDirection, IndexSpec};
    use crate::planner::PlanKind;
    use std::collections::HashMap;

    #[test]
    fn test_table_scan_has_no_bounds() {
        let plan = QueryPlan::table_scan(true, true);
        assert_eq!(describe_bounds(&plan), None);
    }

    #[test]
    fn test_index_scan_describes_bounds() {
        let spec = IndexSpec::single("by_age", "age", IndexDirection::Asc);
        let mut bounds = HashMap::new();
        bounds.insert("age".to_string(), crate::planner::IntervalSet::full());
        let plan = QueryPlan { kind: PlanKind::IndexScan { spec, bounds, forward: true }, scan_and_order_required: false, index_only: false, optimal: false, in_order: true };
        assert_eq!(describe_bounds(&plan), Some("age: 1 range(s)".to_string()));
    }

    #[test]
    fn test_display_matches_expected_header() {
        let report = ExplainReport::default();
        let rendered = format!("{}", report);
        assert!(rendered.starts_with("=== EXPLAIN PLAN ==="));
    }

    #[test]
    fn test_serializes_camel_case() {
        let report = ExplainReport { n: 3, ..Default::default() };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["nscannedObjects"], serde_json::json!(0));
    }
}
