//! The plan generator: given a namespace's index catalog, one query
//! clause, and a requested sort, enumerates candidate plans per the
//! five-step algorithm: hint, snapshot, optimal-plan short circuit,
//! candidate enumeration, and the out-of-order/`NoOrderedPlan` gate.

use std::collections::HashMap;

use crate::errors::{CoreError, CoreResult};
use crate::index::{IndexDirection, IndexManager, IndexSpec};
use crate::planner::ast::{predicates_by_field, Clause, Predicate};
use crate::planner::intervals::IntervalSet;
use crate::planner::plan::QueryPlan;

/// The set of plans produced for one clause. `optimal` plan sets always
/// have exactly one member and bypass the plan cache and racer entirely.
pub struct PlanSet {
    pub plans: Vec<QueryPlan>,
    pub optimal: bool,
}

fn bounds_for_spec(spec: &IndexSpec, by_field: &HashMap<&str, Vec<&Predicate>>) -> HashMap<String, IntervalSet> {
    spec.fields
        .iter()
        .map(|(field, _)| {
            let set = by_field.get(field.as_str()).and_then(|preds| IntervalSet::from_boundable_predicates(preds)).unwrap_or_else(IntervalSet::full);
            (field.clone(), set)
        })
        .collect()
}

fn build_index_plan(spec: &IndexSpec, by_field: &HashMap<&str, Vec<&Predicate>>, sort_pairs: &[(String, IndexDirection)], optimal: bool) -> QueryPlan {
    let bounds = bounds_for_spec(spec, by_field);
    let in_order = sort_pairs.is_empty() || spec.satisfies_sort(sort_pairs);
    QueryPlan::index_scan(spec.clone(), bounds, true, false, optimal, in_order)
}

/// Every field of `spec`, not only its leading field, maps to a
/// contiguous range under `by_field` — the optimal-plan condition.
fn is_fully_bounded(spec: &IndexSpec, by_field: &HashMap<&str, Vec<&Predicate>>) -> bool {
    spec.fields.iter().all(|(field, _)| {
        by_field.get(field.as_str()).map(|preds| IntervalSet::from_boundable_predicates(preds).is_some()).unwrap_or(false)
    })
}

pub fn generate(
    index_manager: &IndexManager,
    clause: &Clause,
    sort_pairs: &[(String, IndexDirection)],
    hint: Option<&str>,
    snapshot: bool,
    allow_out_of_order: bool,
) -> CoreResult<PlanSet> {
    let by_field = predicates_by_field(clause);

    // Step 1: a hint pins exactly one plan, bypassing every other rule.
    if let Some(hint_name) = hint {
        let plan = match index_manager.all_specs().into_iter().find(|s| s.name == hint_name) {
            Some(spec) => build_index_plan(spec, &by_field, sort_pairs, false),
            None => QueryPlan::table_scan(true, sort_pairs.is_empty()),
        };
        return Ok(PlanSet { plans: vec![plan], optimal: false });
    }

    // Step 2: $snapshot uses the primary key index, or a table scan if
    // none is registered under that name.
    if snapshot {
        let pk_spec = IndexSpec::single("_id", "_id", IndexDirection::Asc);
        let plan = build_index_plan(&pk_spec, &by_field, sort_pairs, false);
        return Ok(PlanSet { plans: vec![plan], optimal: false });
    }

    // Step 3: an index bounding every one of its fields, whose order
    // also satisfies the sort, is optimal and returned alone.
    for spec in index_manager.all_specs() {
        if is_fully_bounded(spec, &by_field) && (sort_pairs.is_empty() || spec.satisfies_sort(sort_pairs)) {
            let plan = build_index_plan(spec, &by_field, sort_pairs, true);
            return Ok(PlanSet { plans: vec![plan], optimal: true });
        }
    }

    // Step 4: enumerate every index whose leading field is bounded, plus
    // the table-scan plan.
    let mut candidates = Vec::new();
    let mut seen_specs = std::collections::HashSet::new();
    for field in by_field.keys() {
        for spec in index_manager.specs_for_leading_field(field) {
            if !seen_specs.insert(spec.name.clone()) {
                continue;
            }
            let leading_preds = by_field.get(spec.leading_field()).map(|v| v.as_slice()).unwrap_or(&[]);
            if IntervalSet::from_boundable_predicates(leading_preds).is_some() {
                candidates.push(build_index_plan(spec, &by_field, sort_pairs, false));
            }
        }
    }
    candidates.push(QueryPlan::table_scan(true, sort_pairs.is_empty()));

    // Step 5: out-of-order plans are only kept when the caller opted in;
    // if none remain and a sort was requested, planning fails outright.
    let sort_required = !sort_pairs.is_empty();
    if sort_required && !allow_out_of_order {
        candidates.retain(|p| p.in_order);
        if candidates.is_empty() {
            return Err(CoreError::no_ordered_plan("no candidate plan satisfies the requested sort and out-of-order iteration was not permitted"));
        }
    }

    Ok(PlanSet { plans: candidates, optimal: false })
}
