//! Range elimination across `$or` clauses: a clause whose every boundable
//! field is already fully covered by earlier clauses contributes nothing
//! new and is skipped before a plan or cursor is ever built for it.
//!
//! This is a scan-avoidance optimization, not a correctness mechanism —
//! the shared `DupSet` guarantees no duplicate output regardless of how
//! conservative or aggressive this elimination is.

use std::collections::HashMap;

use crate::planner::{predicates_by_field, Clause, IntervalSet};

/// Indices (in original order) of clauses that must still be executed.
pub fn surviving_clause_indices(clauses: &[Clause]) -> Vec<usize> {
    let mut covered: HashMap<String, IntervalSet> = HashMap::new();
    let mut keep = Vec::new();

    for (i, clause) in clauses.iter().enumerate() {
        let by_field = predicates_by_field(clause);
        let mut boundable_sets: Vec<(String, IntervalSet)> = Vec::new();
        let mut redundant = false;

        for (field, preds) in &by_field {
            let Some(set) = IntervalSet::from_boundable_predicates(preds) else { continue };
            let prior = covered.get(*field).cloned().unwrap_or_else(IntervalSet::empty);
            if set.subtract(&prior).is_empty() {
                redundant = true;
            }
            boundable_sets.push((field.to_string(), set));
        }

        if redundant && !boundable_sets.is_empty() {
            continue;
        }

        keep.push(i);
        for (field, set) in boundable_sets {
            let entry = covered.entry(field).or_insert_with(IntervalSet::empty);
            *entry = entry.union(&set);
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::Predicate;
    use serde_json::json;

    #[test]
    fn test_all_clauses_kept_when_disjoint() {
        let clauses = vec![vec![Predicate::eq("status", json!("a"))], vec![Predicate::eq("status", json!("b"))]];
        assert_eq!(surviving_clause_indices(&clauses), vec![0, 1]);
    }

    #[test]
    fn test_redundant_subrange_is_skipped() {
        let clauses = vec![
            vec![Predicate::gte("age", json!(0))],
            vec![Predicate::gte("age", json!(18)), Predicate::lt("age", json!(30))],
        ];
        assert_eq!(surviving_clause_indices(&clauses), vec![0]);
    }

    #[test]
    fn test_non_boundable_clause_always_kept() {
        let clauses = vec![vec![Predicate::gte("age", json!(0))], vec![Predicate::regex("name", "^A")]];
        assert_eq!(surviving_clause_indices(&clauses), vec![0, 1]);
    }

    #[test]
    fn test_partial_overlap_keeps_clause() {
        let clauses = vec![vec![Predicate::lt("age", json!(20))], vec![Predicate::gte("age", json!(10)), Predicate::lt("age", json!(40))]];
        assert_eq!(surviving_clause_indices(&clauses), vec![0, 1]);
    }
}
