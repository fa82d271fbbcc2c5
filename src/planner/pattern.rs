//! `QueryPattern`: the shape of a query — which fields are predicated
//! with which operators, and the sort — independent of the literal
//! values compared against. Used as the plan cache's key, since two
//! queries of the same shape but different values should race to (and
//! reuse) the same plan.

use crate::planner::ast::{Query, SortDirection};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryPattern {
    namespace: String,
    clauses: Vec<Vec<(String, String)>>,
    sort: Vec<(String, bool)>,
}

impl QueryPattern {
    pub fn from_query(query: &Query) -> Self {
        let clauses = query
            .clauses
            .iter()
            .map(|clause| {
                let mut shape: Vec<(String, String)> = clause.iter().map(|p| (p.field.clone(), p.op.op_name().to_string())).collect();
                shape.sort();
                shape
            })
            .collect();
        let sort = query.sort.iter().map(|s| (s.field.clone(), s.direction == SortDirection::Asc)).collect();
        Self { namespace: query.namespace.clone(), clauses, sort }
    }
}
