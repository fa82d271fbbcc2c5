//! Query AST: a tree of conjuncts and top-level disjuncts (`$or`).
//!
//! Generalized from a single-field, single-conjunct query to `clauses`, a
//! list of AND-conjunct lists standing for a top-level `$or` (a plain query
//! is the one-clause case). Predicate operators gained regex, existence,
//! and geo "near" alongside the original equality/range set.

use std::collections::HashMap;

use serde_json::Value;

/// A single conjunct's operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(Value),
    Gte(Value),
    Gt(Value),
    Lte(Value),
    Lt(Value),
    /// Regex match against a string field; not representable as a key
    /// range, so indexes can only be used to narrow a prefix is absent
    /// here — plans touching a regex predicate fall back to a filtered
    /// scan of the field's full range.
    Regex(String),
    /// `{field: {$exists: bool}}`, a nested-existence test.
    Exists(bool),
    /// 2D nearest-first geo predicate: sort candidates by distance from
    /// `(lon, lat)`, optionally capped at `max_distance_m` meters.
    Near { lon: f64, lat: f64, max_distance_m: Option<f64> },
}

impl FilterOp {
    pub fn is_equality(&self) -> bool {
        matches!(self, FilterOp::Eq(_))
    }

    pub fn is_range(&self) -> bool {
        matches!(self, FilterOp::Gte(_) | FilterOp::Gt(_) | FilterOp::Lte(_) | FilterOp::Lt(_))
    }

    /// True for predicate kinds that bound a contiguous key range and so
    /// can make an index leading field a scan candidate.
    pub fn is_boundable(&self) -> bool {
        self.is_equality() || self.is_range()
    }

    pub fn op_name(&self) -> &'static str {
        match self {
            FilterOp::Eq(_) => "eq",
            FilterOp::Gte(_) => "gte",
            FilterOp::Gt(_) => "gt",
            FilterOp::Lte(_) => "lte",
            FilterOp::Lt(_) => "lt",
            FilterOp::Regex(_) => "regex",
            FilterOp::Exists(_) => "exists",
            FilterOp::Near { .. } => "near",
        }
    }
}

/// One conjunct: a field plus its operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: FilterOp,
}

impl Predicate {
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Eq(value) }
    }

    pub fn gte(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Gte(value) }
    }

    pub fn gt(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Gt(value) }
    }

    pub fn lte(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Lte(value) }
    }

    pub fn lt(field: impl Into<String>, value: Value) -> Self {
        Self { field: field.into(), op: FilterOp::Lt(value) }
    }

    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self { field: field.into(), op: FilterOp::Regex(pattern.into()) }
    }

    pub fn exists(field: impl Into<String>, present: bool) -> Self {
        Self { field: field.into(), op: FilterOp::Exists(present) }
    }

    pub fn near(field: impl Into<String>, lon: f64, lat: f64, max_distance_m: Option<f64>) -> Self {
        Self { field: field.into(), op: FilterOp::Near { lon, lat, max_distance_m } }
    }

    pub fn is_equality(&self) -> bool {
        self.op.is_equality()
    }

    pub fn is_range(&self) -> bool {
        self.op.is_range()
    }

    pub fn is_boundable(&self) -> bool {
        self.op.is_boundable()
    }

    pub fn is_primary_key(&self) -> bool {
        self.field == "_id" && self.is_equality()
    }
}

/// A single top-level disjunct: an AND of conjuncts.
pub type Clause = Vec<Predicate>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }

    pub fn to_index_direction(self) -> crate::index::IndexDirection {
        match self {
            SortDirection::Asc => crate::index::IndexDirection::Asc,
            SortDirection::Desc => crate::index::IndexDirection::Desc,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }
}

/// A query: zero or more clauses (more than one is a top-level `$or`),
/// an optional compound sort, a mandatory limit, and planning options.
#[derive(Debug, Clone)]
pub struct Query {
    pub namespace: String,
    pub clauses: Vec<Clause>,
    pub sort: Vec<SortSpec>,
    pub limit: Option<u64>,
    pub hint: Option<String>,
    pub snapshot: bool,
    pub allow_out_of_order: bool,
}

impl Query {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            clauses: vec![Vec::new()],
            sort: Vec::new(),
            limit: None,
            hint: None,
            snapshot: false,
            allow_out_of_order: false,
        }
    }

    /// Adds a predicate to the single (non-`$or`) clause. Panics if the
    /// query already has more than one clause; build `$or` queries with
    /// `with_clause` instead.
    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        assert_eq!(self.clauses.len(), 1, "use with_clause to add $or disjuncts");
        self.clauses[0].push(predicate);
        self
    }

    pub fn filter_eq(self, field: impl Into<String>, value: Value) -> Self {
        self.with_predicate(Predicate::eq(field, value))
    }

    /// Appends a new `$or` disjunct (a full AND-conjunct list).
    pub fn with_clause(mut self, clause: Clause) -> Self {
        if self.clauses.len() == 1 && self.clauses[0].is_empty() {
            self.clauses[0] = clause;
        } else {
            self.clauses.push(clause);
        }
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_hint(mut self, index_name: impl Into<String>) -> Self {
        self.hint = Some(index_name.into());
        self
    }

    pub fn with_snapshot(mut self) -> Self {
        self.snapshot = true;
        self
    }

    pub fn with_allow_out_of_order(mut self) -> Self {
        self.allow_out_of_order = true;
        self
    }

    pub fn is_or(&self) -> bool {
        self.clauses.len() > 1
    }

    /// The sort as `(field, direction)` pairs, the shape the index
    /// catalog's `satisfies_sort` consumes.
    pub fn sort_pairs(&self) -> Vec<(String, crate::index::IndexDirection)> {
        self.sort.iter().map(|s| (s.field.clone(), s.direction.to_index_direction())).collect()
    }
}

/// Predicates of one clause grouped by field, for the generator's
/// per-index boundedness check.
pub fn predicates_by_field(clause: &[Predicate]) -> HashMap<&str, Vec<&Predicate>> {
    let mut map: HashMap<&str, Vec<&Predicate>> = HashMap::new();
    for pred in clause {
        map.entry(pred.field.as_str()).or_default().push(pred);
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_builder() {
        let query = Query::new("users").filter_eq("_id", json!("user_123")).with_limit(1);
        assert_eq!(query.namespace, "users");
        assert_eq!(query.limit, Some(1));
        assert!(!query.is_or());
    }

    #[test]
    fn test_or_query_builder() {
        let query = Query::new("users")
            .with_clause(vec![Predicate::eq("status", json!("active"))])
            .with_clause(vec![Predicate::eq("vip", json!(true))]);
        assert!(query.is_or());
        assert_eq!(query.clauses.len(), 2);
    }

    #[test]
    fn test_predicate_types() {
        let eq = Predicate::eq("name", json!("Alice"));
        assert!(eq.is_equality());
        assert!(!eq.is_range());

        let gte = Predicate::gte("age", json!(18));
        assert!(!gte.is_equality());
        assert!(gte.is_range());

        let re = Predicate::regex("name", "^A");
        assert!(!re.is_boundable());
    }

    #[test]
    fn test_primary_key_predicate() {
        let pk = Predicate::eq("_id", json!("abc"));
        assert!(pk.is_primary_key());
        let not_pk = Predicate::eq("email", json!("x@y.com"));
        assert!(!not_pk.is_primary_key());
    }

    #[test]
    fn test_predicates_by_field() {
        let clause = vec![Predicate::gte("age", json!(18)), Predicate::lt("age", json!(30))];
        let grouped = predicates_by_field(&clause);
        assert_eq!(grouped.get("age").unwrap().len(), 2);
    }
}
