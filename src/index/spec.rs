//! `IndexSpec`: an ordered list of `(field, direction)` pairs describing a
//! compound index, generalizing the single-field index the rest of this
//! module was originally built around.

/// Ascending or descending for one field of an `IndexSpec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexDirection {
    Asc,
    Desc,
}

/// A compound index: an ordered list of fields, each with its own
/// direction. The first field is the "leading field" a query's predicate
/// must bound for the index to be a scan candidate at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<(String, IndexDirection)>,
}

impl IndexSpec {
    pub fn new(name: impl Into<String>, fields: Vec<(String, IndexDirection)>) -> Self {
        assert!(!fields.is_empty(), "an index needs at least one field");
        Self { name: name.into(), fields }
    }

    pub fn single(name: impl Into<String>, field: impl Into<String>, direction: IndexDirection) -> Self {
        Self::new(name, vec![(field.into(), direction)])
    }

    pub fn leading_field(&self) -> &str {
        &self.fields[0].0
    }

    pub fn leading_direction(&self) -> IndexDirection {
        self.fields[0].1
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|(f, _)| f.as_str()).collect()
    }

    /// True when `sort_fields` is satisfied by a prefix of this index in
    /// the same or exactly-reversed direction throughout (a reversible
    /// cursor can walk either way).
    pub fn satisfies_sort(&self, sort_fields: &[(String, IndexDirection)]) -> bool {
        if sort_fields.is_empty() || sort_fields.len() > self.fields.len() {
            return false;
        }
        let same = sort_fields
            .iter()
            .zip(self.fields.iter())
            .all(|((sf, sd), (f, d))| sf == f && sd == d);
        let reversed = sort_fields
            .iter()
            .zip(self.fields.iter())
            .all(|((sf, sd), (f, d))| sf == f && *sd != *d);
        same || reversed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leading_field() {
        let spec = IndexSpec::new(
            "by_a_b",
            vec![("a".into(), IndexDirection::Asc), ("b".into(), IndexDirection::Desc)],
        );
        assert_eq!(spec.leading_field(), "a");
    }

    #[test]
    fn test_satisfies_sort_prefix_and_reversed() {
        let spec = IndexSpec::new(
            "by_a_b",
            vec![("a".into(), IndexDirection::Asc), ("b".into(), IndexDirection::Asc)],
        );
        assert!(spec.satisfies_sort(&[("a".into(), IndexDirection::Asc)]));
        assert!(spec.satisfies_sort(&[("a".into(), IndexDirection::Desc)]));
        assert!(!spec.satisfies_sort(&[("b".into(), IndexDirection::Asc)]));
    }
}
