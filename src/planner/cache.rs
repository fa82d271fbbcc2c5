//! `PlanCache`: `{pattern -> winning plan}`, invalidated on index
//! creation/drop, roughly a thousand writes to the namespace, or a
//! namespace drop.

use std::collections::HashMap;

use crate::config::CoreConfig;
use crate::planner::pattern::QueryPattern;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedPlan {
    TableScan,
    Index(String),
}

struct Entry {
    plan: CachedPlan,
    writes_since_cache: u64,
}

pub struct PlanCache {
    entries: HashMap<QueryPattern, Entry>,
    invalidate_after_writes: u64,
}

impl PlanCache {
    pub fn new(config: &CoreConfig) -> Self {
        Self { entries: HashMap::new(), invalidate_after_writes: config.plan_cache_invalidate_after_writes }
    }

    pub fn get(&self, pattern: &QueryPattern) -> Option<&CachedPlan> {
        self.entries.get(pattern).map(|e| &e.plan)
    }

    pub fn record_winner(&mut self, pattern: QueryPattern, plan: CachedPlan) {
        self.entries.insert(pattern, Entry { plan, writes_since_cache: 0 });
    }

    /// A write landed on the namespace; every cached entry ages by one
    /// and entries crossing the threshold are dropped.
    pub fn note_write(&mut self) {
        let threshold = self.invalidate_after_writes;
        self.entries.retain(|_, e| {
            e.writes_since_cache += 1;
            e.writes_since_cache < threshold
        });
    }

    /// An index was created or dropped; any cached plan naming it is
    /// stale.
    pub fn invalidate_index(&mut self, index_name: &str) {
        self.entries.retain(|_, e| !matches!(&e.plan, CachedPlan::Index(name) if name == index_name));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ast::Query;
    use serde_json::json;

    fn config_with_threshold(n: u64) -> CoreConfig {
        let mut c = CoreConfig::default();
        c.plan_cache_invalidate_after_writes = n;
        c
    }

    #[test]
    fn test_record_and_get() {
        let mut cache = PlanCache::new(&CoreConfig::default());
        let pattern = QueryPattern::from_query(&Query::new("users").filter_eq("age", json!(1)).with_limit(1));
        cache.record_winner(pattern.clone(), CachedPlan::Index("by_age".to_string()));
        assert_eq!(cache.get(&pattern), Some(&CachedPlan::Index("by_age".to_string())));
    }

    #[test]
    fn test_invalidate_after_writes() {
        let mut cache = PlanCache::new(&config_with_threshold(3));
        let pattern = QueryPattern::from_query(&Query::new("users").filter_eq("age", json!(1)).with_limit(1));
        cache.record_winner(pattern.clone(), CachedPlan::TableScan);
        cache.note_write();
        cache.note_write();
        assert!(cache.get(&pattern).is_some());
        cache.note_write();
        assert!(cache.get(&pattern).is_none());
    }

    #[test]
    fn test_invalidate_index_drops_matching_entries() {
        let mut cache = PlanCache::new(&CoreConfig::default());
        let pattern = QueryPattern::from_query(&Query::new("users").filter_eq("age", json!(1)).with_limit(1));
        cache.record_winner(pattern.clone(), CachedPlan::Index("by_age".to_string()));
        cache.invalidate_index("by_age");
        assert!(cache.get(&pattern).is_none());
    }

    #[test]
    fn test_clear_on_namespace_drop() {
        let mut cache = PlanCache::new(&CoreConfig::default());
        let pattern = QueryPattern::from_query(&Query::new("users").filter_eq("age", json!(1)).with_limit(1));
        cache.record_winner(pattern, CachedPlan::TableScan);
        cache.clear();
        assert!(cache.is_empty());
    }
}
