//! `Engine`: the in-process facade the CLI drives. Owns one namespace
//! catalog, one record manager per normal namespace, one capped namespace
//! per capped collection, and one `IndexManager` per namespace, and wires
//! the generator/racer/or_driver/cursor pieces into a single `query` call.
//!
//! There is no durable persistence here (see `storage::DurableWriter`'s
//! doc comment): every `Engine` lives for one CLI invocation.

use std::collections::HashMap;
use std::rc::Rc;
use std::cell::RefCell;

use serde_json::Value;

use crate::config::CoreConfig;
use crate::cursor::{CappedForwardCursor, Cursor, Geo2DCursor, IndexScanCursor, TableScanCursor};
use crate::document::get_field;
use crate::dupset::DupSet;
use crate::errors::{CoreError, CoreResult};
use crate::explain::ExplainReport;
use crate::index::{DocumentInfo, IndexKey, IndexManager, IndexSpec};
use crate::matcher::Matcher;
use crate::observability::Logger;
use crate::or_driver::{surviving_clause_indices, OrDriverCursor};
use crate::planner::{self, CachedPlan, EndPoint, FilterOp, IntervalSet, PlanCache, PlanKind, Predicate, Query, QueryPattern, QueryPlan};
use crate::racer::RacerCursor;
use crate::storage::capped::CappedNamespace;
use crate::storage::{
    MemoryDurableWriter, MemoryNamespaceCatalog, MemoryRecordFileManager, NamespaceCatalog,
    NamespaceKind, RecordFileManager, RecordLocation,
};

const DEFAULT_CAPPED_EXTENT: u64 = 65_536;

pub struct Engine {
    catalog: MemoryNamespaceCatalog,
    normals: HashMap<String, MemoryRecordFileManager>,
    cappeds: HashMap<String, CappedNamespace>,
    indexes: HashMap<String, IndexManager>,
    plan_caches: HashMap<String, PlanCache>,
    writer: MemoryDurableWriter,
    config: CoreConfig,
    next_file_id: u32,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CoreConfig::default())
    }
}

impl Engine {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            catalog: MemoryNamespaceCatalog::new(),
            normals: HashMap::new(),
            cappeds: HashMap::new(),
            indexes: HashMap::new(),
            plan_caches: HashMap::new(),
            writer: MemoryDurableWriter::new(),
            config,
            next_file_id: 0,
        }
    }

    pub fn create_namespace(&mut self, name: &str, kind: NamespaceKind, capped_extents: Option<&[u64]>) -> CoreResult<()> {
        self.catalog.create(name, kind)?;
        let file_id = self.next_file_id;
        self.next_file_id += 1;

        match kind {
            NamespaceKind::Normal => {
                self.normals.entry(name.to_string()).or_insert_with(|| MemoryRecordFileManager::new(name, file_id));
            }
            NamespaceKind::Capped => {
                let owned;
                let extents = match capped_extents {
                    Some(e) => e,
                    None => {
                        owned = [DEFAULT_CAPPED_EXTENT];
                        &owned
                    }
                };
                self.cappeds.entry(name.to_string()).or_insert_with(|| CappedNamespace::new(name, file_id, extents));
            }
        }
        self.indexes.entry(name.to_string()).or_insert_with(IndexManager::pk_only);
        let config = self.config;
        self.plan_caches.entry(name.to_string()).or_insert_with(|| PlanCache::new(&config));

        Logger::info(
            "NAMESPACE_CREATED",
            &[("namespace", name), ("kind", if kind == NamespaceKind::Capped { "capped" } else { "normal" })],
        );
        Ok(())
    }

    pub fn insert(&mut self, namespace: &str, document: Value) -> CoreResult<RecordLocation> {
        let (_, kind) = self
            .catalog
            .resolve(namespace)
            .ok_or_else(|| CoreError::integrity_error(format!("unknown namespace '{namespace}'")))?;

        let location = match kind {
            NamespaceKind::Normal => {
                let normal = self
                    .normals
                    .get_mut(namespace)
                    .ok_or_else(|| CoreError::integrity_error(format!("namespace '{namespace}' has no record manager")))?;
                normal.allocate(&mut self.writer, document.clone())?
            }
            NamespaceKind::Capped => {
                let capped = self
                    .cappeds
                    .get_mut(namespace)
                    .ok_or_else(|| CoreError::integrity_error(format!("namespace '{namespace}' has no capped store")))?;
                capped.insert(&mut self.writer, document.clone())?
            }
        };

        if let Some(manager) = self.indexes.get_mut(namespace) {
            manager.apply_write(&DocumentInfo { namespace: namespace.to_string(), is_tombstone: false, document, location });
        }
        if let Some(cache) = self.plan_caches.get_mut(namespace) {
            cache.note_write();
        }

        Logger::info("DOCUMENT_INSERTED", &[("namespace", namespace)]);
        Ok(location)
    }

    /// Rebuilds the namespace's `IndexManager` with `spec` added, replaying
    /// every live normal-namespace document through it. Capped namespaces
    /// carry no secondary indexes (see `storage::capped`'s module doc).
    pub fn create_index(&mut self, namespace: &str, spec: IndexSpec) -> CoreResult<()> {
        if !self.normals.contains_key(namespace) {
            return Err(CoreError::integrity_error(format!(
                "'{namespace}' is not a normal namespace; capped namespaces carry no secondary indexes"
            )));
        }

        let existing = self.indexes.remove(namespace).unwrap_or_else(IndexManager::pk_only);
        let mut specs: Vec<IndexSpec> = existing.all_specs().into_iter().cloned().collect();
        specs.push(spec.clone());
        let mut manager = IndexManager::new(specs);

        let normal = &self.normals[namespace];
        for &loc in normal.live_locations() {
            if let Some(doc) = RecordFileManager::get(normal, loc) {
                manager.apply_write(&DocumentInfo { namespace: namespace.to_string(), is_tombstone: false, document: doc.clone(), location: loc });
            }
        }

        self.indexes.insert(namespace.to_string(), manager);
        if let Some(cache) = self.plan_caches.get_mut(namespace) {
            cache.clear();
        }
        Logger::info("INDEX_CREATED", &[("namespace", namespace), ("index", &spec.name)]);
        Ok(())
    }

    pub fn query(&mut self, query: &Query) -> CoreResult<(Vec<Value>, ExplainReport)> {
        let (_, kind) = self
            .catalog
            .resolve(&query.namespace)
            .ok_or_else(|| CoreError::integrity_error(format!("unknown namespace '{}'", query.namespace)))?;

        match kind {
            NamespaceKind::Capped => self.query_capped(query),
            NamespaceKind::Normal => self.query_normal(query),
        }
    }

    fn query_capped(&mut self, query: &Query) -> CoreResult<(Vec<Value>, ExplainReport)> {
        let ns = self
            .cappeds
            .get(&query.namespace)
            .ok_or_else(|| CoreError::integrity_error(format!("namespace '{}' has no capped store", query.namespace)))?;
        if query.is_or() {
            return Err(CoreError::integrity_error("capped namespaces do not support $or queries"));
        }
        let clause = query.clauses.first().cloned().unwrap_or_default();
        let matcher = Matcher::new(clause);
        let mut cursor = CappedForwardCursor::new(ns, Some(matcher));

        let mut results = Vec::new();
        while cursor.advance()? {
            let Some(doc) = cursor.current_document() else { continue };
            if cursor.matcher().map(|m| m.matches(doc)).unwrap_or(true) {
                results.push(doc.clone());
                if let Some(limit) = query.limit {
                    if results.len() as u64 >= limit {
                        break;
                    }
                }
            }
        }

        let plan = QueryPlan::table_scan(true, true);
        let explain = ExplainReport::from_plan_and_cursor(&plan, &cursor, results.len() as u64, 0, 0);
        Ok((results, explain))
    }

    fn query_normal(&mut self, query: &Query) -> CoreResult<(Vec<Value>, ExplainReport)> {
        let normal = self
            .normals
            .get(&query.namespace)
            .ok_or_else(|| CoreError::integrity_error(format!("namespace '{}' has no record manager", query.namespace)))?;
        let index_manager = self
            .indexes
            .get(&query.namespace)
            .ok_or_else(|| CoreError::integrity_error(format!("namespace '{}' has no index manager", query.namespace)))?;

        let sort_pairs = query.sort_pairs();
        let surviving = if query.is_or() { surviving_clause_indices(&query.clauses) } else { vec![0] };
        if surviving.is_empty() {
            return Err(CoreError::integrity_error("every $or clause was eliminated as redundant"));
        }

        let dupset = Rc::new(RefCell::new(DupSet::new(self.config.dupset_array_capacity)));
        let mut clause_cursors: Vec<Box<dyn Cursor>> = Vec::with_capacity(surviving.len());
        let mut representative_plan: Option<QueryPlan> = None;

        // A single (non-`$or`) clause is the only shape the plan cache
        // tracks: a disjunction's winner can't be summarized as one plan.
        let cacheable_pattern = (!query.is_or() && query.hint.is_none()).then(|| {
            QueryPattern::from_query(&Query::new(query.namespace.clone()).with_clause(query.clauses[surviving[0]].clone()).with_sort(query.sort.clone()))
        });
        let cached_plan = cacheable_pattern
            .as_ref()
            .and_then(|pattern| self.plan_caches.get(&query.namespace).and_then(|c| c.get(pattern)).cloned());

        for &ci in &surviving {
            let clause = &query.clauses[ci];

            // `near` has no key-range representation, so a clause carrying
            // one is driven directly by the nearest-first geo cursor
            // instead of going through the planner at all.
            if let Some(geo) = Self::near_predicate(clause) {
                let FilterOp::Near { lon, lat, .. } = &geo.op else { unreachable!() };
                let (lon, lat) = (*lon, *lat);
                let matcher = Matcher::new(clause.clone());
                let candidates: Vec<(RecordLocation, Value)> =
                    normal.live_locations().filter_map(|&loc| RecordFileManager::get(normal, loc).map(|doc| (loc, doc.clone()))).collect();
                let cursor = Geo2DCursor::new(candidates, &geo.field, lon, lat, Some(matcher));
                if representative_plan.is_none() {
                    representative_plan = Some(QueryPlan::table_scan(true, false));
                }
                clause_cursors.push(Box::new(cursor));
                continue;
            }

            let plan_set = planner::generate(
                index_manager,
                clause,
                &sort_pairs,
                query.hint.as_deref(),
                query.snapshot,
                query.allow_out_of_order,
            )?;

            if representative_plan.is_none() {
                representative_plan = plan_set.plans.first().cloned();
            }

            let matcher = Matcher::new(clause.clone());
            let mut built: Vec<Box<dyn Cursor>> = Vec::with_capacity(plan_set.plans.len());
            for plan in &plan_set.plans {
                built.push(Self::build_cursor(normal, index_manager, plan, matcher.clone()));
            }

            let clause_cursor: Box<dyn Cursor> = if built.len() == 1 {
                built.into_iter().next().unwrap()
            } else {
                let in_order: Vec<bool> = plan_set.plans.iter().map(|p| p.in_order).collect();

                // The cached-plan fast path: race only the remembered
                // winner, holding the rest in reserve for `RacerCursor` to
                // pull in if it under-performs or loses its plan to a
                // deletion mid-iteration.
                let cached_pos = match &cached_plan {
                    Some(CachedPlan::Index(name)) => plan_set.plans.iter().position(|p| p.index_name() == Some(name.as_str())),
                    Some(CachedPlan::TableScan) => plan_set.plans.iter().position(|p| p.is_table_scan()),
                    None => None,
                };

                match cached_pos {
                    Some(pos) => {
                        let cached_cursor = built.remove(pos);
                        let cached_in_order = in_order[pos];
                        let others: Vec<(Box<dyn Cursor>, bool)> = built
                            .into_iter()
                            .enumerate()
                            .map(|(i, c)| (c, in_order[if i < pos { i } else { i + 1 }]))
                            .collect();
                        Box::new(RacerCursor::new_with_cached_plan(cached_cursor, cached_in_order, others, Rc::clone(&dupset), self.config))
                    }
                    None => Box::new(RacerCursor::new(built, in_order, Rc::clone(&dupset), self.config)),
                }
            };
            clause_cursors.push(clause_cursor);
        }

        let mut top: Box<dyn Cursor> = if clause_cursors.len() == 1 {
            clause_cursors.into_iter().next().unwrap()
        } else {
            Box::new(OrDriverCursor::new(clause_cursors, Rc::clone(&dupset)))
        };

        let mut results = Vec::new();
        let mut last_winner: Option<Option<String>> = None;
        while top.advance()? {
            let Some(doc) = top.current_document() else { continue };
            if top.matcher().map(|m| m.matches(doc)).unwrap_or(true) {
                last_winner = Some(top.index_key_pattern().map(|s| s.name.clone()));
                results.push(doc.clone());
                if let Some(limit) = query.limit {
                    if results.len() as u64 >= limit {
                        break;
                    }
                }
            }
        }

        if let Some(pattern) = cacheable_pattern {
            let winner = match last_winner {
                Some(Some(name)) => Some(CachedPlan::Index(name)),
                Some(None) => Some(CachedPlan::TableScan),
                None => None,
            };
            if let (Some(winner), Some(cache)) = (winner, self.plan_caches.get_mut(&query.namespace)) {
                cache.record_winner(pattern, winner);
            }
        }

        let plan = representative_plan.unwrap_or_else(|| QueryPlan::table_scan(true, true));
        let explain = ExplainReport::from_plan_and_cursor(&plan, top.as_ref(), results.len() as u64, 0, 0);
        Ok((results, explain))
    }

    fn build_cursor(
        normal: &MemoryRecordFileManager,
        index_manager: &IndexManager,
        plan: &QueryPlan,
        matcher: Matcher,
    ) -> Box<dyn Cursor> {
        match &plan.kind {
            PlanKind::TableScan { forward } => {
                let locations: Vec<RecordLocation> = normal.live_locations().copied().collect();
                Box::new(TableScanCursor::new(normal.clone(), locations, *forward, Some(matcher)))
            }
            PlanKind::IndexScan { spec, bounds, forward } => {
                let entries = Self::entries_for_index_scan(normal, index_manager, spec, bounds);
                let multi_key = index_manager.is_multi_key(&spec.name);
                Box::new(IndexScanCursor::new(normal.clone(), spec.clone(), entries, *forward, multi_key, false, Some(matcher)))
            }
        }
    }

    /// Resolves a plan's per-field bounds to index entries. A pk-named
    /// spec (the `$snapshot` path's ad hoc `_id` index) has no registered
    /// `IndexTree`, so it falls back to every pk location; the final
    /// matcher pass still enforces the exact predicate either way. Every
    /// other field's exclusive/inclusive distinction collapses to an
    /// inclusive prefix lookup for the same reason: the lookup only needs
    /// to be a superset of the true match set.
    fn entries_for_index_scan(
        normal: &MemoryRecordFileManager,
        index_manager: &IndexManager,
        spec: &IndexSpec,
        bounds: &HashMap<String, IntervalSet>,
    ) -> Vec<(Vec<IndexKey>, RecordLocation)> {
        let locations = if spec.name == "_id" {
            index_manager.all_pk_locations()
        } else {
            let (min, max) = Self::range_bounds(spec, bounds);
            index_manager.lookup_range(&spec.name, min.as_deref(), max.as_deref())
        };

        locations
            .into_iter()
            .filter_map(|loc| {
                let doc = RecordFileManager::get(normal, loc)?;
                let keys: Vec<IndexKey> = spec
                    .fields
                    .iter()
                    .filter_map(|(field, _)| get_field(doc, field).and_then(IndexKey::from_json))
                    .collect();
                if keys.len() == spec.fields.len() {
                    Some((keys, loc))
                } else {
                    None
                }
            })
            .collect()
    }

    fn range_bounds(spec: &IndexSpec, bounds: &HashMap<String, IntervalSet>) -> (Option<Vec<IndexKey>>, Option<Vec<IndexKey>>) {
        let mut min_keys = Vec::new();
        for (field, _) in &spec.fields {
            let set = bounds.get(field).cloned().unwrap_or_else(IntervalSet::full);
            let Some(iv) = set.intervals().first() else { break };
            match Self::endpoint_key(&iv.low) {
                Some(k) => min_keys.push(k),
                None => break,
            }
        }
        let mut max_keys = Vec::new();
        for (field, _) in &spec.fields {
            let set = bounds.get(field).cloned().unwrap_or_else(IntervalSet::full);
            let Some(iv) = set.intervals().first() else { break };
            match Self::endpoint_key(&iv.high) {
                Some(k) => max_keys.push(k),
                None => break,
            }
        }
        (
            if min_keys.is_empty() { None } else { Some(min_keys) },
            if max_keys.is_empty() { None } else { Some(max_keys) },
        )
    }

    fn near_predicate(clause: &[Predicate]) -> Option<&Predicate> {
        clause.iter().find(|p| matches!(p.op, FilterOp::Near { .. }))
    }

    fn endpoint_key(endpoint: &EndPoint) -> Option<IndexKey> {
        match endpoint {
            EndPoint::Unbounded => None,
            EndPoint::Inclusive(k) | EndPoint::Exclusive(k) => Some(k.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexDirection;
    use crate::planner::Predicate;
    use serde_json::json;

    #[test]
    fn test_insert_then_table_scan_query() {
        let mut engine = Engine::default();
        engine.create_namespace("users", NamespaceKind::Normal, None).unwrap();
        engine.insert("users", json!({"_id": "a", "age": 30})).unwrap();
        engine.insert("users", json!({"_id": "b", "age": 12})).unwrap();

        let query = Query::new("users").filter_eq("_id", json!("a"));
        let (results, explain) = engine.query(&query).unwrap();
        assert_eq!(results, vec![json!({"_id": "a", "age": 30})]);
        assert_eq!(explain.n, 1);
    }

    #[test]
    fn test_indexed_range_query_uses_index_scan() {
        let mut engine = Engine::default();
        engine.create_namespace("people", NamespaceKind::Normal, None).unwrap();
        engine.create_index("people", IndexSpec::single("by_age", "age", IndexDirection::Asc)).unwrap();
        for age in [10, 20, 30, 40] {
            engine.insert("people", json!({"_id": age, "age": age})).unwrap();
        }

        let query = Query::new("people").with_predicate(Predicate::gte("age", json!(20)));
        let (results, explain) = engine.query(&query).unwrap();
        assert_eq!(results.len(), 2);
        assert!(explain.index_bounds.is_some());
    }

    #[test]
    fn test_or_query_dedups_overlapping_clauses() {
        let mut engine = Engine::default();
        engine.create_namespace("people", NamespaceKind::Normal, None).unwrap();
        engine.insert("people", json!({"_id": 1, "age": 25, "vip": true})).unwrap();
        engine.insert("people", json!({"_id": 2, "age": 40, "vip": false})).unwrap();

        let query = Query::new("people")
            .with_clause(vec![Predicate::gte("age", json!(0))])
            .with_clause(vec![Predicate::eq("vip", json!(true))]);
        let (results, _) = engine.query(&query).unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_capped_namespace_query_filters_by_matcher() {
        let mut engine = Engine::default();
        engine.create_namespace("events", NamespaceKind::Capped, Some(&[4096])).unwrap();
        engine.insert("events", json!({"kind": "login"})).unwrap();
        engine.insert("events", json!({"kind": "logout"})).unwrap();

        let query = Query::new("events").filter_eq("kind", json!("logout"));
        let (results, _) = engine.query(&query).unwrap();
        assert_eq!(results, vec![json!({"kind": "logout"})]);
    }

    #[test]
    fn test_near_query_orders_nearest_first() {
        let mut engine = Engine::default();
        engine.create_namespace("places", NamespaceKind::Normal, None).unwrap();
        engine.insert("places", json!({"_id": 1, "loc": [10.0, 10.0]})).unwrap();
        engine.insert("places", json!({"_id": 2, "loc": [0.001, 0.0]})).unwrap();
        engine.insert("places", json!({"_id": 3, "loc": [1.0, 1.0]})).unwrap();

        let query = Query::new("places").with_predicate(Predicate::near("loc", 0.0, 0.0, None));
        let (results, _) = engine.query(&query).unwrap();
        let ids: Vec<i64> = results.iter().map(|d| d["_id"].as_i64().unwrap()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_plan_cache_records_winner_for_repeated_pattern() {
        let mut engine = Engine::default();
        engine.create_namespace("widgets", NamespaceKind::Normal, None).unwrap();
        engine
            .create_index(
                "widgets",
                IndexSpec::new("by_a_extra", vec![("a".to_string(), IndexDirection::Asc), ("extra".to_string(), IndexDirection::Asc)]),
            )
            .unwrap();
        for i in 0..10 {
            engine.insert("widgets", json!({"_id": i, "a": i % 2, "extra": i})).unwrap();
        }

        let query = Query::new("widgets").with_predicate(Predicate::eq("a", json!(0)));
        let (results, _) = engine.query(&query).unwrap();
        assert_eq!(results.len(), 5);

        let pattern = QueryPattern::from_query(&Query::new("widgets").with_predicate(Predicate::eq("a", json!(1))));
        assert!(engine.plan_caches.get("widgets").unwrap().get(&pattern).is_some());
    }

    #[test]
    fn test_create_index_clears_plan_cache() {
        let mut engine = Engine::default();
        engine.create_namespace("widgets", NamespaceKind::Normal, None).unwrap();
        engine
            .create_index(
                "widgets",
                IndexSpec::new("by_a_extra", vec![("a".to_string(), IndexDirection::Asc), ("extra".to_string(), IndexDirection::Asc)]),
            )
            .unwrap();
        engine.insert("widgets", json!({"_id": 1, "a": 0, "extra": 1})).unwrap();

        let query = Query::new("widgets").with_predicate(Predicate::eq("a", json!(0)));
        engine.query(&query).unwrap();
        assert!(!engine.plan_caches.get("widgets").unwrap().is_empty());

        engine.create_index("widgets", IndexSpec::single("by_extra", "extra", IndexDirection::Asc)).unwrap();
        assert!(engine.plan_caches.get("widgets").unwrap().is_empty());
    }

    #[test]
    fn test_unknown_namespace_errors() {
        let mut engine = Engine::default();
        let query = Query::new("missing");
        assert!(engine.query(&query).is_err());
    }
}
