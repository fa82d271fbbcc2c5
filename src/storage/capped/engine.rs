//! The capped (fixed-capacity, cyclic FIFO) collection storage engine.
//!
//! Transcribed from `NamespaceDetails::compact`, `cappedFirstDeletedInCurExtent`,
//! `advanceCapExtent`, `__capAlloc`, `cappedAlloc`, `cappedTruncateAfter`,
//! `emptyCappedCollection`, and `cappedCheckMigrate`, into the arena model:
//! extents and records live in `Vec`/`HashMap` arenas keyed by opaque ids
//! (`ExtentId`, `RecordLocation`) rather than raw pointers, so there is no
//! cyclic ownership to reason about.

use std::collections::HashMap;

use serde_json::Value;

use crate::errors::{CoreError, CoreResult};
use crate::storage::durable::DurableWriter;
use crate::storage::record::RecordLocation;

use super::layout;

pub type ExtentId = u32;

/// 24 bytes reserve so a split always leaves at least one `DeletedRecord`
/// behind in the donor extent.
const ALLOC_RESERVE: u64 = 24;
/// Below this, granting the whole free region is cheaper than splitting a
/// sliver nobody can allocate into later.
const MIN_SPLIT_REMAINDER: u64 = 32;
const RECORD_HEADER_OVERHEAD: u64 = 16;

/// The tri-state the original threads through as "invalid null" vs. "valid
/// null" vs. a real location. Collapsing this to `Option<RecordLocation>`
/// would lose the distinction between "never wrapped" and "wrapped, but
/// nothing allocated on this pass yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapFirstNewRecord {
    NeverLooped,
    JustWrapped,
    Valid(RecordLocation),
}

#[derive(Debug, Clone)]
pub struct Extent {
    pub prev: Option<ExtentId>,
    pub next: Option<ExtentId>,
    pub first_record: Option<RecordLocation>,
    pub last_record: Option<RecordLocation>,
    pub capacity: u64,
    base_offset: u64,
}

#[derive(Debug, Clone)]
enum SlotKind {
    Live(Value),
    Deleted { next_deleted: Option<RecordLocation> },
}

#[derive(Debug, Clone)]
struct RecordSlot {
    extent: ExtentId,
    length_with_headers: u64,
    prev_in_extent: Option<RecordLocation>,
    next_in_extent: Option<RecordLocation>,
    kind: SlotKind,
}

/// A capped namespace: the extent ring, the free-list head, and the
/// wrap-cursor bookkeeping from the persisted-state design.
#[derive(Clone)]
pub struct CappedNamespace {
    pub name: String,
    file_id: u32,
    extents: Vec<Extent>,
    pub first_extent: ExtentId,
    pub last_extent: ExtentId,
    pub cap_extent: ExtentId,
    pub cap_first_new_record: CapFirstNewRecord,
    pub cap_last_del_rec_last_extent: Option<RecordLocation>,
    list_of_all_deleted: Option<RecordLocation>,
    records: HashMap<RecordLocation, RecordSlot>,
    has_indexes: bool,
    background_build_in_progress: bool,
}

impl CappedNamespace {
    /// Builds a namespace with `extent_capacities.len()` extents, each a
    /// single free record spanning its capacity, linked into a ring.
    pub fn new(name: impl Into<String>, file_id: u32, extent_capacities: &[u64]) -> Self {
        assert!(!extent_capacities.is_empty(), "a capped namespace needs at least one extent");

        let mut extents = Vec::with_capacity(extent_capacities.len());
        let mut base_offset = 0u64;
        for &capacity in extent_capacities {
            extents.push(Extent {
                prev: None,
                next: None,
                first_record: None,
                last_record: None,
                capacity,
                base_offset,
            });
            base_offset += capacity;
        }
        let last = (extents.len() - 1) as ExtentId;
        for i in 0..extents.len() {
            extents[i].prev = if i == 0 { None } else { Some((i - 1) as ExtentId) };
            extents[i].next = if i == last as usize { None } else { Some((i + 1) as ExtentId) };
        }

        let mut records = HashMap::new();
        let mut list_of_all_deleted = None;
        for (idx, extent) in extents.iter_mut().enumerate() {
            let loc = RecordLocation::new(file_id, extent.base_offset);
            records.insert(
                loc,
                RecordSlot {
                    extent: idx as ExtentId,
                    length_with_headers: extent.capacity,
                    prev_in_extent: None,
                    next_in_extent: None,
                    kind: SlotKind::Deleted { next_deleted: None },
                },
            );
            extent.first_record = Some(loc);
            extent.last_record = Some(loc);
        }
        // Thread every extent's lone free record onto the global chain,
        // first extent's entry at the head.
        for idx in (0..extents.len()).rev() {
            let loc = extents[idx].first_record.unwrap();
            if let Some(SlotKind::Deleted { next_deleted }) = records.get_mut(&loc).map(|s| &mut s.kind) {
                *next_deleted = list_of_all_deleted;
            }
            list_of_all_deleted = Some(loc);
        }

        Self {
            name: name.into(),
            file_id,
            extents,
            first_extent: 0,
            last_extent: last,
            cap_extent: 0,
            cap_first_new_record: CapFirstNewRecord::NeverLooped,
            cap_last_del_rec_last_extent: None,
            list_of_all_deleted,
            records,
            has_indexes: false,
            background_build_in_progress: false,
        }
    }

    pub fn set_has_indexes(&mut self, has_indexes: bool) {
        self.has_indexes = has_indexes;
    }

    pub fn set_background_build_in_progress(&mut self, in_progress: bool) {
        self.background_build_in_progress = in_progress;
    }

    pub fn extent(&self, id: ExtentId) -> &Extent {
        &self.extents[id as usize]
    }

    pub fn total_capacity(&self) -> u64 {
        self.extents.iter().map(|e| e.capacity).sum()
    }

    /// Total bytes occupied by live documents, for the capacity invariant.
    pub fn live_bytes(&self) -> u64 {
        self.records
            .values()
            .filter(|s| matches!(s.kind, SlotKind::Live(_)))
            .map(|s| s.length_with_headers)
            .sum()
    }

    pub fn live_count(&self) -> usize {
        self.records.values().filter(|s| matches!(s.kind, SlotKind::Live(_))).count()
    }

    pub fn get(&self, loc: RecordLocation) -> Option<&Value> {
        match &self.records.get(&loc)?.kind {
            SlotKind::Live(doc) => Some(doc),
            SlotKind::Deleted { .. } => None,
        }
    }

    /// Returns the oldest live record location across the whole namespace,
    /// i.e. FIFO order's current head, for forward cursor seeding.
    pub fn oldest_live(&self) -> Option<RecordLocation> {
        let mut extent = self.first_extent;
        loop {
            if let Some(loc) = self.first_live_in_extent(extent) {
                return Some(loc);
            }
            match self.extents[extent as usize].next {
                Some(next) if next != self.first_extent => extent = next,
                _ => return None,
            }
        }
    }

    fn first_live_in_extent(&self, extent: ExtentId) -> Option<RecordLocation> {
        let mut cursor = self.extents[extent as usize].first_record;
        while let Some(loc) = cursor {
            let slot = self.records.get(&loc)?;
            if matches!(slot.kind, SlotKind::Live(_)) {
                return Some(loc);
            }
            cursor = slot.next_in_extent;
        }
        None
    }

    /// Returns the live record immediately after `loc` in FIFO order,
    /// crossing extent boundaries, for forward cursor iteration.
    pub fn next_live(&self, loc: RecordLocation) -> Option<RecordLocation> {
        let slot = self.records.get(&loc)?;
        let mut cursor = slot.next_in_extent;
        let mut extent = slot.extent;
        loop {
            while let Some(candidate) = cursor {
                let candidate_slot = self.records.get(&candidate)?;
                if matches!(candidate_slot.kind, SlotKind::Live(_)) {
                    return Some(candidate);
                }
                cursor = candidate_slot.next_in_extent;
            }
            let next_extent = self.extents[extent as usize].next?;
            if next_extent == self.first_extent && extent == self.last_extent {
                // allow wrap exactly once conceptually; callers compare
                // against their own start point to stop
            }
            extent = next_extent;
            cursor = self.extents[extent as usize].first_record;
            if extent == slot.extent {
                return None;
            }
        }
    }

    // ---- free-list management -------------------------------------------------

    fn push_deleted(&mut self, loc: RecordLocation) {
        let head = self.list_of_all_deleted;
        if let Some(slot) = self.records.get_mut(&loc) {
            slot.kind = SlotKind::Deleted { next_deleted: head };
        }
        self.list_of_all_deleted = Some(loc);
    }

    fn remove_deleted(&mut self, loc: RecordLocation) {
        let next_of_removed = match self.records.get(&loc).map(|s| &s.kind) {
            Some(SlotKind::Deleted { next_deleted }) => *next_deleted,
            _ => return,
        };
        if self.list_of_all_deleted == Some(loc) {
            self.list_of_all_deleted = next_of_removed;
            return;
        }
        let mut cursor = self.list_of_all_deleted;
        while let Some(current) = cursor {
            let current_next = match self.records.get(&current).map(|s| &s.kind) {
                Some(SlotKind::Deleted { next_deleted }) => *next_deleted,
                _ => None,
            };
            if current_next == Some(loc) {
                if let Some(SlotKind::Deleted { next_deleted }) =
                    self.records.get_mut(&current).map(|s| &mut s.kind)
                {
                    *next_deleted = next_of_removed;
                }
                return;
            }
            cursor = current_next;
        }
    }

    /// First free record belonging to `extent` with room for `required`
    /// bytes, walking the global chain (current-extent entries cluster at
    /// the front since we only ever free records in `cap_extent`).
    fn find_fit(&self, extent: ExtentId, required: u64) -> Option<RecordLocation> {
        let mut cursor = self.list_of_all_deleted;
        while let Some(loc) = cursor {
            let slot = self.records.get(&loc)?;
            match &slot.kind {
                SlotKind::Deleted { next_deleted } => {
                    if slot.extent == extent && slot.length_with_headers >= required {
                        return Some(loc);
                    }
                    cursor = *next_deleted;
                }
                SlotKind::Live(_) => return None,
            }
        }
        None
    }

    fn extent_is_empty(&self, extent: ExtentId) -> bool {
        let e = &self.extents[extent as usize];
        e.first_record == e.last_record
            && e.first_record
                .and_then(|loc| self.records.get(&loc))
                .map(|s| matches!(s.kind, SlotKind::Deleted { .. }))
                .unwrap_or(true)
    }

    // ---- compact ---------------------------------------------------------

    /// Merges byte-contiguous free records within `extent`. `n` is 1-3 in
    /// steady state so the O(n^2) scan is fine.
    pub fn compact(&mut self, extent: ExtentId) {
        loop {
            let mut deleted_in_extent: Vec<RecordLocation> = self
                .records
                .iter()
                .filter(|(_, s)| s.extent == extent && matches!(s.kind, SlotKind::Deleted { .. }))
                .map(|(loc, _)| *loc)
                .collect();
            deleted_in_extent.sort_by_key(|loc| loc.offset);

            let mut merged_any = false;
            for pair in deleted_in_extent.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                let a_len = self.records[&a].length_with_headers;
                if a.offset + a_len == b.offset {
                    self.merge_adjacent(a, b);
                    merged_any = true;
                    break;
                }
            }
            if !merged_any {
                break;
            }
        }
    }

    fn merge_adjacent(&mut self, a: RecordLocation, b: RecordLocation) {
        let b_slot = self.records.remove(&b).expect("b exists");
        self.remove_deleted(a);
        self.remove_deleted(b);

        let a_slot = self.records.get_mut(&a).expect("a exists");
        a_slot.length_with_headers += b_slot.length_with_headers;
        a_slot.next_in_extent = b_slot.next_in_extent;

        if let Some(after_b) = b_slot.next_in_extent {
            if let Some(after_slot) = self.records.get_mut(&after_b) {
                after_slot.prev_in_extent = Some(a);
            }
        }

        let extent = a_slot.extent;
        if self.extents[extent as usize].last_record == Some(b) {
            self.extents[extent as usize].last_record = Some(a);
        }

        self.push_deleted(a);
    }

    // ---- advance_cap_extent ------------------------------------------------

    /// Transcribed from `advanceCapExtent`: always lands the namespace in
    /// the "just wrapped" state, regardless of which extent it moves to.
    pub fn advance_cap_extent(&mut self) {
        let next = self.extents[self.cap_extent as usize].next.unwrap_or(self.first_extent);
        self.cap_last_del_rec_last_extent =
            if next == self.first_extent { None } else { self.last_deleted_in_extent(self.cap_extent) };
        self.cap_extent = next;
        self.cap_first_new_record = CapFirstNewRecord::JustWrapped;
    }

    /// The first-pass variant used by `cap_alloc` step 3: advancing while
    /// still filling fresh extents does not count as a wrap unless it
    /// lands back on `first_extent`.
    fn advance_cap_extent_first_pass(&mut self) {
        let next = self.extents[self.cap_extent as usize].next.unwrap_or(self.first_extent);
        self.cap_extent = next;
        self.cap_first_new_record = if next == self.first_extent {
            CapFirstNewRecord::JustWrapped
        } else {
            CapFirstNewRecord::NeverLooped
        };
    }

    fn last_deleted_in_extent(&self, extent: ExtentId) -> Option<RecordLocation> {
        let mut cursor = self.list_of_all_deleted;
        let mut found = None;
        while let Some(loc) = cursor {
            let slot = self.records.get(&loc)?;
            if slot.extent == extent {
                found = Some(loc);
            }
            cursor = match &slot.kind {
                SlotKind::Deleted { next_deleted } => *next_deleted,
                SlotKind::Live(_) => None,
            };
        }
        found
    }

    // ---- cap_alloc ---------------------------------------------------------

    /// Finds or makes room for a `required` byte record in the current
    /// wrap cycle, returning its location. Does not write the document;
    /// callers do that via `insert`.
    fn cap_alloc(&mut self, required: u64) -> CoreResult<RecordLocation> {
        let bound = std::cmp::max(5000, required / 30 + 2);
        let mut first_empty_extent: Option<ExtentId> = None;

        for _ in 0..bound {
            if let Some(loc) = self.find_fit(self.cap_extent, required + ALLOC_RESERVE) {
                return Ok(self.grant(loc, required));
            }

            match self.cap_first_new_record {
                CapFirstNewRecord::NeverLooped => {
                    self.advance_cap_extent_first_pass();
                    continue;
                }
                _ => {
                    let already_consumed = matches!(
                        self.cap_first_new_record,
                        CapFirstNewRecord::Valid(loc)
                            if self.extents[self.cap_extent as usize].first_record == Some(loc)
                    );
                    if already_consumed {
                        self.advance_cap_extent();
                        if self.extent_is_empty(self.cap_extent) {
                            match first_empty_extent {
                                Some(tracked) if tracked == self.cap_extent => {
                                    return Err(CoreError::document_too_large(required as usize));
                                }
                                None => first_empty_extent = Some(self.cap_extent),
                                _ => {}
                            }
                        }
                        continue;
                    }

                    // An extent with nothing to evict (empty from the start, or
                    // emptied earlier this wrap) never reaches `already_consumed`.
                    // Track and detect the cycle here too, the same as above,
                    // otherwise a document too large for any extent spins until
                    // the bound trips an `integrity_error` instead of reporting
                    // `DocumentTooLarge`.
                    if self.extent_is_empty(self.cap_extent) {
                        match first_empty_extent {
                            Some(tracked) if tracked == self.cap_extent => {
                                return Err(CoreError::document_too_large(required as usize));
                            }
                            None => first_empty_extent = Some(self.cap_extent),
                            _ => {}
                        }
                        self.advance_cap_extent();
                        continue;
                    }

                    let oldest = self.extents[self.cap_extent as usize]
                        .first_record
                        .ok_or_else(|| CoreError::integrity_error("extent has no first record"))?;
                    self.evict(oldest);
                    self.compact(self.cap_extent);
                }
            }
        }

        Err(CoreError::integrity_error("cap_alloc exceeded its bounded iteration count"))
    }

    /// Splits `loc` if the remainder is worth keeping as a free record,
    /// otherwise grants the whole region. Returns the (now-reserved)
    /// location for the caller to write the document into.
    fn grant(&mut self, loc: RecordLocation, required: u64) -> RecordLocation {
        self.remove_deleted(loc);
        let slot = self.records.get_mut(&loc).expect("fit location exists");
        let available = slot.length_with_headers;
        let remainder = available - required;

        if remainder >= MIN_SPLIT_REMAINDER {
            slot.length_with_headers = required;
            let extent = slot.extent;
            let old_next = slot.next_in_extent;
            slot.next_in_extent = Some(RecordLocation::new(loc.file_id, loc.offset + required));

            let remainder_loc = RecordLocation::new(loc.file_id, loc.offset + required);
            self.records.insert(
                remainder_loc,
                RecordSlot {
                    extent,
                    length_with_headers: remainder,
                    prev_in_extent: Some(loc),
                    next_in_extent: old_next,
                    kind: SlotKind::Deleted { next_deleted: None },
                },
            );
            if let Some(after) = old_next {
                if let Some(after_slot) = self.records.get_mut(&after) {
                    after_slot.prev_in_extent = Some(remainder_loc);
                }
            }
            if self.extents[extent as usize].last_record == Some(loc) {
                self.extents[extent as usize].last_record = Some(remainder_loc);
            }
            self.push_deleted(remainder_loc);
        }

        loc
    }

    /// Deletes the oldest (physically first) record of `cap_extent`,
    /// freeing it onto the global chain so `compact` can reclaim it.
    fn evict(&mut self, loc: RecordLocation) {
        if let Some(slot) = self.records.get_mut(&loc) {
            slot.kind = SlotKind::Deleted { next_deleted: None };
        }
        self.push_deleted(loc);
    }

    /// Reserves space for `document` and writes it through `writer`,
    /// returning its stable location.
    pub fn insert(&mut self, writer: &mut dyn DurableWriter, document: Value) -> CoreResult<RecordLocation> {
        let body = serde_json::to_vec(&document).unwrap_or_default();
        let required = body.len() as u64 + RECORD_HEADER_OVERHEAD;

        let loc = self.cap_alloc(required)?;
        let granted_len = self.records[&loc].length_with_headers;

        if let CapFirstNewRecord::JustWrapped = self.cap_first_new_record {
            self.cap_first_new_record = CapFirstNewRecord::Valid(loc);
        }

        let header = layout::record_header_bytes(granted_len, loc.offset - self.extents[self.cap_extent as usize].base_offset);
        let region = writer.writing(self.file_id, loc.offset, header.len() + body.len());
        region[..header.len()].copy_from_slice(&header);
        region[header.len()..].copy_from_slice(&body);

        self.records.get_mut(&loc).expect("reserved location exists").kind = SlotKind::Live(document);
        Ok(loc)
    }

    // ---- truncate_after -----------------------------------------------------

    /// Repeatedly deletes the newest record until the newest equals `end`,
    /// then removes `end` too if `inclusive`. Refuses to empty the
    /// namespace entirely rather than silently truncating the last
    /// document, matching the original's assertion.
    pub fn truncate_after(&mut self, end: RecordLocation, inclusive: bool) -> CoreResult<()> {
        if self.live_count() <= 1 && (inclusive || self.newest_live() != Some(end)) {
            return Err(CoreError::refuse_empty(self.name.clone()));
        }

        loop {
            let newest = match self.newest_live() {
                Some(loc) => loc,
                None => break,
            };
            if newest == end {
                break;
            }
            self.delete_newest(newest)?;
        }

        if inclusive {
            if let Some(loc) = self.newest_live() {
                if loc == end {
                    if self.live_count() <= 1 {
                        return Err(CoreError::refuse_empty(self.name.clone()));
                    }
                    self.delete_newest(loc)?;
                }
            }
        }

        Ok(())
    }

    fn newest_live(&self) -> Option<RecordLocation> {
        let mut extent = self.cap_extent;
        loop {
            if let Some(loc) = self.last_live_in_extent(extent) {
                return Some(loc);
            }
            let prev = self.extents[extent as usize].prev.unwrap_or(self.last_extent);
            if prev == self.cap_extent {
                return None;
            }
            extent = prev;
        }
    }

    fn last_live_in_extent(&self, extent: ExtentId) -> Option<RecordLocation> {
        let mut cursor = self.extents[extent as usize].last_record;
        while let Some(loc) = cursor {
            let slot = self.records.get(&loc)?;
            if matches!(slot.kind, SlotKind::Live(_)) {
                return Some(loc);
            }
            cursor = slot.prev_in_extent;
        }
        None
    }

    fn delete_newest(&mut self, loc: RecordLocation) -> CoreResult<()> {
        let extent = self.records.get(&loc).map(|s| s.extent).ok_or_else(|| {
            CoreError::integrity_error("truncate target has no backing record slot")
        })?;

        let was_last_of_cap_extent = self.extents[self.cap_extent as usize].last_record == Some(loc)
            && extent == self.cap_extent
            && !matches!(self.cap_first_new_record, CapFirstNewRecord::NeverLooped);

        self.evict(loc);
        self.compact(extent);

        if was_last_of_cap_extent {
            // Deleted the last record of cap_extent before a wrap: back up
            // and rescan the global chain to reestablish the predecessor
            // extent's last deleted record.
            let prev = self.extents[self.cap_extent as usize].prev.unwrap_or(self.last_extent);
            self.cap_extent = prev;
            self.cap_last_del_rec_last_extent = self.last_deleted_in_extent(prev);
        }

        Ok(())
    }

    // ---- empty_capped -------------------------------------------------------

    /// Requires no indexes and no in-progress background build; rebuilds
    /// every extent as a single free record while preserving the ring.
    pub fn empty_capped(&mut self) -> CoreResult<()> {
        if self.has_indexes {
            return Err(CoreError::integrity_error("emptying a capped namespace with live indexes is unsupported"));
        }
        if self.background_build_in_progress {
            return Err(CoreError::integrity_error("a background index build is in progress"));
        }

        self.records.clear();
        self.list_of_all_deleted = None;

        for idx in (0..self.extents.len()).rev() {
            let extent = &self.extents[idx];
            let loc = RecordLocation::new(self.file_id, extent.base_offset);
            self.records.insert(
                loc,
                RecordSlot {
                    extent: idx as ExtentId,
                    length_with_headers: extent.capacity,
                    prev_in_extent: None,
                    next_in_extent: None,
                    kind: SlotKind::Deleted { next_deleted: self.list_of_all_deleted },
                },
            );
            self.list_of_all_deleted = Some(loc);
        }
        for extent in self.extents.iter_mut() {
            let loc = RecordLocation::new(self.file_id, extent.base_offset);
            extent.first_record = Some(loc);
            extent.last_record = Some(loc);
        }

        self.cap_extent = self.first_extent;
        self.cap_first_new_record = CapFirstNewRecord::NeverLooped;
        self.cap_last_del_rec_last_extent = None;
        Ok(())
    }

    // ---- migrate_legacy -----------------------------------------------------

    /// Pulls every nonempty bucket of a legacy normal-namespace deleted
    /// list into the capped global chain and anchors `cap_extent` at
    /// `first_extent`. Idempotent: a namespace already on the capped path
    /// (any non-empty `list_of_all_deleted` reachable from `cap_extent`)
    /// is left untouched.
    pub fn migrate_legacy(&mut self, legacy_free_records: Vec<(RecordLocation, u64)>) {
        for (loc, length_with_headers) in legacy_free_records {
            self.records.insert(
                loc,
                RecordSlot {
                    extent: self.first_extent,
                    length_with_headers,
                    prev_in_extent: None,
                    next_in_extent: None,
                    kind: SlotKind::Deleted { next_deleted: None },
                },
            );
            self.push_deleted(loc);
        }
        self.cap_extent = self.first_extent;
    }
}
