//! Forward cursor over a capped namespace's live chain. Walks oldest to
//! newest via `oldest_live`/`next_live`; a yield recovery whose saved
//! location no longer resolves live means the record was overwritten by
//! the cyclic allocator while we were away, which is a hard recovery
//! failure rather than a silent skip-ahead.

use serde_json::Value;

use super::{Cursor, TouchState, YieldState};
use crate::dupset::DupSet;
use crate::errors::{CoreError, CoreResult};
use crate::index::{IndexKey, IndexSpec};
use crate::matcher::Matcher;
use crate::storage::capped::CappedNamespace;
use crate::storage::RecordLocation;

pub struct CappedForwardCursor<'a> {
    namespace: &'a CappedNamespace,
    next: Option<RecordLocation>,
    current: Option<RecordLocation>,
    matcher: Option<Matcher>,
    dupset: DupSet,
    n_scanned: u64,
    noted: Option<RecordLocation>,
}

impl<'a> CappedForwardCursor<'a> {
    pub fn new(namespace: &'a CappedNamespace, matcher: Option<Matcher>) -> Self {
        let next = namespace.oldest_live();
        Self { namespace, next, current: None, matcher, dupset: DupSet::new(540), n_scanned: 0, noted: None }
    }
}

impl<'a> Cursor for CappedForwardCursor<'a> {
    fn ok(&self) -> bool {
        self.current.is_some()
    }

    fn advance(&mut self) -> CoreResult<bool> {
        match self.next.take() {
            Some(loc) => {
                self.n_scanned += 1;
                self.next = self.namespace.next_live(loc);
                self.current = Some(loc);
                Ok(true)
            }
            None => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn current_location(&self) -> Option<RecordLocation> {
        self.current
    }

    fn current_document(&self) -> Option<&Value> {
        self.current.and_then(|loc| self.namespace.get(loc))
    }

    fn current_key(&self) -> Option<&[IndexKey]> {
        None
    }

    fn index_key_pattern(&self) -> Option<&IndexSpec> {
        None
    }

    fn is_multi_key(&self) -> bool {
        false
    }

    fn matcher(&self) -> Option<&Matcher> {
        self.matcher.as_ref()
    }

    fn key_fields_only(&self) -> bool {
        false
    }

    fn get_set_dup(&mut self, location: RecordLocation) -> bool {
        self.dupset.get_set_dup(location)
    }

    fn prepare_to_yield(&mut self) -> YieldState {
        YieldState { last_key: None, last_location: self.current_location() }
    }

    fn recover_from_yield(&mut self, state: YieldState) -> CoreResult<()> {
        let Some(last) = state.last_location else { return Ok(()) };
        if self.namespace.get(last).is_none() {
            return Err(CoreError::recovery_failed(format!(
                "capped record at {:?} was overwritten while the cursor yielded",
                last
            )));
        }
        self.next = self.namespace.next_live(last);
        Ok(())
    }

    fn prepare_to_touch_earlier_iterate(&mut self) -> TouchState {
        TouchState { last_location: self.current_location() }
    }

    fn recover_from_touching_earlier_iterate(&mut self, _state: TouchState) -> CoreResult<()> {
        Ok(())
    }

    fn n_scanned(&self) -> u64 {
        self.n_scanned
    }

    fn note_location(&mut self, location: RecordLocation) {
        self.noted = Some(location);
    }

    fn check_location(&self, location: RecordLocation) -> bool {
        self.noted == Some(location)
    }
}
