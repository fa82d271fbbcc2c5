//! `OrDriverCursor`: executes surviving `$or` clauses in list order,
//! draining one clause's cursor fully before moving to the next, with a
//! `DupSet` shared across every clause (and any racing that clause does
//! internally) so overlapping clauses never double-report a document.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::cursor::{Cursor, TouchState, YieldState};
use crate::dupset::DupSet;
use crate::errors::{CoreError, CoreResult};
use crate::index::{IndexKey, IndexSpec};
use crate::matcher::Matcher;
use crate::storage::RecordLocation;

pub struct OrDriverCursor {
    clauses: Vec<Box<dyn Cursor>>,
    dupset: Rc<RefCell<DupSet>>,
    current_clause: usize,
    killed: bool,
    killed_raised: bool,
    n_scanned: u64,
    noted: Option<RecordLocation>,
}

impl OrDriverCursor {
    pub fn new(clauses: Vec<Box<dyn Cursor>>, dupset: Rc<RefCell<DupSet>>) -> Self {
        Self {
            clauses,
            dupset,
            current_clause: 0,
            killed: false,
            killed_raised: false,
            n_scanned: 0,
            noted: None,
        }
    }

    /// Raises the kill latch: the next `advance` reports the kill as a
    /// recoverable error, and every one after that reports `not ok` without
    /// touching any clause cursor again.
    pub fn kill(&mut self) {
        self.killed = true;
    }

    pub fn is_killed(&self) -> bool {
        self.killed
    }
}

impl Cursor for OrDriverCursor {
    fn ok(&self) -> bool {
        !self.killed && self.current_clause < self.clauses.len() && self.clauses[self.current_clause].ok()
    }

    fn advance(&mut self) -> CoreResult<bool> {
        if self.killed {
            if !self.killed_raised {
                self.killed_raised = true;
                return Err(CoreError::killed());
            }
            return Ok(false);
        }
        while self.current_clause < self.clauses.len() {
            let advanced = self.clauses[self.current_clause].advance()?;
            if !advanced {
                self.current_clause += 1;
                continue;
            }
            self.n_scanned += 1;
            let Some(location) = self.clauses[self.current_clause].current_location() else { continue };
            if self.dupset.borrow_mut().get_set_dup(location) {
                continue;
            }
            return Ok(true);
        }
        Ok(false)
    }

    fn current_location(&self) -> Option<RecordLocation> {
        self.clauses.get(self.current_clause).and_then(|c| c.current_location())
    }

    fn current_document(&self) -> Option<&Value> {
        self.clauses.get(self.current_clause).and_then(|c| c.current_document())
    }

    fn current_key(&self) -> Option<&[IndexKey]> {
        self.clauses.get(self.current_clause).and_then(|c| c.current_key())
    }

    fn index_key_pattern(&self) -> Option<&IndexSpec> {
        self.clauses.get(self.current_clause).and_then(|c| c.index_key_pattern())
    }

    fn is_multi_key(&self) -> bool {
        self.clauses.get(self.current_clause).map(|c| c.is_multi_key()).unwrap_or(false)
    }

    fn matcher(&self) -> Option<&Matcher> {
        self.clauses.get(self.current_clause).and_then(|c| c.matcher())
    }

    fn key_fields_only(&self) -> bool {
        self.clauses.get(self.current_clause).map(|c| c.key_fields_only()).unwrap_or(false)
    }

    fn get_set_dup(&mut self, location: RecordLocation) -> bool {
        self.dupset.borrow_mut().get_set_dup(location)
    }

    fn prepare_to_yield(&mut self) -> YieldState {
        for clause in &mut self.clauses {
            clause.prepare_to_yield();
        }
        YieldState { last_key: self.current_key().map(|k| k.to_vec()), last_location: self.current_location() }
    }

    fn recover_from_yield(&mut self, state: YieldState) -> CoreResult<()> {
        for clause in &mut self.clauses {
            clause.recover_from_yield(state.clone())?;
        }
        Ok(())
    }

    fn prepare_to_touch_earlier_iterate(&mut self) -> TouchState {
        for clause in &mut self.clauses {
            clause.prepare_to_touch_earlier_iterate();
        }
        TouchState { last_location: self.current_location() }
    }

    fn recover_from_touching_earlier_iterate(&mut self, state: TouchState) -> CoreResult<()> {
        for clause in &mut self.clauses {
            clause.recover_from_touching_earlier_iterate(state.clone())?;
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct VecCursor {
        docs: Vec<(RecordLocation, Value)>,
        pos: usize,
    }

    impl Cursor for VecCursor {
        fn ok(&self) -> bool {
            self.pos > 0 && self.pos <= self.docs.len()
        }
        fn advance(&mut self) -> CoreResult<bool> {
            if self.pos < self.docs.len() {
                self.pos += 1;
                Ok(true)
            } else {
                Ok(false)
            }
        }
        fn current_location(&self) -> Option<RecordLocation> {
            self.docs.get(self.pos.wrapping_sub(1)).map(|(l, _)| *l)
        }
        fn current_document(&self) -> Option<&Value> {
            self.docs.get(self.pos.wrapping_sub(1)).map(|(_, d)| d)
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
            None
        }
        fn key_fields_only(&self) -> bool {
            false
        }
        fn get_set_dup(&mut self, _location: RecordLocation) -> bool {
            false
        }
        fn prepare_to_yield(&mut self) -> YieldState {
            YieldState { last_key: None, last_location: self.current_location() }
        }
        fn recover_from_yield(&mut self, _state: YieldState) -> CoreResult<()> {
            Ok(())
        }
        fn prepare_to_touch_earlier_iterate(&mut self) -> TouchState {
            TouchState { last_location: self.current_location() }
        }
        fn recover_from_touching_earlier_iterate(&mut self, _state: TouchState) -> CoreResult<()> {
            Ok(())
        }
        fn n_scanned(&self) -> u64 {
            0
        }
        fn note_location(&mut self, _location: RecordLocation) {}
        fn check_location(&self, _location: RecordLocation) -> bool {
            false
        }
    }

    fn loc(offset: u64) -> RecordLocation {
        RecordLocation::new(0, offset)
    }

    #[test]
    fn test_drains_clauses_in_order() {
        let a = VecCursor { docs: vec![(loc(1), json!({})), (loc(2), json!({}))], pos: 0 };
        let b = VecCursor { docs: vec![(loc(3), json!({}))], pos: 0 };
        let dupset = Rc::new(RefCell::new(DupSet::new(540)));
        let mut driver = OrDriverCursor::new(vec![Box::new(a), Box::new(b)], dupset);
        let mut seen = Vec::new();
        while driver.advance().unwrap() {
            seen.push(driver.current_location().unwrap());
        }
        assert_eq!(seen, vec![loc(1), loc(2), loc(3)]);
    }

    #[test]
    fn test_shared_dupset_suppresses_overlap() {
        let a = VecCursor { docs: vec![(loc(1), json!({}))], pos: 0 };
        let b = VecCursor { docs: vec![(loc(1), json!({})), (loc(2), json!({}))], pos: 0 };
        let dupset = Rc::new(RefCell::new(DupSet::new(540)));
        let mut driver = OrDriverCursor::new(vec![Box::new(a), Box::new(b)], dupset);
        let mut seen = Vec::new();
        while driver.advance().unwrap() {
            seen.push(driver.current_location().unwrap());
        }
        assert_eq!(seen, vec![loc(1), loc(2)]);
    }

    #[test]
    fn test_kill_latches_not_ok() {
        let a = VecCursor { docs: vec![(loc(1), json!({}))], pos: 0 };
        let dupset = Rc::new(RefCell::new(DupSet::new(540)));
        let mut driver = OrDriverCursor::new(vec![Box::new(a)], dupset);
        driver.kill();
        let err = driver.advance().unwrap_err();
        assert_eq!(err.code(), crate::errors::CoreErrorCode::Killed);
        assert!(!driver.advance().unwrap());
        assert!(!driver.ok());
    }
}
