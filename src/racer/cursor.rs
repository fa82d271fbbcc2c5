//! `RacerCursor`: several candidate plans advance in round-robin lockstep
//! until one earns exclusive control (takeover) or an in-order plan
//! finishes first (hybrid completion).

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde_json::Value;

use super::RacerState;
use crate::config::CoreConfig;
use crate::cursor::{Cursor, TouchState, YieldState};
use crate::dupset::DupSet;
use crate::errors::{CoreError, CoreResult};
use crate::index::{IndexKey, IndexSpec};
use crate::matcher::Matcher;
use crate::storage::RecordLocation;

struct ChildStats {
    matches: u64,
    in_order: bool,
}

pub struct RacerCursor {
    children: Vec<Box<dyn Cursor>>,
    stats: Vec<ChildStats>,
    live: HashSet<usize>,
    state: RacerState,
    turn: usize,
    dupset: Rc<RefCell<DupSet>>,
    config: CoreConfig,
    current: Option<(RecordLocation, Value)>,
    current_owner: Option<usize>,
    completed_n_scanned: u64,
    noted: Option<RecordLocation>,
    other_plans: Vec<(Box<dyn Cursor>, bool)>,
}

impl RacerCursor {
    /// `in_order[i]` records whether `children[i]`'s plan satisfies the
    /// requested sort on its own; a plan reaching `HybridComplete` while
    /// in order ends the race without waiting for takeover thresholds.
    /// `dupset` is shared with the caller (an `$or` driver shares one
    /// across every clause's racer); pass a fresh one for a standalone
    /// query.
    pub fn new(children: Vec<Box<dyn Cursor>>, in_order: Vec<bool>, dupset: Rc<RefCell<DupSet>>, config: CoreConfig) -> Self {
        let live = (0..children.len()).collect();
        let stats = in_order.into_iter().map(|in_order| ChildStats { matches: 0, in_order }).collect();
        Self {
            children,
            stats,
            live,
            state: RacerState::Racing,
            turn: 0,
            dupset,
            config,
            current: None,
            current_owner: None,
            completed_n_scanned: 0,
            noted: None,
            other_plans: Vec::new(),
        }
    }

    /// The cached-plan fast path: races the plan cache's remembered winner
    /// alone, holding `others` in reserve. If the cached plan scans past
    /// `scan_takeover` without reaching `match_takeover` matches, or loses
    /// every child to a failed yield recovery, the reserved plans join the
    /// race via `add_other_plans`.
    pub fn new_with_cached_plan(
        cached: Box<dyn Cursor>,
        cached_in_order: bool,
        others: Vec<(Box<dyn Cursor>, bool)>,
        dupset: Rc<RefCell<DupSet>>,
        config: CoreConfig,
    ) -> Self {
        let mut racer = Self::new(vec![cached], vec![cached_in_order], dupset, config);
        racer.other_plans = others;
        racer
    }

    /// Moves every reserved plan into the active race. A no-op once the
    /// reserve is empty (either never set, or already added).
    fn add_other_plans(&mut self) {
        if self.other_plans.is_empty() {
            return;
        }
        let start = self.children.len();
        for (cursor, in_order) in self.other_plans.drain(..) {
            self.children.push(cursor);
            self.stats.push(ChildStats { matches: 0, in_order });
        }
        for idx in start..self.children.len() {
            self.live.insert(idx);
        }
    }

    /// True while running the cached-plan fast path with unconsumed
    /// fallback plans still in reserve.
    fn cached_fast_path_active(&self) -> bool {
        !self.other_plans.is_empty()
    }

    fn min_scanned_across_live(&self) -> u64 {
        self.live.iter().map(|&i| self.children[i].n_scanned()).min().unwrap_or(0)
    }

    fn total_scanned_across_live(&self) -> u64 {
        self.live.iter().map(|&i| self.children[i].n_scanned()).sum()
    }

    fn best_child_by_matches(&self) -> Option<usize> {
        self.live.iter().copied().max_by_key(|&i| self.stats[i].matches)
    }

    fn drop_child(&mut self, idx: usize) {
        self.live.remove(&idx);
    }

    fn advance_racing(&mut self) -> CoreResult<bool> {
        loop {
            if self.live.is_empty() {
                self.state = RacerState::Done;
                self.current = None;
                return Ok(false);
            }

            if self.cached_fast_path_active() && self.live.len() == 1 {
                let only = *self.live.iter().next().unwrap();
                if self.children[only].n_scanned() >= self.config.scan_takeover && self.stats[only].matches < self.config.match_takeover {
                    self.add_other_plans();
                }
            }

            let idx = *self.live.iter().find(|&&i| i >= self.turn).unwrap_or_else(|| self.live.iter().min().unwrap());
            self.turn = (idx + 1) % self.children.len();

            let advanced = self.children[idx].advance()?;
            if !advanced {
                let was_in_order = self.stats[idx].in_order;
                self.drop_child(idx);
                if was_in_order {
                    self.state = RacerState::HybridComplete;
                    self.completed_n_scanned = self.children[idx].n_scanned();
                    self.current = None;
                    return Ok(false);
                }
                continue;
            }

            let location = match self.children[idx].current_location() {
                Some(loc) => loc,
                None => continue,
            };
            let document = self.children[idx].current_document().cloned();
            let is_match = match self.children[idx].matcher() {
                Some(m) => document.as_ref().map(|d| m.matches(d)).unwrap_or(false),
                None => true,
            };

            if is_match && !self.dupset.borrow_mut().get_set_dup(location) {
                self.stats[idx].matches += 1;
                self.current = document.map(|d| (location, d));
                self.current_owner = Some(idx);

                if self.stats[idx].in_order && self.stats[idx].matches >= self.config.match_takeover {
                    self.state = RacerState::TakenOver { winner_idx: idx };
                } else if self.total_scanned_across_live() >= self.config.scan_takeover {
                    if let Some(winner) = self.best_child_by_matches() {
                        self.state = RacerState::TakenOver { winner_idx: winner };
                    }
                }
                return Ok(true);
            }
        }
    }

    fn advance_narrowed(&mut self) -> CoreResult<bool> {
        let winner = match self.state {
            RacerState::TakenOver { winner_idx } => winner_idx,
            _ => {
                self.current = None;
                return Ok(false);
            }
        };
        loop {
            if !self.children[winner].advance()? {
                self.completed_n_scanned = self.children[winner].n_scanned();
                self.state = RacerState::Done;
                self.current = None;
                return Ok(false);
            }
            let location = match self.children[winner].current_location() {
                Some(loc) => loc,
                None => continue,
            };
            let document = self.children[winner].current_document().cloned();
            let is_match = match self.children[winner].matcher() {
                Some(m) => document.as_ref().map(|d| m.matches(d)).unwrap_or(false),
                None => true,
            };
            if is_match && !self.dupset.borrow_mut().get_set_dup(location) {
                self.current = document.map(|d| (location, d));
                self.current_owner = Some(winner);
                return Ok(true);
            }
        }
    }
}

impl Cursor for RacerCursor {
    fn ok(&self) -> bool {
        self.current.is_some()
    }

    fn advance(&mut self) -> CoreResult<bool> {
        match self.state {
            RacerState::Racing => self.advance_racing(),
            RacerState::TakenOver { .. } => self.advance_narrowed(),
            RacerState::HybridComplete | RacerState::Done => {
                self.current = None;
                Ok(false)
            }
        }
    }

    fn current_location(&self) -> Option<RecordLocation> {
        self.current.as_ref().map(|(loc, _)| *loc)
    }

    fn current_document(&self) -> Option<&Value> {
        self.current.as_ref().map(|(_, doc)| doc)
    }

    fn current_key(&self) -> Option<&[IndexKey]> {
        self.current_owner.and_then(|i| self.children[i].current_key())
    }

    fn index_key_pattern(&self) -> Option<&IndexSpec> {
        self.current_owner.and_then(|i| self.children[i].index_key_pattern())
    }

    fn is_multi_key(&self) -> bool {
        self.current_owner.map(|i| self.children[i].is_multi_key()).unwrap_or(false)
    }

    fn matcher(&self) -> Option<&Matcher> {
        self.current_owner.and_then(|i| self.children[i].matcher())
    }

    fn key_fields_only(&self) -> bool {
        self.current_owner.map(|i| self.children[i].key_fields_only()).unwrap_or(false)
    }

    fn get_set_dup(&mut self, location: RecordLocation) -> bool {
        self.dupset.borrow_mut().get_set_dup(location)
    }

    fn prepare_to_yield(&mut self) -> YieldState {
        for &i in &self.live {
            self.children[i].prepare_to_yield();
        }
        YieldState { last_key: self.current_key().map(|k| k.to_vec()), last_location: self.current_location() }
    }

    fn recover_from_yield(&mut self, state: YieldState) -> CoreResult<()> {
        let recover_all = |this: &mut Self| -> HashSet<usize> {
            let mut still_live = HashSet::new();
            for &i in &this.live.clone() {
                let child_state = YieldState { last_key: state.last_key.clone(), last_location: state.last_location };
                if this.children[i].recover_from_yield(child_state).is_ok() {
                    still_live.insert(i);
                }
            }
            still_live
        };

        let mut still_live = recover_all(self);

        // Every child that survived the yield was pointed at a now-deleted
        // record; with reserve plans still held back, fall back to full
        // racing instead of reporting an unrecoverable error outright.
        if still_live.is_empty() && !self.live.is_empty() && self.cached_fast_path_active() {
            self.add_other_plans();
            still_live = recover_all(self);
        }

        if still_live.is_empty() && !self.live.is_empty() {
            return Err(CoreError::recovery_failed("every racing plan failed to recover from yield"));
        }
        self.live = still_live;
        Ok(())
    }

    fn prepare_to_touch_earlier_iterate(&mut self) -> TouchState {
        for &i in &self.live {
            self.children[i].prepare_to_touch_earlier_iterate();
        }
        TouchState { last_location: self.current_location() }
    }

    fn recover_from_touching_earlier_iterate(&mut self, state: TouchState) -> CoreResult<()> {
        for &i in &self.live.clone() {
            self.children[i].recover_from_touching_earlier_iterate(state.clone())?;
        }
        Ok(())
    }

    fn n_scanned(&self) -> u64 {
        match self.state {
            RacerState::Racing => self.min_scanned_across_live(),
            RacerState::TakenOver { winner_idx } => self.children[winner_idx].n_scanned(),
            RacerState::HybridComplete | RacerState::Done => self.completed_n_scanned,
        }
    }

    fn note_location(&mut self, location: RecordLocation) {
        self.noted = Some(location);
    }

    fn check_location(&self, location: RecordLocation) -> bool {
        self.noted == Some(location)
    }
}
