//! `DupSet`: the set of `RecordLocation`s already emitted across every
//! child cursor of a racer (and, within a `$or`, across every clause).
//! Starts as a small ordered array and upgrades to a hash set past a
//! capacity, preserving every entry already inserted.

use std::collections::HashSet;

use crate::storage::RecordLocation;

enum Inner {
    Array(Vec<RecordLocation>),
    Hash(HashSet<RecordLocation>),
}

pub struct DupSet {
    inner: Inner,
    capacity: usize,
}

impl DupSet {
    pub fn new(capacity: usize) -> Self {
        Self { inner: Inner::Array(Vec::new()), capacity }
    }

    pub fn contains(&self, location: &RecordLocation) -> bool {
        match &self.inner {
            Inner::Array(v) => v.contains(location),
            Inner::Hash(s) => s.contains(location),
        }
    }

    /// Membership test plus insert. Returns `true` when `location` was
    /// already present (a duplicate the caller must suppress); `false`
    /// on first sighting, after which it is now a member.
    pub fn get_set_dup(&mut self, location: RecordLocation) -> bool {
        if self.contains(&location) {
            return true;
        }
        self.insert(location);
        false
    }

    fn insert(&mut self, location: RecordLocation) {
        match &mut self.inner {
            Inner::Array(v) => {
                v.push(location);
                if v.len() > self.capacity {
                    let upgraded: HashSet<RecordLocation> = v.drain(..).collect();
                    self.inner = Inner::Hash(upgraded);
                }
            }
            Inner::Hash(s) => {
                s.insert(location);
            }
        }
    }

    pub fn len(&self) -> usize {
        match &self.inner {
            Inner::Array(v) => v.len(),
            Inner::Hash(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_array_backed(&self) -> bool {
        matches!(self.inner, Inner::Array(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(offset: u64) -> RecordLocation {
        RecordLocation::new(0, offset)
    }

    #[test]
    fn test_first_sighting_then_duplicate() {
        let mut set = DupSet::new(540);
        assert!(!set.get_set_dup(loc(1)));
        assert!(set.get_set_dup(loc(1)));
    }

    #[test]
    fn test_upgrades_past_capacity_preserving_entries() {
        let mut set = DupSet::new(4);
        for i in 0..4 {
            assert!(!set.get_set_dup(loc(i)));
        }
        assert!(set.is_array_backed());
        assert!(!set.get_set_dup(loc(100)));
        assert!(!set.is_array_backed());
        for i in 0..4 {
            assert!(set.contains(&loc(i)));
        }
        assert!(set.get_set_dup(loc(100)));
    }
}
