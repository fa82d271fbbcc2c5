//! Per-field interval sets: the currency of both the optimal-plan check
//! (does every conjunct on a field collapse to one contiguous range?) and
//! the `$or` clause driver's range elimination (subtract what earlier
//! clauses already covered).

use crate::index::IndexKey;
use crate::planner::ast::{FilterOp, Predicate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndPoint {
    Unbounded,
    Inclusive(IndexKey),
    Exclusive(IndexKey),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub low: EndPoint,
    pub high: EndPoint,
}

fn low_pos(e: &EndPoint) -> Option<(IndexKey, i8)> {
    match e {
        EndPoint::Unbounded => None,
        EndPoint::Inclusive(k) => Some((k.clone(), 0)),
        EndPoint::Exclusive(k) => Some((k.clone(), 1)),
    }
}

fn high_pos(e: &EndPoint) -> Option<(IndexKey, i8)> {
    match e {
        EndPoint::Unbounded => None,
        EndPoint::Inclusive(k) => Some((k.clone(), 0)),
        EndPoint::Exclusive(k) => Some((k.clone(), -1)),
    }
}

/// `low_pos(a) < low_pos(b)`; `None` (unbounded) is the smallest low bound.
fn low_lt(a: &EndPoint, b: &EndPoint) -> bool {
    low_pos(a) < low_pos(b)
}

/// `high_pos(a) > high_pos(b)`; `None` (unbounded) is the largest high bound.
fn high_gt(a: &EndPoint, b: &EndPoint) -> bool {
    match (high_pos(a), high_pos(b)) {
        (None, None) => false,
        (None, Some(_)) => true,
        (Some(_), None) => false,
        (Some(x), Some(y)) => x > y,
    }
}

/// True when `high`'s position is at or past `low`'s: the two bounds
/// overlap or touch at a shared included point.
fn high_at_least_low(high: &EndPoint, low: &EndPoint) -> bool {
    match (high, low) {
        (EndPoint::Unbounded, _) | (_, EndPoint::Unbounded) => true,
        (h, l) => {
            let hp = match h {
                EndPoint::Inclusive(k) => (k.clone(), 0i8),
                EndPoint::Exclusive(k) => (k.clone(), -1i8),
                EndPoint::Unbounded => unreachable!(),
            };
            let lp = match l {
                EndPoint::Inclusive(k) => (k.clone(), 0i8),
                EndPoint::Exclusive(k) => (k.clone(), 1i8),
                EndPoint::Unbounded => unreachable!(),
            };
            hp >= lp
        }
    }
}

fn invert_low_to_high(e: &EndPoint) -> EndPoint {
    match e {
        EndPoint::Inclusive(k) => EndPoint::Exclusive(k.clone()),
        EndPoint::Exclusive(k) => EndPoint::Inclusive(k.clone()),
        EndPoint::Unbounded => unreachable!("caller only inverts a bounded cut point"),
    }
}

fn invert_high_to_low(e: &EndPoint) -> EndPoint {
    match e {
        EndPoint::Inclusive(k) => EndPoint::Exclusive(k.clone()),
        EndPoint::Exclusive(k) => EndPoint::Inclusive(k.clone()),
        EndPoint::Unbounded => unreachable!("caller only inverts a bounded cut point"),
    }
}

fn intersect_interval(a: &Interval, b: &Interval) -> Option<Interval> {
    let low = if low_lt(&a.low, &b.low) { b.low.clone() } else { a.low.clone() };
    let high = if high_gt(&a.high, &b.high) { b.high.clone() } else { a.high.clone() };
    if high_at_least_low(&high, &low) {
        Some(Interval { low, high })
    } else {
        None
    }
}

fn subtract_one(iv: &Interval, cut: &Interval) -> Vec<Interval> {
    if !(high_at_least_low(&iv.high, &cut.low) && high_at_least_low(&cut.high, &iv.low)) {
        return vec![iv.clone()];
    }
    let mut out = Vec::new();
    if low_lt(&iv.low, &cut.low) {
        out.push(Interval { low: iv.low.clone(), high: invert_low_to_high(&cut.low) });
    }
    if high_gt(&iv.high, &cut.high) {
        out.push(Interval { low: invert_high_to_low(&cut.high), high: iv.high.clone() });
    }
    out
}

fn single_predicate_interval(op: &FilterOp) -> Option<Interval> {
    match op {
        FilterOp::Eq(v) => IndexKey::from_json(v).map(|k| Interval { low: EndPoint::Inclusive(k.clone()), high: EndPoint::Inclusive(k) }),
        FilterOp::Gte(v) => IndexKey::from_json(v).map(|k| Interval { low: EndPoint::Inclusive(k), high: EndPoint::Unbounded }),
        FilterOp::Gt(v) => IndexKey::from_json(v).map(|k| Interval { low: EndPoint::Exclusive(k), high: EndPoint::Unbounded }),
        FilterOp::Lte(v) => IndexKey::from_json(v).map(|k| Interval { low: EndPoint::Unbounded, high: EndPoint::Inclusive(k) }),
        FilterOp::Lt(v) => IndexKey::from_json(v).map(|k| Interval { low: EndPoint::Unbounded, high: EndPoint::Exclusive(k) }),
        FilterOp::Regex(_) | FilterOp::Exists(_) | FilterOp::Near { .. } => None,
    }
}

/// A sorted, non-overlapping union of ranges over one field's key domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn empty() -> Self {
        Self { intervals: Vec::new() }
    }

    pub fn full() -> Self {
        Self { intervals: vec![Interval { low: EndPoint::Unbounded, high: EndPoint::Unbounded }] }
    }

    pub fn point(key: IndexKey) -> Self {
        Self { intervals: vec![Interval { low: EndPoint::Inclusive(key.clone()), high: EndPoint::Inclusive(key) }] }
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    fn normalize(mut intervals: Vec<Interval>) -> Vec<Interval> {
        intervals.sort_by(|a, b| low_pos(&a.low).cmp(&low_pos(&b.low)));
        let mut merged: Vec<Interval> = Vec::new();
        for iv in intervals {
            if let Some(last) = merged.last_mut() {
                if high_at_least_low(&last.high, &iv.low) {
                    if high_gt(&iv.high, &last.high) {
                        last.high = iv.high;
                    }
                    continue;
                }
            }
            merged.push(iv);
        }
        merged
    }

    pub fn union(&self, other: &Self) -> Self {
        let mut all = self.intervals.clone();
        all.extend(other.intervals.clone());
        Self { intervals: Self::normalize(all) }
    }

    /// Whether `key` falls inside any interval of this set — used by the
    /// matcher to test a projected index key without fetching the
    /// document.
    pub fn contains(&self, key: &IndexKey) -> bool {
        self.intervals.iter().any(|iv| {
            let low_ok = match &iv.low {
                EndPoint::Unbounded => true,
                EndPoint::Inclusive(k) => key >= k,
                EndPoint::Exclusive(k) => key > k,
            };
            let high_ok = match &iv.high {
                EndPoint::Unbounded => true,
                EndPoint::Inclusive(k) => key <= k,
                EndPoint::Exclusive(k) => key < k,
            };
            low_ok && high_ok
        })
    }

    /// Removes every point covered by `other`, the `$or` driver's range
    /// elimination of clause `i` against clauses `0..i`.
    pub fn subtract(&self, other: &Self) -> Self {
        let mut current = self.intervals.clone();
        for cut in &other.intervals {
            current = current.into_iter().flat_map(|iv| subtract_one(&iv, cut)).collect();
        }
        Self { intervals: Self::normalize(current) }
    }

    /// Builds the interval set for one field from every boundable
    /// predicate conjunct on it. Returns `None` if any predicate on the
    /// field is not representable as a range (regex, exists, near) — the
    /// field then cannot be an optimal index's leading field.
    pub fn from_boundable_predicates(preds: &[&Predicate]) -> Option<IntervalSet> {
        let mut acc = Interval { low: EndPoint::Unbounded, high: EndPoint::Unbounded };
        for p in preds {
            let iv = single_predicate_interval(&p.op)?;
            acc = intersect_interval(&acc, &iv)?;
        }
        Some(IntervalSet { intervals: vec![acc] })
    }
}
