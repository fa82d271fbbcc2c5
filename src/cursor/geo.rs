//! Nearest-first cursor over a 2D point field. Unlike the scan cursors,
//! every candidate is resolved to a document and a distance up front,
//! then walked in ascending distance order; there is no index structure
//! to stream from incrementally.

use serde_json::Value;

use super::{Cursor, TouchState, YieldState};
use crate::document::get_field;
use crate::dupset::DupSet;
use crate::errors::CoreResult;
use crate::index::{IndexKey, IndexSpec};
use crate::matcher::Matcher;
use crate::storage::RecordLocation;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

fn haversine_meters(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lat1r, lat2r) = (lat1.to_radians(), lat2.to_radians());
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2) + lat1r.cos() * lat2r.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

pub struct Geo2DCursor {
    ordered: Vec<(RecordLocation, Value)>,
    pos: usize,
    matcher: Option<Matcher>,
    dupset: DupSet,
    n_scanned: u64,
    noted: Option<RecordLocation>,
}

impl Geo2DCursor {
    /// `field` holds `[lon, lat]` on each candidate document; results are
    /// ordered nearest-first to `(lon, lat)`. Candidates lacking the field
    /// or with a malformed value are dropped rather than sorted to an
    /// arbitrary position.
    pub fn new(candidates: Vec<(RecordLocation, Value)>, field: &str, lon: f64, lat: f64, matcher: Option<Matcher>) -> Self {
        let mut with_distance: Vec<(f64, RecordLocation, Value)> = candidates
            .into_iter()
            .filter_map(|(loc, doc)| {
                let arr = get_field(&doc, field)?.as_array()?.clone();
                let flon = arr.first()?.as_f64()?;
                let flat = arr.get(1)?.as_f64()?;
                Some((haversine_meters(lon, lat, flon, flat), loc, doc))
            })
            .collect();
        with_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let ordered = with_distance.into_iter().map(|(_, loc, doc)| (loc, doc)).collect();
        Self { ordered, pos: 0, matcher, dupset: DupSet::new(540), n_scanned: 0, noted: None }
    }
}

impl Cursor for Geo2DCursor {
    fn ok(&self) -> bool {
        self.pos > 0 && self.pos <= self.ordered.len()
    }

    fn advance(&mut self) -> CoreResult<bool> {
        if self.pos < self.ordered.len() {
            self.pos += 1;
            self.n_scanned += 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn current_location(&self) -> Option<RecordLocation> {
        if self.pos == 0 {
            None
        } else {
            self.ordered.get(self.pos - 1).map(|(loc, _)| *loc)
        }
    }

    fn current_document(&self) -> Option<&Value> {
        if self.pos == 0 {
            None
        } else {
            self.ordered.get(self.pos - 1).map(|(_, doc)| doc)
        }
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
        if let Some(last) = state.last_location {
            self.pos = self.ordered.iter().position(|(l, _)| *l == last).map(|i| i + 1).unwrap_or(self.pos);
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loc(offset: u64) -> RecordLocation {
        RecordLocation::new(0, offset)
    }

    #[test]
    fn test_orders_nearest_first() {
        let candidates = vec![
            (loc(1), json!({"loc": [10.0, 10.0]})),
            (loc(2), json!({"loc": [0.001, 0.0]})),
            (loc(3), json!({"loc": [1.0, 1.0]})),
        ];
        let mut cursor = Geo2DCursor::new(candidates, "loc", 0.0, 0.0, None);
        let mut seen = Vec::new();
        while cursor.advance().unwrap() {
            seen.push(cursor.current_location().unwrap());
        }
        assert_eq!(seen, vec![loc(2), loc(3), loc(1)]);
    }

    #[test]
    fn test_drops_candidates_missing_field() {
        let candidates = vec![(loc(1), json!({"other": 1})), (loc(2), json!({"loc": [0.0, 0.0]}))];
        let mut cursor = Geo2DCursor::new(candidates, "loc", 0.0, 0.0, None);
        let mut count = 0;
        while cursor.advance().unwrap() {
            count += 1;
        }
        assert_eq!(count, 1);
    }
}
