//! Packed, little-endian on-disk header layouts for the capped engine.
//!
//! These mirror the four header shapes named in the persisted-state design:
//! the namespace header, the extent header, the record header, and the
//! deleted-record header (which reuses the record header plus a
//! `next_deleted` pointer). The in-memory arena in `engine.rs` is the
//! source of truth; these functions are what `cap_alloc`/`compact`/
//! `advance_cap_extent` write through `DurableWriter` so a real deployment's
//! WAL observes every structural change, not just document payloads.

use super::engine::{CapFirstNewRecord, ExtentId};
use crate::storage::record::RecordLocation;

const INVALID_EXTENT: u32 = u32::MAX;
const INVALID_FILE: u32 = u32::MAX;
const INVALID_OFFSET: u64 = u64::MAX;

fn location_to_bytes(loc: Option<RecordLocation>, buf: &mut Vec<u8>) {
    let loc = loc.unwrap_or(RecordLocation::INVALID);
    buf.extend_from_slice(&loc.file_id.to_le_bytes());
    buf.extend_from_slice(&loc.offset.to_le_bytes());
}

fn location_from_bytes(data: &[u8]) -> Option<RecordLocation> {
    let file_id = u32::from_le_bytes(data[0..4].try_into().unwrap());
    let offset = u64::from_le_bytes(data[4..12].try_into().unwrap());
    let loc = RecordLocation::new(file_id, offset);
    if loc.is_invalid() { None } else { Some(loc) }
}

/// `{prev, next, first_record, last_record, capacity}`, as named in the
/// extent header design.
pub const EXTENT_HEADER_SIZE: usize = 4 + 4 + 12 + 12 + 8;

pub fn extent_header_bytes(
    prev: Option<ExtentId>,
    next: Option<ExtentId>,
    first_record: Option<RecordLocation>,
    last_record: Option<RecordLocation>,
    capacity: u64,
) -> [u8; EXTENT_HEADER_SIZE] {
    let mut buf = Vec::with_capacity(EXTENT_HEADER_SIZE);
    buf.extend_from_slice(&prev.unwrap_or(INVALID_EXTENT).to_le_bytes());
    buf.extend_from_slice(&next.unwrap_or(INVALID_EXTENT).to_le_bytes());
    location_to_bytes(first_record, &mut buf);
    location_to_bytes(last_record, &mut buf);
    buf.extend_from_slice(&capacity.to_le_bytes());
    buf.try_into().expect("fixed-size extent header")
}

/// `{length_with_headers, extent_offset}`, optionally followed by
/// `next_deleted` when the record is on the free chain.
pub const RECORD_HEADER_SIZE: usize = 8 + 8;
pub const DELETED_RECORD_HEADER_SIZE: usize = RECORD_HEADER_SIZE + 12;

pub fn record_header_bytes(length_with_headers: u64, extent_offset: u64) -> [u8; RECORD_HEADER_SIZE] {
    let mut buf = Vec::with_capacity(RECORD_HEADER_SIZE);
    buf.extend_from_slice(&length_with_headers.to_le_bytes());
    buf.extend_from_slice(&extent_offset.to_le_bytes());
    buf.try_into().expect("fixed-size record header")
}

pub fn deleted_record_header_bytes(
    length_with_headers: u64,
    extent_offset: u64,
    next_deleted: Option<RecordLocation>,
) -> [u8; DELETED_RECORD_HEADER_SIZE] {
    let mut buf = Vec::with_capacity(DELETED_RECORD_HEADER_SIZE);
    buf.extend_from_slice(&record_header_bytes(length_with_headers, extent_offset));
    location_to_bytes(next_deleted, &mut buf);
    buf.try_into().expect("fixed-size deleted record header")
}

/// Tag byte distinguishing the three `CapFirstNewRecord` states in the
/// namespace header, preserving the tri-state rather than collapsing it to
/// a single optional location.
pub fn cap_first_new_record_to_bytes(state: CapFirstNewRecord) -> [u8; 13] {
    let mut buf = Vec::with_capacity(13);
    match state {
        CapFirstNewRecord::NeverLooped => {
            buf.push(0);
            location_to_bytes(None, &mut buf);
        }
        CapFirstNewRecord::JustWrapped => {
            buf.push(1);
            location_to_bytes(None, &mut buf);
        }
        CapFirstNewRecord::Valid(loc) => {
            buf.push(2);
            location_to_bytes(Some(loc), &mut buf);
        }
    }
    buf.try_into().expect("fixed-size tri-state header")
}

pub fn cap_first_new_record_from_bytes(data: &[u8]) -> CapFirstNewRecord {
    match data[0] {
        0 => CapFirstNewRecord::NeverLooped,
        1 => CapFirstNewRecord::JustWrapped,
        _ => CapFirstNewRecord::Valid(location_from_bytes(&data[1..13]).unwrap_or(RecordLocation::INVALID)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_header_roundtrip_sizes() {
        let bytes = extent_header_bytes(Some(0), None, Some(RecordLocation::new(0, 16)), None, 4096);
        assert_eq!(bytes.len(), EXTENT_HEADER_SIZE);
    }

    #[test]
    fn test_tri_state_roundtrip() {
        for state in [
            CapFirstNewRecord::NeverLooped,
            CapFirstNewRecord::JustWrapped,
            CapFirstNewRecord::Valid(RecordLocation::new(2, 40)),
        ] {
            let bytes = cap_first_new_record_to_bytes(state);
            assert_eq!(cap_first_new_record_from_bytes(&bytes), state);
        }
    }
}
