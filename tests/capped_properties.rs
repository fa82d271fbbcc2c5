//! Integration coverage for capped-namespace invariants: bounded live
//! bytes, FIFO forward iteration, wrap-driven recovery failure, and
//! `truncate_after` restoring a namespace to a consistent state.

use serde_json::json;

use polydb::cursor::{CappedForwardCursor, Cursor};
use polydb::storage::capped::CappedNamespace;
use polydb::storage::MemoryDurableWriter;

/// Total live bytes never exceed the namespace's declared capacity, even
/// as inserts repeatedly force the cyclic allocator to evict old records.
#[test]
fn test_live_bytes_never_exceed_capacity() {
    let mut ns = CappedNamespace::new("events", 0, &[500]);
    let mut writer = MemoryDurableWriter::new();
    for i in 0..80 {
        let _ = ns.insert(&mut writer, json!({"i": i, "pad": "xxxxxxxxxx"}));
        assert!(ns.live_bytes() <= ns.total_capacity(), "live bytes exceeded capacity after insert {i}");
    }
}

/// A forward cursor over a namespace that never wraps visits records in
/// exactly their insertion order.
#[test]
fn test_forward_cursor_visits_insertion_order() {
    let mut ns = CappedNamespace::new("events", 0, &[4096]);
    let mut writer = MemoryDurableWriter::new();
    let mut locs = Vec::new();
    for i in 0..25 {
        locs.push(ns.insert(&mut writer, json!({"i": i})).unwrap());
    }

    let mut cursor = CappedForwardCursor::new(&ns, None);
    let mut seen = Vec::new();
    while cursor.advance().unwrap() {
        seen.push(cursor.current_location().unwrap());
    }
    assert_eq!(seen, locs);
}

/// Capped wrap: fill a small namespace until the oldest record is
/// overwritten. A cursor that had yielded while pointing at that record
/// must report `RecoveryFailed`, never a silently skipped-ahead document.
#[test]
fn test_capped_wrap_overwrites_oldest_and_fails_recovery() {
    let mut ns = CappedNamespace::new("events", 0, &[1000]);
    let mut writer = MemoryDurableWriter::new();

    let first = ns.insert(&mut writer, json!({"x": 1})).unwrap();
    let yielded_state = polydb::cursor::YieldState { last_key: None, last_location: Some(first) };

    let mut x = 2;
    while ns.get(first).is_some() {
        let _ = ns.insert(&mut writer, json!({"x": x}));
        x += 1;
        assert!(x < 100_000, "namespace never wrapped far enough to overwrite the first record");
    }

    let mut cursor = CappedForwardCursor::new(&ns, None);
    let err = cursor.recover_from_yield(yielded_state).unwrap_err();
    assert_eq!(err.code().code(), "CORE_RECOVERY_FAILED");
}

/// `truncate_after(r5, inclusive=false)` on 10 records leaves r0..=r5, and
/// the namespace keeps cycling normally afterward: enough further inserts
/// still reach back and overwrite r0 first, same as if it had never been
/// truncated.
#[test]
fn test_truncate_after_restores_fifo_order() {
    let mut ns = CappedNamespace::new("events", 0, &[1000]);
    let mut writer = MemoryDurableWriter::new();
    let mut locs = Vec::new();
    for i in 0..10 {
        locs.push(ns.insert(&mut writer, json!({"i": i, "pad": "xxxxxxxxxx"})).unwrap());
    }

    ns.truncate_after(locs[5], false).unwrap();

    let mut cursor = CappedForwardCursor::new(&ns, None);
    let mut seen = Vec::new();
    while cursor.advance().unwrap() {
        seen.push(cursor.current_location().unwrap());
    }
    assert_eq!(seen, locs[0..=5]);
    assert_eq!(ns.live_count(), 6);

    let mut x = 10;
    while ns.get(locs[0]).is_some() {
        let _ = ns.insert(&mut writer, json!({"i": x, "pad": "xxxxxxxxxx"}));
        x += 1;
        assert!(x < 100_000, "namespace never wrapped far enough to overwrite r0 after truncation");
    }
}

/// `truncate_after` refuses to empty a namespace outright rather than
/// silently truncating its last remaining document.
#[test]
fn test_truncate_after_refuses_to_empty_namespace() {
    let mut ns = CappedNamespace::new("events", 0, &[4096]);
    let mut writer = MemoryDurableWriter::new();
    let only = ns.insert(&mut writer, json!({"i": 0})).unwrap();

    let err = ns.truncate_after(only, true).unwrap_err();
    assert_eq!(err.code().code(), "CORE_REFUSE_EMPTY");
}
