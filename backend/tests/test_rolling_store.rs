//! Rolling store contract tests
//!
//! The four operation families, TTL behaviour and the degraded-mode
//! implementation used to exercise store outages.

use std::sync::Arc;
use std::time::Duration;

use chrono::TimeZone;
use fraud_detection_core_rs::core::time::ManualClock;
use fraud_detection_core_rs::store::{MemoryStore, OfflineStore, RollingStore, StoreError};

fn store() -> (MemoryStore, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap(),
    ));
    (MemoryStore::new(clock.clone()), clock)
}

const TTL: Duration = Duration::from_secs(3_600);

#[test]
fn test_counter_families() {
    let (store, _) = store();
    assert_eq!(store.incr_by("c", 1, TTL).unwrap(), 1);
    assert_eq!(store.incr_by("c", 2, TTL).unwrap(), 3);
    assert_eq!(store.get("c").unwrap().as_deref(), Some("3"));

    let total = store.incr_by_float("f", 1.5, TTL).unwrap();
    assert!((total - 1.5).abs() < 1e-12);
    let total = store.incr_by_float("f", 2.25, TTL).unwrap();
    assert!((total - 3.75).abs() < 1e-12);
}

#[test]
fn test_put_if_absent_keeps_first_value() {
    let (store, _) = store();
    assert!(store.put_if_absent("first", "a", TTL).unwrap());
    assert!(!store.put_if_absent("first", "b", TTL).unwrap());
    assert_eq!(store.get("first").unwrap().as_deref(), Some("a"));
}

#[test]
fn test_set_family() {
    let (store, _) = store();
    store.set_add("s", "alice@upi", TTL).unwrap();
    store.set_add("s", "bob@upi", TTL).unwrap();
    store.set_add("s", "alice@upi", TTL).unwrap(); // duplicate member

    assert_eq!(store.set_card("s").unwrap(), 2);
    assert!(store.set_contains("s", "alice@upi").unwrap());
    assert!(!store.set_contains("s", "carol@upi").unwrap());
    assert_eq!(store.set_members("s").unwrap(), vec!["alice@upi", "bob@upi"]);
}

#[test]
fn test_sorted_sequence_family() {
    let (store, _) = store();
    for (score, member) in [(100.0, "a"), (200.0, "b"), (300.0, "c"), (200.0, "b2")] {
        store.seq_add("z", score, member, TTL).unwrap();
    }
    assert_eq!(store.seq_count("z", 150.0, 250.0).unwrap(), 2);
    assert_eq!(store.seq_range("z", 200.0, 300.0).unwrap().len(), 3);
    assert_eq!(store.seq_remove_below("z", 200.0).unwrap(), 1);
    assert_eq!(store.seq_count("z", 0.0, 1_000.0).unwrap(), 3);
}

#[test]
fn test_bounded_list_family() {
    let (store, _) = store();
    for i in 1..=6 {
        store.list_push("h", &format!("v{i}"), TTL).unwrap();
        store.list_trim("h", 4).unwrap();
    }
    // Newest first, capped at 4
    assert_eq!(store.list_range("h").unwrap(), vec!["v6", "v5", "v4", "v3"]);
}

#[test]
fn test_ttl_expiry_applies_to_every_family() {
    let (store, clock) = store();
    let short = Duration::from_secs(60);
    store.put("v", "x", short).unwrap();
    store.set_add("s", "m", short).unwrap();
    store.seq_add("z", 1.0, "m", short).unwrap();
    store.list_push("l", "m", short).unwrap();

    clock.advance(chrono::Duration::seconds(61));

    assert_eq!(store.get("v").unwrap(), None);
    assert_eq!(store.set_card("s").unwrap(), 0);
    assert_eq!(store.seq_count("z", 0.0, 10.0).unwrap(), 0);
    assert!(store.list_range("l").unwrap().is_empty());
}

#[test]
fn test_later_writes_extend_retention() {
    let (store, clock) = store();
    store.set_add("s", "a", Duration::from_secs(100)).unwrap();
    clock.advance(chrono::Duration::seconds(90));
    store.set_add("s", "b", Duration::from_secs(100)).unwrap();
    clock.advance(chrono::Duration::seconds(90));
    // The second write refreshed the whole key
    assert_eq!(store.set_card("s").unwrap(), 2);
}

#[test]
fn test_remove_and_scan_prefix() {
    let (store, _) = store();
    store.put("drift:baseline:amount", "{}", TTL).unwrap();
    store.put("drift:baseline:is_night", "{}", TTL).unwrap();
    store.put("drift:live:amount", "1.0", TTL).unwrap();

    assert_eq!(
        store.scan_prefix("drift:baseline:").unwrap(),
        vec!["drift:baseline:amount", "drift:baseline:is_night"]
    );

    store.remove(&["drift:baseline:amount"]).unwrap();
    assert_eq!(
        store.scan_prefix("drift:baseline:").unwrap(),
        vec!["drift:baseline:is_night"]
    );
}

#[test]
fn test_offline_store_fails_every_operation() {
    let store = OfflineStore;
    assert_eq!(store.get("k").unwrap_err(), StoreError::Unavailable);
    assert_eq!(store.incr_by("k", 1, TTL).unwrap_err(), StoreError::Unavailable);
    assert_eq!(
        store.set_add("k", "m", TTL).unwrap_err(),
        StoreError::Unavailable
    );
    assert_eq!(
        store.seq_count("k", 0.0, 1.0).unwrap_err(),
        StoreError::Unavailable
    );
    assert_eq!(store.list_range("k").unwrap_err(), StoreError::Unavailable);
}
