//! In-process rolling store
//!
//! Backs the [`RollingStore`] contract with a striped-mutex hash map.
//! Atomicity per operation follows from each key living in exactly one
//! stripe; operations on different stripes never contend. Expiry is lazy:
//! an expired entry is discarded by the next operation that touches it.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::time::Clock;
use crate::store::{RollingStore, StoreResult};

const STRIPES: usize = 16;

#[derive(Debug, Clone)]
enum Value {
    Scalar(String),
    Set(HashSet<String>),
    // Kept sorted by score; duplicate members are allowed.
    Seq(Vec<(f64, String)>),
    List(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: DateTime<Utc>,
}

type Stripe = HashMap<String, Entry>;

/// Striped in-memory implementation of [`RollingStore`].
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use fraud_detection_core_rs::{MemoryStore, RollingStore, SystemClock};
///
/// let store = MemoryStore::new(Arc::new(SystemClock));
/// store.set_add("user:u1:recipients", "a@upi", Duration::from_secs(60)).unwrap();
/// assert!(store.set_contains("user:u1:recipients", "a@upi").unwrap());
/// ```
#[derive(Debug)]
pub struct MemoryStore {
    stripes: Vec<Mutex<Stripe>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let stripes = (0..STRIPES).map(|_| Mutex::new(HashMap::new())).collect();
        Self { stripes, clock }
    }

    fn stripe(&self, key: &str) -> MutexGuard<'_, Stripe> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let idx = (hasher.finish() as usize) % STRIPES;
        self.stripes[idx].lock().expect("store stripe poisoned")
    }

    fn expiry(&self, ttl: Duration) -> DateTime<Utc> {
        self.clock.now() + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero())
    }

    /// Drop the entry if its TTL has lapsed.
    fn purge_expired(map: &mut Stripe, key: &str, now: DateTime<Utc>) {
        let expired = map.get(key).is_some_and(|e| e.expires_at <= now);
        if expired {
            map.remove(key);
        }
    }

    /// Live entry for a key, or a fresh one built by `init`. Every write
    /// path funnels through here so TTL refresh is uniform.
    fn upsert<'a>(
        map: &'a mut Stripe,
        key: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        init: impl FnOnce() -> Value,
    ) -> &'a mut Entry {
        Self::purge_expired(map, key, now);
        let entry = map.entry(key.to_string()).or_insert_with(|| Entry {
            value: init(),
            expires_at,
        });
        entry.expires_at = expires_at;
        entry
    }
}

impl RollingStore for MemoryStore {
    fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        map.insert(
            key.to_string(),
            Entry {
                value: Value::Scalar(value.to_string()),
                expires_at,
            },
        );
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(map.get(key).and_then(|e| match &e.value {
            Value::Scalar(v) => Some(v.clone()),
            _ => None,
        }))
    }

    fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        let absent = !map.contains_key(key);
        if absent {
            map.insert(
                key.to_string(),
                Entry {
                    value: Value::Scalar(value.to_string()),
                    expires_at,
                },
            );
        } else if let Some(entry) = map.get_mut(key) {
            entry.expires_at = expires_at;
        }
        Ok(absent)
    }

    fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> StoreResult<i64> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        let entry = Self::upsert(&mut map, key, now, expires_at, || {
            Value::Scalar("0".to_string())
        });
        let current = match &entry.value {
            Value::Scalar(v) => v.parse::<i64>().unwrap_or(0),
            _ => 0,
        };
        let next = current + delta;
        entry.value = Value::Scalar(next.to_string());
        Ok(next)
    }

    fn incr_by_float(&self, key: &str, delta: f64, ttl: Duration) -> StoreResult<f64> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        let entry = Self::upsert(&mut map, key, now, expires_at, || {
            Value::Scalar("0".to_string())
        });
        let current = match &entry.value {
            Value::Scalar(v) => v.parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        };
        let next = current + delta;
        entry.value = Value::Scalar(next.to_string());
        Ok(next)
    }

    fn set_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        let entry = Self::upsert(&mut map, key, now, expires_at, || Value::Set(HashSet::new()));
        match &mut entry.value {
            Value::Set(set) => {
                set.insert(member.to_string());
            }
            other => *other = Value::Set(HashSet::from([member.to_string()])),
        }
        Ok(())
    }

    fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(match map.get(key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => set.contains(member),
            _ => false,
        })
    }

    fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(match map.get(key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => {
                let mut members: Vec<String> = set.iter().cloned().collect();
                members.sort();
                members
            }
            _ => Vec::new(),
        })
    }

    fn set_card(&self, key: &str) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(match map.get(key) {
            Some(Entry {
                value: Value::Set(set),
                ..
            }) => set.len(),
            _ => 0,
        })
    }

    fn set_touch(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        if let Some(entry) = map.get_mut(key) {
            entry.expires_at = expires_at;
        }
        Ok(())
    }

    fn seq_add(&self, key: &str, score: f64, member: &str, ttl: Duration) -> StoreResult<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        let entry = Self::upsert(&mut map, key, now, expires_at, || Value::Seq(Vec::new()));
        match &mut entry.value {
            Value::Seq(seq) => {
                let pos = seq.partition_point(|(s, _)| *s <= score);
                seq.insert(pos, (score, member.to_string()));
            }
            other => *other = Value::Seq(vec![(score, member.to_string())]),
        }
        Ok(())
    }

    fn seq_count(&self, key: &str, lo: f64, hi: f64) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(match map.get(key) {
            Some(Entry {
                value: Value::Seq(seq),
                ..
            }) => seq.iter().filter(|(s, _)| *s >= lo && *s <= hi).count(),
            _ => 0,
        })
    }

    fn seq_range(&self, key: &str, lo: f64, hi: f64) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(match map.get(key) {
            Some(Entry {
                value: Value::Seq(seq),
                ..
            }) => seq
                .iter()
                .filter(|(s, _)| *s >= lo && *s <= hi)
                .map(|(_, m)| m.clone())
                .collect(),
            _ => Vec::new(),
        })
    }

    fn seq_remove_below(&self, key: &str, floor: f64) -> StoreResult<usize> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(match map.get_mut(key) {
            Some(Entry {
                value: Value::Seq(seq),
                ..
            }) => {
                let before = seq.len();
                seq.retain(|(s, _)| *s >= floor);
                before - seq.len()
            }
            _ => 0,
        })
    }

    fn list_push(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let now = self.clock.now();
        let expires_at = self.expiry(ttl);
        let mut map = self.stripe(key);
        let entry = Self::upsert(&mut map, key, now, expires_at, || {
            Value::List(VecDeque::new())
        });
        match &mut entry.value {
            Value::List(list) => list.push_front(value.to_string()),
            other => *other = Value::List(VecDeque::from([value.to_string()])),
        }
        Ok(())
    }

    fn list_trim(&self, key: &str, len: usize) -> StoreResult<()> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        if let Some(Entry {
            value: Value::List(list),
            ..
        }) = map.get_mut(key)
        {
            list.truncate(len);
        }
        Ok(())
    }

    fn list_range(&self, key: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let mut map = self.stripe(key);
        Self::purge_expired(&mut map, key, now);
        Ok(match map.get(key) {
            Some(Entry {
                value: Value::List(list),
                ..
            }) => list.iter().cloned().collect(),
            _ => Vec::new(),
        })
    }

    fn remove(&self, keys: &[&str]) -> StoreResult<()> {
        for key in keys {
            let mut map = self.stripe(key);
            map.remove(*key);
        }
        Ok(())
    }

    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let now = self.clock.now();
        let mut keys = Vec::new();
        for stripe in &self.stripes {
            let map = stripe.lock().expect("store stripe poisoned");
            for (key, entry) in map.iter() {
                if entry.expires_at > now && key.starts_with(prefix) {
                    keys.push(key.clone());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::ManualClock;
    use chrono::TimeZone;

    fn store_with_clock() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap(),
        ));
        (MemoryStore::new(clock.clone()), clock)
    }

    #[test]
    fn test_expired_entries_are_invisible() {
        let (store, clock) = store_with_clock();
        store.put("k", "v", Duration::from_secs(60)).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v"));

        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(store.get("k").unwrap(), None);
    }

    #[test]
    fn test_writes_reset_ttl() {
        let (store, clock) = store_with_clock();
        store.incr_by("c", 1, Duration::from_secs(60)).unwrap();
        clock.advance(chrono::Duration::seconds(50));
        store.incr_by("c", 1, Duration::from_secs(60)).unwrap();
        clock.advance(chrono::Duration::seconds(50));
        // Still alive: the second write refreshed the TTL
        assert_eq!(store.get("c").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn test_counter_restarts_after_expiry() {
        let (store, clock) = store_with_clock();
        store.incr_by("c", 5, Duration::from_secs(60)).unwrap();
        clock.advance(chrono::Duration::seconds(61));
        assert_eq!(store.incr_by("c", 1, Duration::from_secs(60)).unwrap(), 1);
    }

    #[test]
    fn test_put_if_absent_semantics() {
        let (store, _) = store_with_clock();
        assert!(store
            .put_if_absent("first_ts", "100.0", Duration::from_secs(60))
            .unwrap());
        assert!(!store
            .put_if_absent("first_ts", "200.0", Duration::from_secs(60))
            .unwrap());
        assert_eq!(store.get("first_ts").unwrap().as_deref(), Some("100.0"));
    }

    #[test]
    fn test_seq_allows_duplicate_members() {
        let (store, _) = store_with_clock();
        let ttl = Duration::from_secs(60);
        store.seq_add("z", 1.0, "500", ttl).unwrap();
        store.seq_add("z", 2.0, "500", ttl).unwrap();
        assert_eq!(store.seq_count("z", 0.0, 10.0).unwrap(), 2);
    }

    #[test]
    fn test_seq_range_and_remove_below() {
        let (store, _) = store_with_clock();
        let ttl = Duration::from_secs(60);
        for (score, member) in [(1.0, "a"), (2.0, "b"), (3.0, "c")] {
            store.seq_add("z", score, member, ttl).unwrap();
        }
        assert_eq!(store.seq_range("z", 2.0, 3.0).unwrap(), vec!["b", "c"]);
        assert_eq!(store.seq_remove_below("z", 2.0).unwrap(), 1);
        assert_eq!(store.seq_count("z", 0.0, 10.0).unwrap(), 2);
    }

    #[test]
    fn test_list_is_lifo_and_bounded() {
        let (store, _) = store_with_clock();
        let ttl = Duration::from_secs(60);
        for i in 0..5 {
            store.list_push("h", &i.to_string(), ttl).unwrap();
        }
        store.list_trim("h", 3).unwrap();
        assert_eq!(store.list_range("h").unwrap(), vec!["4", "3", "2"]);
    }

    #[test]
    fn test_scan_prefix_skips_expired() {
        let (store, clock) = store_with_clock();
        store
            .put("drift:baseline:amount", "{}", Duration::from_secs(10))
            .unwrap();
        store
            .put("drift:baseline:is_night", "{}", Duration::from_secs(100))
            .unwrap();
        clock.advance(chrono::Duration::seconds(50));
        assert_eq!(
            store.scan_prefix("drift:baseline:").unwrap(),
            vec!["drift:baseline:is_night"]
        );
    }
}
