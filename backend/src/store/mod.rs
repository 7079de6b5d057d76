//! Rolling state store
//!
//! Per-key, time-bounded aggregates backing velocity counters, trust state,
//! graph edges, the cumulative risk buffer and drift windows. The contract
//! is four operation families, each atomic per key:
//!
//! - plain values / counters (`put`, `get`, `put_if_absent`, `incr_by`,
//!   `incr_by_float`)
//! - sets of strings (`set_add`, `set_contains`, `set_members`, `set_card`)
//! - sorted sequences of (score, member) (`seq_add`, `seq_count`,
//!   `seq_range`, `seq_remove_below`)
//! - bounded LIFO lists (`list_push`, `list_trim`, `list_range`)
//!
//! Every write attaches an absolute TTL; later writes reset it. Readers of
//! this store must treat any [`StoreError`] as "state unknown" and fall back
//! to their documented defaults: a store outage degrades scoring quality,
//! it never fails a scoring request.

mod memory;

pub use memory::MemoryStore;

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by rolling-store operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("rolling store unavailable")]
    Unavailable,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Abstract rolling-state store (see module docs for the contract).
pub trait RollingStore: Send + Sync + std::fmt::Debug {
    // ---- plain values / counters ----

    /// Set a value, resetting its TTL.
    fn put(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Read a value, `None` if absent or expired.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Set only when the key is absent. Returns whether the write happened.
    /// The TTL is refreshed either way.
    fn put_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Add to an integer counter (created at 0), returning the new value.
    fn incr_by(&self, key: &str, delta: i64, ttl: Duration) -> StoreResult<i64>;

    /// Add to a float counter (created at 0.0), returning the new value.
    fn incr_by_float(&self, key: &str, delta: f64, ttl: Duration) -> StoreResult<f64>;

    // ---- sets of strings ----

    fn set_add(&self, key: &str, member: &str, ttl: Duration) -> StoreResult<()>;

    fn set_contains(&self, key: &str, member: &str) -> StoreResult<bool>;

    fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    fn set_card(&self, key: &str) -> StoreResult<usize>;

    /// Refresh a set's TTL without writing a member.
    fn set_touch(&self, key: &str, ttl: Duration) -> StoreResult<()>;

    // ---- sorted sequences of (score, member) ----

    /// Append an entry. Duplicate members are retained.
    fn seq_add(&self, key: &str, score: f64, member: &str, ttl: Duration) -> StoreResult<()>;

    /// Count entries with `lo <= score <= hi`.
    fn seq_count(&self, key: &str, lo: f64, hi: f64) -> StoreResult<usize>;

    /// Members with `lo <= score <= hi`, in score order.
    fn seq_range(&self, key: &str, lo: f64, hi: f64) -> StoreResult<Vec<String>>;

    /// Drop entries with `score < floor`, returning how many were removed.
    fn seq_remove_below(&self, key: &str, floor: f64) -> StoreResult<usize>;

    // ---- bounded LIFO lists ----

    /// Push to the head of a list.
    fn list_push(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Keep only the first `len` entries.
    fn list_trim(&self, key: &str, len: usize) -> StoreResult<()>;

    /// All entries, head (newest) first.
    fn list_range(&self, key: &str) -> StoreResult<Vec<String>>;

    // ---- maintenance ----

    /// Remove keys outright.
    fn remove(&self, keys: &[&str]) -> StoreResult<()>;

    /// Live keys starting with `prefix` (used to discover drift baselines).
    fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// A store whose every operation fails.
///
/// Stands in for an unreachable backing store so the degraded-mode defaults
/// of each engine can be exercised.
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineStore;

impl RollingStore for OfflineStore {
    fn put(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    fn get(&self, _: &str) -> StoreResult<Option<String>> {
        Err(StoreError::Unavailable)
    }

    fn put_if_absent(&self, _: &str, _: &str, _: Duration) -> StoreResult<bool> {
        Err(StoreError::Unavailable)
    }

    fn incr_by(&self, _: &str, _: i64, _: Duration) -> StoreResult<i64> {
        Err(StoreError::Unavailable)
    }

    fn incr_by_float(&self, _: &str, _: f64, _: Duration) -> StoreResult<f64> {
        Err(StoreError::Unavailable)
    }

    fn set_add(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    fn set_contains(&self, _: &str, _: &str) -> StoreResult<bool> {
        Err(StoreError::Unavailable)
    }

    fn set_members(&self, _: &str) -> StoreResult<Vec<String>> {
        Err(StoreError::Unavailable)
    }

    fn set_card(&self, _: &str) -> StoreResult<usize> {
        Err(StoreError::Unavailable)
    }

    fn set_touch(&self, _: &str, _: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    fn seq_add(&self, _: &str, _: f64, _: &str, _: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    fn seq_count(&self, _: &str, _: f64, _: f64) -> StoreResult<usize> {
        Err(StoreError::Unavailable)
    }

    fn seq_range(&self, _: &str, _: f64, _: f64) -> StoreResult<Vec<String>> {
        Err(StoreError::Unavailable)
    }

    fn seq_remove_below(&self, _: &str, _: f64) -> StoreResult<usize> {
        Err(StoreError::Unavailable)
    }

    fn list_push(&self, _: &str, _: &str, _: Duration) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    fn list_trim(&self, _: &str, _: usize) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    fn list_range(&self, _: &str) -> StoreResult<Vec<String>> {
        Err(StoreError::Unavailable)
    }

    fn remove(&self, _: &[&str]) -> StoreResult<()> {
        Err(StoreError::Unavailable)
    }

    fn scan_prefix(&self, _: &str) -> StoreResult<Vec<String>> {
        Err(StoreError::Unavailable)
    }
}
