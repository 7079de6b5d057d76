//! Time authority for the pipeline
//!
//! Every engine that needs "now" receives a shared [`Clock`] instead of
//! calling the system clock directly. Production uses [`SystemClock`];
//! tests drive [`ManualClock`] to exercise decay, auto-refund windows and
//! retention behaviour deterministically.
//!
//! Temporal features are derived in the regional timezone (IST, UTC+5:30),
//! matching the market the pipeline serves.

use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Datelike, FixedOffset, TimeZone, Utc};

use crate::config::REGIONAL_OFFSET_MINUTES;

/// Source of wall-clock time.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current instant in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the OS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replay.
///
/// # Example
/// ```
/// use chrono::{Duration, TimeZone, Timelike, Utc};
/// use fraud_detection_core_rs::{Clock, ManualClock};
///
/// let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 14, 10, 0, 0).unwrap());
/// clock.advance(Duration::minutes(5));
/// assert_eq!(clock.now().minute(), 5);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now += delta;
    }

    /// Jump to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut now = self.now.lock().expect("clock lock poisoned");
        *now = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock poisoned")
    }
}

/// Regional timezone used for temporal features.
pub fn regional_offset() -> FixedOffset {
    FixedOffset::east_opt(REGIONAL_OFFSET_MINUTES * 60).expect("valid fixed offset")
}

/// Convert a UTC instant into the regional timezone.
pub fn to_regional(ts: DateTime<Utc>) -> DateTime<FixedOffset> {
    regional_offset().from_utc_datetime(&ts.naive_utc())
}

/// Night window: 22:00 through 05:59 regional time, inclusive.
pub fn is_night_hour(hour: u32) -> bool {
    hour >= 22 || hour <= 5
}

/// Business hours: 09:00 through 17:59 regional time.
pub fn is_business_hour(hour: u32) -> bool {
    (9..=17).contains(&hour)
}

/// Saturday or Sunday in the regional timezone.
pub fn is_weekend(ts: DateTime<FixedOffset>) -> bool {
    ts.weekday().num_days_from_monday() >= 5
}

/// Fractional days between two instants, clamped at zero.
pub fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let seconds = (later - earlier).num_milliseconds() as f64 / 1000.0;
    (seconds / 86_400.0).max(0.0)
}
