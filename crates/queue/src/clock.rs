//! Wall-clock abstraction for due-time computation.
//!
//! The retry schedule is keyed by absolute unix timestamps, so the scheduler
//! reads wall-clock time through [`Clock`]. Production code uses
//! [`SystemClock`]; tests drive a [`ManualClock`] to make entries due without
//! waiting.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Source of wall-clock time.
pub trait Clock: Send + Sync + Debug {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Current wall-clock time as whole unix seconds.
    fn unix_timestamp(&self) -> i64 {
        self.now().timestamp()
    }
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock with one-second resolution.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    unix_secs: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at the current system time.
    #[must_use]
    pub fn new() -> Self {
        Self::at(Utc::now().timestamp())
    }

    /// Create a clock frozen at the given unix timestamp.
    #[must_use]
    pub fn at(unix_secs: i64) -> Self {
        Self {
            unix_secs: Arc::new(AtomicI64::new(unix_secs)),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let secs = i64::try_from(by.as_secs()).unwrap_or(i64::MAX);
        self.unix_secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Jump to an absolute unix timestamp.
    pub fn set(&self, unix_secs: i64) {
        self.unix_secs.store(unix_secs, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let secs = self.unix_secs.load(Ordering::SeqCst);
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    fn unix_timestamp(&self) -> i64 {
        self.unix_secs.load(Ordering::SeqCst)
    }
}
