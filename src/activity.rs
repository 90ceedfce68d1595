//! Last-activity bookkeeping and the idle rule derived from it.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::Duration,
};

use time::OffsetDateTime;

use crate::ConnectionId;

/// Wall-clock source in unix milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default, Clone)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn starting_at(ms: i64) -> Self {
        Self(Arc::new(AtomicI64::new(ms)))
    }

    pub fn advance(&self, by: Duration) {
        self.0.fetch_add(by.as_millis() as i64, Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.0.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
pub struct ActivityTracker {
    last_active: HashMap<ConnectionId, i64>,
}

impl ActivityTracker {
    pub fn touch(&mut self, conn: &str, now_ms: i64) {
        self.last_active.insert(conn.to_owned(), now_ms);
    }

    pub fn last_active(&self, conn: &str) -> Option<i64> {
        self.last_active.get(conn).copied()
    }

    /// Strictly-greater comparison; a connection with no record counts as
    /// inactive since the epoch.
    pub fn is_idle(&self, conn: &str, now_ms: i64, threshold_ms: i64) -> bool {
        let last = self.last_active(conn).unwrap_or(0);
        now_ms - last > threshold_ms
    }

    pub fn forget(&mut self, conn: &str) {
        self.last_active.remove(conn);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: i64 = 60_000;

    #[test]
    fn idle_only_after_threshold_is_exceeded() {
        let mut tracker = ActivityTracker::default();
        tracker.touch("a", 1_000);

        assert!(!tracker.is_idle("a", 1_000, MINUTE));
        assert!(!tracker.is_idle("a", 1_000 + MINUTE, MINUTE));
        assert!(tracker.is_idle("a", 1_001 + MINUTE, MINUTE));
    }

    #[test]
    fn unknown_connection_is_idle() {
        let tracker = ActivityTracker::default();
        assert!(tracker.is_idle("ghost", 10 * MINUTE, MINUTE));
    }

    #[test]
    fn forget_drops_the_record() {
        let mut tracker = ActivityTracker::default();
        tracker.touch("a", 5);
        tracker.forget("a");
        assert_eq!(tracker.last_active("a"), None);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::starting_at(100);
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.now_ms(), 2_100);
        clock.set(7);
        assert_eq!(clock.now_ms(), 7);
    }
}
