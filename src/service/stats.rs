//! Session statistics for the tracking service.
//!
//! Counts what happened since the service started, so a user can see that
//! clicks are arriving and saves are succeeding.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    /// Clicks routed into the store
    clicks_counted: AtomicU64,
    /// Clicks lost because the click queue was full or closed
    clicks_dropped: AtomicU64,
    /// Successful record saves
    persists_succeeded: AtomicU64,
    /// Failed record saves
    persists_failed: AtomicU64,
    /// Session start time
    session_start: DateTime<Local>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            clicks_counted: AtomicU64::new(0),
            clicks_dropped: AtomicU64::new(0),
            persists_succeeded: AtomicU64::new(0),
            persists_failed: AtomicU64::new(0),
            session_start: Local::now(),
        }
    }

    pub fn record_click(&self) {
        self.clicks_counted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_click(&self) {
        self.clicks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persists(&self, count: u64) {
        self.persists_succeeded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_persist_failure(&self) {
        self.persists_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            clicks_counted: self.clicks_counted.load(Ordering::Relaxed),
            clicks_dropped: self.clicks_dropped.load(Ordering::Relaxed),
            persists_succeeded: self.persists_succeeded.load(Ordering::Relaxed),
            persists_failed: self.persists_failed.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Local::now() - self.session_start)
                .num_seconds()
                .max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Clicks counted: {}\n\
             - Clicks dropped: {}\n\
             - Records saved: {}\n\
             - Failed saves: {}\n\
             - Session duration: {} seconds",
            stats.clicks_counted,
            stats.clicks_dropped,
            stats.persists_succeeded,
            stats.persists_failed,
            stats.session_duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of session statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub clicks_counted: u64,
    pub clicks_dropped: u64,
    pub persists_succeeded: u64,
    pub persists_failed: u64,
    pub session_start: DateTime<Local>,
    pub session_duration_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let stats = SessionStats::new();
        stats.record_click();
        stats.record_click();
        stats.record_dropped_click();
        stats.record_persists(3);
        stats.record_persist_failure();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.clicks_counted, 2);
        assert_eq!(snapshot.clicks_dropped, 1);
        assert_eq!(snapshot.persists_succeeded, 3);
        assert_eq!(snapshot.persists_failed, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionStats::new().summary();
        assert!(summary.contains("Clicks counted: 0"));
        assert!(summary.contains("Failed saves"));
    }
}
