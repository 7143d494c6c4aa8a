//! Wall-clock access for the usage ledger.
//!
//! Day rollover and creation stamps are expressed in local time, truncated to
//! whole seconds so that a persisted record reads back exactly.

use chrono::{Local, NaiveDate, NaiveDateTime, Timelike};

/// Source of the current local time.
pub trait Clock: Send + Sync {
    /// Current local time with sub-second precision dropped.
    fn now(&self) -> NaiveDateTime;

    /// Current local calendar day.
    fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

/// The system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_has_whole_seconds() {
        let now = SystemClock.now();
        assert_eq!(now.nanosecond(), 0);
        assert_eq!(SystemClock.today(), SystemClock.now().date());
    }
}
