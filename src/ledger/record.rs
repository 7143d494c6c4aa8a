//! The per-device usage record.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Placeholder for switch metadata the user has not filled in yet.
pub const UNSET: &str = "unset";

/// Click counters and metadata for one pointing device.
///
/// `daily_clicks <= total_clicks` holds for every record the ledger hands out:
/// both counters move together on a click and only the daily one is zeroed
/// on rollover.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UsageRecord {
    /// Identity of the device, e.g. `"Logitech - USB Receiver"`
    pub device_identity: String,
    /// Brand of the micro switch under the primary button
    pub switch_brand: String,
    /// Model of the micro switch under the primary button
    pub switch_model: String,
    /// Optional path to a picture of the switch; checked only when rendered
    pub image_path: String,
    /// Clicks counted on `last_click_date`
    pub daily_clicks: u64,
    /// Clicks counted since creation or the last reset
    pub total_clicks: u64,
    /// When the record was created or last reset
    pub created_at: Option<NaiveDateTime>,
    /// Day the daily counter belongs to
    pub last_click_date: NaiveDate,
}

impl UsageRecord {
    /// A fresh record with zeroed counters, created at `now`.
    pub fn new(device_identity: impl Into<String>, now: NaiveDateTime) -> Self {
        Self {
            device_identity: device_identity.into(),
            switch_brand: UNSET.to_string(),
            switch_model: UNSET.to_string(),
            image_path: String::new(),
            daily_clicks: 0,
            total_clicks: 0,
            created_at: Some(now),
            last_click_date: now.date(),
        }
    }

    /// Start a new day if `today` differs from the stored day.
    ///
    /// Returns `true` when the daily counter was zeroed. Calling it again
    /// with the same day is a no-op.
    pub fn roll_over(&mut self, today: NaiveDate) -> bool {
        let rolled = self.last_click_date != today;
        if rolled {
            self.daily_clicks = 0;
        }
        self.last_click_date = today;
        rolled
    }

    /// Count one primary-button click on `today`.
    pub fn count_click(&mut self, today: NaiveDate) {
        self.roll_over(today);
        self.daily_clicks = self.daily_clicks.saturating_add(1);
        self.total_clicks = self.total_clicks.saturating_add(1);
    }

    /// Zero both counters and restart the record at `now`.
    ///
    /// Switch metadata and the image path are kept.
    pub fn reset(&mut self, now: NaiveDateTime) {
        self.daily_clicks = 0;
        self.total_clicks = 0;
        self.created_at = Some(now);
        self.last_click_date = now.date();
    }

    /// Clamp the daily counter so it never exceeds the total.
    ///
    /// Only hand-edited files can break the relation.
    pub fn normalize(&mut self) {
        self.daily_clicks = self.daily_clicks.min(self.total_clicks);
    }
}
