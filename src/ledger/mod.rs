//! Per-device usage ledger.
//!
//! This module contains:
//! - The usage record and its day-rollover rules
//! - The report codec used for persistence
//! - The on-disk record directory
//! - The store that owns all records and decides when to save them

pub mod codec;
pub mod files;
pub mod record;
pub mod store;

// Re-export commonly used types
pub use files::{
    alternate_file_name_for, file_name_for, sanitize_file_stem, RecordFiles, RECORD_EXTENSION,
};
pub use record::{UsageRecord, UNSET};
pub use store::{
    ClickOutcome, Lookup, RecordEdit, RecordOrigin, StoreError, UsageStore, DEFAULT_PERSIST_EVERY,
};
