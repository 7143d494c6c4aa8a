//! The usage store: sole owner of every in-memory usage record.
//!
//! Records live behind one lock each, so the click worker and a settings
//! editor can touch different devices without contending. The map itself is
//! only write-locked when a device is seen for the first time.

use crate::clock::{Clock, SystemClock};
use crate::ledger::codec;
use crate::ledger::files::RecordFiles;
use crate::ledger::record::UsageRecord;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};

/// Default amortized persistence interval, in clicks.
pub const DEFAULT_PERSIST_EVERY: u64 = 100;

/// Errors from reading or writing persisted records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Read { path: PathBuf, message: String },
    Write { path: PathBuf, message: String },
    UnknownDevice(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Read { path, message } => {
                write!(f, "Failed to read {}: {message}", path.display())
            }
            StoreError::Write { path, message } => {
                write!(f, "Failed to save {}: {message}", path.display())
            }
            StoreError::UnknownDevice(identity) => write!(f, "No record for device '{identity}'"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Where a record handed out by the store came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOrigin {
    /// Already in memory
    Cached,
    /// Read from its report file
    Loaded,
    /// No report existed; a fresh record was created
    Created,
    /// The report could not be read or parsed; replaced with a fresh record
    Recovered,
}

/// Result of [`UsageStore::get_or_create`].
#[derive(Debug, Clone)]
pub struct Lookup {
    /// Snapshot of the record after rollover
    pub record: UsageRecord,
    pub origin: RecordOrigin,
    /// Set when the initial save of a new record failed; the record is still
    /// tracked in memory.
    pub persist_error: Option<StoreError>,
}

/// Result of [`UsageStore::record_click`].
#[derive(Debug, Clone)]
pub struct ClickOutcome {
    /// Snapshot of the record after the click
    pub record: UsageRecord,
    pub origin: RecordOrigin,
    /// Whether this click triggered a successful periodic save
    pub persisted: bool,
    /// First save failure seen while handling the click
    pub persist_error: Option<StoreError>,
}

/// User edits to one record's metadata. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordEdit {
    pub device_identity: String,
    pub switch_brand: Option<String>,
    pub switch_model: Option<String>,
    pub image_path: Option<String>,
}

/// One in-memory record and the file it is saved to.
struct Slot {
    path: PathBuf,
    record: Mutex<UsageRecord>,
}

type SharedRecord = Arc<Slot>;

/// Outcome of reading one candidate report for an identity.
enum Load {
    Found(UsageRecord, RecordOrigin),
    /// The report belongs to the named identity
    Foreign(String),
}

/// Mapping from device identity to its usage record.
pub struct UsageStore {
    files: RecordFiles,
    clock: Arc<dyn Clock>,
    persist_every: u64,
    records: RwLock<HashMap<String, SharedRecord>>,
}

impl UsageStore {
    /// Create a store persisting into `dir` using the system clock.
    pub fn new(dir: impl Into<PathBuf>, persist_every: u64) -> Self {
        Self::with_clock(dir, persist_every, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock.
    ///
    /// A `persist_every` of zero disables periodic saves.
    pub fn with_clock(dir: impl Into<PathBuf>, persist_every: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            files: RecordFiles::new(dir),
            clock,
            persist_every,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        self.files.dir()
    }

    /// Path of the report file for `identity`.
    pub fn report_path(&self, identity: &str) -> PathBuf {
        match self.shared(identity) {
            Some(shared) => shared.path.clone(),
            None => self.files.path_for(identity),
        }
    }

    /// Whether `identity` is in memory or has a report of its own on disk.
    pub fn is_known(&self, identity: &str) -> bool {
        if self.shared(identity).is_some() {
            return true;
        }
        [
            self.files.path_for(identity),
            self.files.alternate_path_for(identity),
        ]
        .iter()
        .any(|path| match self.files.read_at(path) {
            Ok(Some(text)) => {
                let stored = codec::decode(&text, self.clock.today()).device_identity;
                stored.is_empty() || stored == identity
            }
            _ => false,
        })
    }

    /// Return the record for `identity`, loading or creating it if needed.
    ///
    /// New records are saved right away. Day rollover is applied in every
    /// case before the snapshot is taken.
    pub fn get_or_create(&self, identity: &str) -> Lookup {
        let (shared, origin, persist_error) = self.entry(identity);
        let mut record = lock(&shared);
        record.roll_over(self.clock.today());
        Lookup {
            record: record.clone(),
            origin,
            persist_error,
        }
    }

    /// Count one primary-button click for `identity`.
    ///
    /// Every `persist_every`-th total click saves the record.
    pub fn record_click(&self, identity: &str) -> ClickOutcome {
        let (shared, origin, mut persist_error) = self.entry(identity);
        let mut record = lock(&shared);
        record.count_click(self.clock.today());

        let mut persisted = false;
        if self.persist_every > 0 && record.total_clicks % self.persist_every == 0 {
            match self.write_record(&shared.path, &record) {
                Ok(()) => {
                    debug!(
                        "Saved '{}' at {} clicks",
                        record.device_identity, record.total_clicks
                    );
                    persisted = true;
                }
                Err(e) => {
                    warn!("{e}");
                    persist_error.get_or_insert(e);
                }
            }
        }

        ClickOutcome {
            record: record.clone(),
            origin,
            persisted,
            persist_error,
        }
    }

    /// Save the in-memory record for `identity`.
    ///
    /// A failed save leaves the in-memory record untouched, so the next save
    /// retries with the same data.
    pub fn persist(&self, identity: &str) -> Result<(), StoreError> {
        let shared = self
            .shared(identity)
            .ok_or_else(|| StoreError::UnknownDevice(identity.to_string()))?;
        let record = lock(&shared);
        self.write_record(&shared.path, &record)
    }

    /// Save every known record. Returns the failures.
    pub fn persist_all(&self) -> Vec<(String, StoreError)> {
        let mut failures = Vec::new();
        for identity in self.identities() {
            if let Err(e) = self.persist(&identity) {
                warn!("{e}");
                failures.push((identity, e));
            }
        }
        failures
    }

    /// Zero the counters of `identity` and restart its creation time.
    ///
    /// The record is not saved; call [`persist`](Self::persist) afterwards.
    pub fn reset(&self, identity: &str) -> Result<UsageRecord, StoreError> {
        let shared = self
            .shared(identity)
            .ok_or_else(|| StoreError::UnknownDevice(identity.to_string()))?;
        let mut record = lock(&shared);
        record.reset(self.clock.now());
        info!("Reset counters for '{identity}'");
        Ok(record.clone())
    }

    /// Apply metadata edits and save each edited record.
    ///
    /// Edits for devices the store does not hold are reported as
    /// [`StoreError::UnknownDevice`].
    pub fn commit(&self, edits: &[RecordEdit]) -> Vec<(String, StoreError)> {
        let mut failures = Vec::new();
        for edit in edits {
            let identity = &edit.device_identity;
            let Some(shared) = self.shared(identity) else {
                failures.push((identity.clone(), StoreError::UnknownDevice(identity.clone())));
                continue;
            };

            let mut record = lock(&shared);
            if let Some(brand) = &edit.switch_brand {
                record.switch_brand = brand.clone();
            }
            if let Some(model) = &edit.switch_model {
                record.switch_model = model.clone();
            }
            if let Some(image) = &edit.image_path {
                record.image_path = image.clone();
            }
            if let Err(e) = self.write_record(&shared.path, &record) {
                warn!("{e}");
                failures.push((identity.clone(), e));
            }
        }
        failures
    }

    /// Snapshot of one record.
    pub fn snapshot(&self, identity: &str) -> Option<UsageRecord> {
        let shared = self.shared(identity)?;
        let record = lock(&shared);
        Some(record.clone())
    }

    /// Snapshots of every record, sorted by identity.
    pub fn snapshot_all(&self) -> Vec<UsageRecord> {
        let mut all: Vec<UsageRecord> = self
            .identities()
            .iter()
            .filter_map(|identity| self.snapshot(identity))
            .collect();
        all.sort_by(|a, b| a.device_identity.cmp(&b.device_identity));
        all
    }

    /// Identities currently held in memory.
    pub fn identities(&self) -> Vec<String> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.keys().cloned().collect()
    }

    /// Every report in the data directory, decoded and rolled over to today.
    ///
    /// Reports with no recognizable field are skipped. Nothing is loaded
    /// into the store.
    pub fn stored_records(&self) -> Result<Vec<UsageRecord>, StoreError> {
        let today = self.clock.today();
        let mut records: Vec<UsageRecord> = self
            .files
            .read_all()?
            .into_iter()
            .filter(|(path, text)| {
                let readable = codec::recognized_fields(text) > 0;
                if !readable {
                    debug!("Skipping unreadable report {}", path.display());
                }
                readable
            })
            .map(|(_, text)| {
                let mut record = codec::decode(&text, today);
                record.normalize();
                record.roll_over(today);
                record
            })
            .collect();
        records.sort_by(|a, b| a.device_identity.cmp(&b.device_identity));
        Ok(records)
    }

    fn shared(&self, identity: &str) -> Option<SharedRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(identity).cloned()
    }

    fn entry(&self, identity: &str) -> (SharedRecord, RecordOrigin, Option<StoreError>) {
        if let Some(shared) = self.shared(identity) {
            return (shared, RecordOrigin::Cached, None);
        }

        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if let Some(shared) = records.get(identity) {
            return (shared.clone(), RecordOrigin::Cached, None);
        }

        let (record, origin, path) = self.load_or_create(identity);
        let persist_error = match origin {
            RecordOrigin::Created | RecordOrigin::Recovered => {
                self.write_record(&path, &record).err()
            }
            _ => None,
        };
        if let Some(e) = &persist_error {
            warn!("{e}");
        }

        let shared = Arc::new(Slot {
            path,
            record: Mutex::new(record),
        });
        records.insert(identity.to_string(), shared.clone());
        (shared, origin, persist_error)
    }

    /// Load `identity` from its usual report, or from its alternate report
    /// when the usual one belongs to another device. Another device's report
    /// is never overwritten.
    fn load_or_create(&self, identity: &str) -> (UsageRecord, RecordOrigin, PathBuf) {
        let usual = self.files.path_for(identity);
        let owner = match self.load_at(identity, &usual) {
            Load::Found(record, origin) => return (record, origin, usual),
            Load::Foreign(owner) => owner,
        };

        let alternate = self.files.alternate_path_for(identity);
        warn!(
            "Report {} belongs to '{owner}'; keeping '{identity}' in {}",
            usual.display(),
            alternate.display()
        );
        match self.load_at(identity, &alternate) {
            Load::Found(record, origin) => (record, origin, alternate),
            Load::Foreign(other) => {
                warn!(
                    "Report {} also belongs to '{other}'; starting a fresh record",
                    alternate.display()
                );
                (
                    UsageRecord::new(identity, self.clock.now()),
                    RecordOrigin::Recovered,
                    alternate,
                )
            }
        }
    }

    fn load_at(&self, identity: &str, path: &Path) -> Load {
        let fresh = || UsageRecord::new(identity, self.clock.now());

        let text = match self.files.read_at(path) {
            Ok(Some(text)) => text,
            Ok(None) => {
                info!("New device '{identity}', starting a fresh record");
                return Load::Found(fresh(), RecordOrigin::Created);
            }
            Err(e) => {
                warn!("{e}; starting a fresh record for '{identity}'");
                return Load::Found(fresh(), RecordOrigin::Recovered);
            }
        };

        if codec::recognized_fields(&text) == 0 {
            warn!("Report for '{identity}' is unreadable; starting a fresh record");
            return Load::Found(fresh(), RecordOrigin::Recovered);
        }

        let mut record = codec::decode(&text, self.clock.today());
        if !record.device_identity.is_empty() && record.device_identity != identity {
            return Load::Foreign(record.device_identity);
        }

        record.device_identity = identity.to_string();
        record.normalize();
        info!(
            "Loaded '{identity}': {} total, {} today",
            record.total_clicks, record.daily_clicks
        );
        Load::Found(record, RecordOrigin::Loaded)
    }

    fn write_record(&self, path: &Path, record: &UsageRecord) -> Result<(), StoreError> {
        let text = codec::encode(record, self.clock.now());
        self.files.write_at(path, &text)
    }
}

fn lock(shared: &SharedRecord) -> MutexGuard<'_, UsageRecord> {
    shared.record.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    struct FixedClock(NaiveDateTime);

    impl Clock for FixedClock {
        fn now(&self) -> NaiveDateTime {
            self.0
        }
    }

    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(
            NaiveDate::from_ymd_opt(2025, 6, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        ))
    }

    #[test]
    fn test_new_device_is_created_and_saved() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::with_clock(dir.path(), 100, clock());

        let lookup = store.get_or_create("Acme - Mouse");
        assert_eq!(lookup.origin, RecordOrigin::Created);
        assert!(lookup.persist_error.is_none());
        assert!(store.report_path("Acme - Mouse").is_file());

        let again = store.get_or_create("Acme - Mouse");
        assert_eq!(again.origin, RecordOrigin::Cached);
    }

    #[test]
    fn test_unknown_device_operations_fail() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::with_clock(dir.path(), 100, clock());
        assert_eq!(
            store.persist("ghost"),
            Err(StoreError::UnknownDevice("ghost".to_string()))
        );
        assert!(store.reset("ghost").is_err());
    }

    #[test]
    fn test_zero_interval_never_saves_periodically() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::with_clock(dir.path(), 0, clock());
        for _ in 0..10 {
            assert!(!store.record_click("Acme - Mouse").persisted);
        }
    }

    #[test]
    fn test_garbage_file_is_recovered() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::with_clock(dir.path(), 100, clock());
        std::fs::write(store.report_path("Acme - Mouse"), "garbage").unwrap();

        let lookup = store.get_or_create("Acme - Mouse");
        assert_eq!(lookup.origin, RecordOrigin::Recovered);
        assert_eq!(lookup.record.total_clicks, 0);
    }

    #[test]
    fn test_commit_reports_unknown_devices() {
        let dir = tempfile::tempdir().unwrap();
        let store = UsageStore::with_clock(dir.path(), 100, clock());
        store.get_or_create("Acme - Mouse");

        let failures = store.commit(&[
            RecordEdit {
                device_identity: "Acme - Mouse".to_string(),
                switch_brand: Some("Omron".to_string()),
                ..RecordEdit::default()
            },
            RecordEdit {
                device_identity: "ghost".to_string(),
                ..RecordEdit::default()
            },
        ]);

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "ghost");
        assert_eq!(store.snapshot("Acme - Mouse").unwrap().switch_brand, "Omron");
    }
}
