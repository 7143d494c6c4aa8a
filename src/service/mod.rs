//! The tracking service: wires device identity, usage store and input hook
//! together.
//!
//! ```text
//!  OS hook thread            click worker                 UsageStore
//! ┌──────────────┐  Click  ┌────────────────┐ record_click ┌──────────┐
//! │ Interceptor  │────────▶│ IdentityCache  │─────────────▶│ records  │──▶ reports
//! └──────────────┘ bounded └────────────────┘              └──────────┘
//!                  channel          │ notices                    ▲
//!                                   ▼                            │ commit/reset
//!                               UI / CLI ────────────────────────┘
//! ```
//!
//! The hook callback only enqueues; identity lookups and file writes happen
//! on the worker thread so a slow disk never stalls input delivery.

pub mod notice;
pub mod stats;

pub use notice::Notice;
pub use stats::{SessionSnapshot, SessionStats};

use crate::config::Config;
use crate::device::{DeviceIdentityResolver, IdentityCache, UNKNOWN_DEVICE};
use crate::interceptor::{InputInterceptor, PrimaryButtonCallback};
use crate::ledger::{RecordEdit, StoreError, UsageRecord, UsageStore};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Capacity of the notice channel; older notices are never overwritten,
/// new ones are dropped once it is full.
const NOTICE_CAPACITY: usize = 256;

/// Lifecycle of the tracking service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ServiceState::Idle => "idle",
            ServiceState::Starting => "starting",
            ServiceState::Running => "running",
            ServiceState::Stopping => "stopping",
            ServiceState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Errors from driving the service lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// `start` was called outside the idle state
    InvalidState(ServiceState),
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceError::InvalidState(state) => {
                write!(f, "Service cannot start while {state}")
            }
        }
    }
}

impl std::error::Error for ServiceError {}

/// Tuning knobs for the service.
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// How long a resolved device identity is trusted
    pub identity_ttl: Duration,
    /// Capacity of the click queue between hook and worker
    pub queue_capacity: usize,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            identity_ttl: Duration::from_secs(5),
            queue_capacity: 10_000,
        }
    }
}

impl From<&Config> for ServiceOptions {
    fn from(config: &Config) -> Self {
        Self {
            identity_ttl: Duration::from_secs(config.identity_refresh_secs),
            queue_capacity: config.queue_capacity,
        }
    }
}

enum WorkerMessage {
    Click,
    Stop,
}

/// Counts primary-button clicks for the attached pointing device.
pub struct TrackingService<I: InputInterceptor> {
    state: ServiceState,
    store: Arc<UsageStore>,
    identity: Option<IdentityCache>,
    current_identity: Arc<Mutex<Option<String>>>,
    interceptor: I,
    counting: bool,
    options: ServiceOptions,
    worker_tx: Option<Sender<WorkerMessage>>,
    worker: Option<JoinHandle<()>>,
    notice_tx: Sender<Notice>,
    notice_rx: Receiver<Notice>,
    stats: Arc<SessionStats>,
}

impl<I: InputInterceptor> TrackingService<I> {
    pub fn new(
        store: Arc<UsageStore>,
        resolver: DeviceIdentityResolver,
        interceptor: I,
        options: ServiceOptions,
    ) -> Self {
        let (notice_tx, notice_rx) = bounded(NOTICE_CAPACITY);
        Self {
            state: ServiceState::Idle,
            store,
            identity: Some(IdentityCache::new(resolver, options.identity_ttl)),
            current_identity: Arc::new(Mutex::new(None)),
            interceptor,
            counting: false,
            options,
            worker_tx: None,
            worker: None,
            notice_tx,
            notice_rx,
            stats: Arc::new(SessionStats::new()),
        }
    }

    /// Resolve the device, load its record and install the hook.
    ///
    /// A hook that cannot be installed is not an error: the service still
    /// reaches `Running`, with counting disabled and a
    /// [`Notice::CountingDisabled`] queued.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.state != ServiceState::Idle {
            return Err(ServiceError::InvalidState(self.state));
        }
        let Some(mut cache) = self.identity.take() else {
            return Err(ServiceError::InvalidState(self.state));
        };
        self.state = ServiceState::Starting;

        let resolution = cache.refresh();
        if let Some(e) = &resolution.failure {
            self.notify(Notice::DeviceQueryFailed(e.to_string()));
        }
        self.set_current_identity(&resolution.identity);

        let lookup = self.store.get_or_create(&resolution.identity);
        if let Some(e) = lookup.persist_error {
            self.report_persist_failure(&resolution.identity, &e);
        }
        info!(
            "Tracking '{}': {} total clicks, {} today",
            lookup.record.device_identity, lookup.record.total_clicks, lookup.record.daily_clicks
        );

        let (tx, rx) = bounded(self.options.queue_capacity.max(1));
        let worker = ClickWorker {
            cache,
            store: self.store.clone(),
            notices: self.notice_tx.clone(),
            stats: self.stats.clone(),
            current_identity: self.current_identity.clone(),
            query_failing: resolution.failure.is_some(),
        };
        let handle = match thread::Builder::new()
            .name("click-worker".to_string())
            .spawn(move || worker.run(rx))
        {
            Ok(handle) => handle,
            Err(e) => {
                self.disable_counting(format!("could not start click worker: {e}"));
                self.state = ServiceState::Running;
                return Ok(());
            }
        };

        let sink = tx.clone();
        let stats = self.stats.clone();
        let on_primary_down: PrimaryButtonCallback = Arc::new(move || {
            if sink.try_send(WorkerMessage::Click).is_err() {
                stats.record_dropped_click();
            }
        });

        match self.interceptor.install(on_primary_down) {
            Ok(()) => {
                info!("Mouse hook installed; counting clicks");
                self.counting = true;
                self.worker_tx = Some(tx);
                self.worker = Some(handle);
            }
            Err(e) => {
                let _ = tx.send(WorkerMessage::Stop);
                let _ = handle.join();
                self.disable_counting(e.to_string());
            }
        }

        self.state = ServiceState::Running;
        Ok(())
    }

    /// Flush every record and remove the hook.
    ///
    /// Clicks already queued are counted before the final save. Calling this
    /// more than once is harmless.
    pub fn stop(&mut self) {
        match self.state {
            ServiceState::Running => {}
            ServiceState::Idle => {
                self.state = ServiceState::Stopped;
                return;
            }
            _ => return,
        }
        self.state = ServiceState::Stopping;
        info!("Stopping click tracking");

        if let Some(tx) = self.worker_tx.take() {
            let _ = tx.send(WorkerMessage::Stop);
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("Click worker panicked");
            }
        }

        let known = self.store.identities().len() as u64;
        let failures = self.store.persist_all();
        self.stats
            .record_persists(known.saturating_sub(failures.len() as u64));
        for (identity, e) in &failures {
            self.report_persist_failure(identity, e);
        }

        self.interceptor.uninstall();
        self.counting = false;
        self.state = ServiceState::Stopped;
        info!("Click tracking stopped");
    }

    pub fn state(&self) -> ServiceState {
        self.state
    }

    /// Whether clicks are currently being counted.
    pub fn is_counting(&self) -> bool {
        self.counting
    }

    /// Identity the latest click was attributed to.
    pub fn current_identity(&self) -> Option<String> {
        self.current_identity
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Pending user notifications.
    pub fn notices(&self) -> &Receiver<Notice> {
        &self.notice_rx
    }

    /// Queue a notification for the user. Never blocks.
    pub fn notify(&self, notice: Notice) {
        if self.notice_tx.try_send(notice).is_err() {
            debug!("Notice queue full; dropping notice");
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn store(&self) -> &Arc<UsageStore> {
        &self.store
    }

    /// Snapshots of every record, for the settings view.
    pub fn records(&self) -> Vec<UsageRecord> {
        self.store.snapshot_all()
    }

    /// Apply settings edits and save the edited records.
    pub fn commit_settings(&self, edits: &[RecordEdit]) -> Vec<(String, StoreError)> {
        let failures = self.store.commit(edits);
        self.stats
            .record_persists(edits.len().saturating_sub(failures.len()) as u64);
        for (identity, e) in &failures {
            if !matches!(e, StoreError::UnknownDevice(_)) {
                self.report_persist_failure(identity, e);
            }
        }
        failures
    }

    /// Reset a device's counters and save it.
    ///
    /// The in-memory reset stands even if the save fails.
    pub fn reset_device(&self, identity: &str) -> Result<UsageRecord, StoreError> {
        let record = self.store.reset(identity)?;
        match self.store.persist(identity) {
            Ok(()) => {
                self.stats.record_persists(1);
                Ok(record)
            }
            Err(e) => {
                self.report_persist_failure(identity, &e);
                Err(e)
            }
        }
    }

    fn set_current_identity(&self, identity: &str) {
        *self
            .current_identity
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(identity.to_string());
    }

    fn disable_counting(&mut self, reason: String) {
        error!("Clicks will not be counted until restart: {reason}");
        self.counting = false;
        self.notify(Notice::CountingDisabled(reason));
    }

    fn report_persist_failure(&self, identity: &str, e: &StoreError) {
        self.stats.record_persist_failure();
        self.notify(Notice::PersistFailed {
            device: identity.to_string(),
            message: e.to_string(),
        });
    }
}

impl<I: InputInterceptor> Drop for TrackingService<I> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Owns the identity cache and turns queued clicks into store updates.
struct ClickWorker {
    cache: IdentityCache,
    store: Arc<UsageStore>,
    notices: Sender<Notice>,
    stats: Arc<SessionStats>,
    current_identity: Arc<Mutex<Option<String>>>,
    query_failing: bool,
}

impl ClickWorker {
    fn run(mut self, rx: Receiver<WorkerMessage>) {
        debug!("Click worker started");
        for message in rx.iter() {
            match message {
                WorkerMessage::Click => self.handle_click(),
                WorkerMessage::Stop => break,
            }
        }
        debug!("Click worker stopped");
    }

    fn handle_click(&mut self) {
        let resolution = self.cache.current();

        // Cached answers carry no failure, so only a real device clears the flag
        match &resolution.failure {
            Some(e) if !self.query_failing => {
                self.notify(Notice::DeviceQueryFailed(e.to_string()));
                self.query_failing = true;
            }
            None if resolution.identity != UNKNOWN_DEVICE => self.query_failing = false,
            _ => {}
        }

        if resolution.changed {
            *self
                .current_identity
                .lock()
                .unwrap_or_else(|e| e.into_inner()) = Some(resolution.identity.clone());
            self.notify(Notice::DeviceChanged {
                device: resolution.identity.clone(),
            });
        }

        let outcome = self.store.record_click(&resolution.identity);
        self.stats.record_click();
        if outcome.persisted {
            self.stats.record_persists(1);
        }
        if let Some(e) = outcome.persist_error {
            warn!("{e}");
            self.stats.record_persist_failure();
            self.notify(Notice::PersistFailed {
                device: resolution.identity,
                message: e.to_string(),
            });
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.notices.try_send(notice);
    }
}
