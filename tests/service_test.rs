//! Integration tests for the tracking service lifecycle

use mouse_click_counter::device::{DeviceDescriptor, DeviceQueryError, DeviceSource};
use mouse_click_counter::ledger::{codec, RecordEdit, UsageStore};
use mouse_click_counter::{
    DeviceIdentityResolver, InputInterceptor, InterceptorError, Notice, PrimaryButtonCallback,
    ServiceError, ServiceOptions, ServiceState, TrackingService, UNKNOWN_DEVICE,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const MOUSE: &str = "Logitech - G305";
const OTHER_MOUSE: &str = "Razer - Viper";

type Inventory = Arc<Mutex<Result<Vec<DeviceDescriptor>, DeviceQueryError>>>;

/// Device source whose answer the test controls.
struct FakeInventory(Inventory);

impl DeviceSource for FakeInventory {
    fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError> {
        self.0.lock().unwrap().clone()
    }
}

fn inventory(manufacturer: &str, name: &str) -> Inventory {
    Arc::new(Mutex::new(Ok(vec![device(manufacturer, name)])))
}

fn device(manufacturer: &str, name: &str) -> DeviceDescriptor {
    DeviceDescriptor::new(Some(manufacturer.to_string()), Some(name.to_string()))
}

/// Hook the test fires by hand.
#[derive(Default, Clone)]
struct ManualHook {
    callback: Arc<Mutex<Option<PrimaryButtonCallback>>>,
    fail_with: Option<InterceptorError>,
}

impl ManualHook {
    fn failing(error: InterceptorError) -> Self {
        Self {
            fail_with: Some(error),
            ..Self::default()
        }
    }

    fn click(&self, times: usize) {
        let callback = self.callback.lock().unwrap().clone().expect("hook not installed");
        for _ in 0..times {
            callback();
        }
    }
}

impl InputInterceptor for ManualHook {
    fn install(&mut self, on_primary_down: PrimaryButtonCallback) -> Result<(), InterceptorError> {
        if let Some(e) = &self.fail_with {
            return Err(e.clone());
        }
        let mut callback = self.callback.lock().unwrap();
        if callback.is_some() {
            return Err(InterceptorError::AlreadyInstalled);
        }
        *callback = Some(on_primary_down);
        Ok(())
    }

    fn uninstall(&mut self) {
        self.callback.lock().unwrap().take();
    }

    fn is_installed(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }
}

fn service(
    dir: &Path,
    devices: &Inventory,
    hook: ManualHook,
    options: ServiceOptions,
) -> TrackingService<ManualHook> {
    TrackingService::new(
        Arc::new(UsageStore::new(dir, 100)),
        DeviceIdentityResolver::new(Box::new(FakeInventory(devices.clone()))),
        hook,
        options,
    )
}

fn total_on_disk(store: &UsageStore, identity: &str) -> u64 {
    let text = std::fs::read_to_string(store.report_path(identity)).unwrap();
    codec::decode(&text, chrono::Local::now().date_naive()).total_clicks
}

fn drain(service: &TrackingService<ManualHook>) -> Vec<Notice> {
    service.notices().try_iter().collect()
}

#[test]
fn test_lifecycle_counts_and_saves_on_stop() {
    let dir = tempfile::tempdir().unwrap();
    let devices = inventory("Logitech", "G305");
    let hook = ManualHook::default();
    let mut service = service(dir.path(), &devices, hook.clone(), ServiceOptions::default());
    assert_eq!(service.state(), ServiceState::Idle);

    service.start().unwrap();
    assert_eq!(service.state(), ServiceState::Running);
    assert!(service.is_counting());
    assert!(hook.is_installed());
    assert_eq!(service.current_identity().as_deref(), Some(MOUSE));

    hook.click(42);
    service.stop();

    assert_eq!(service.state(), ServiceState::Stopped);
    assert!(!service.is_counting());
    assert!(!hook.is_installed());

    let record = service.store().snapshot(MOUSE).unwrap();
    assert_eq!(record.total_clicks, 42);
    assert_eq!(record.daily_clicks, 42);
    assert_eq!(total_on_disk(service.store(), MOUSE), 42);

    let stats = service.stats().snapshot();
    assert_eq!(stats.clicks_counted, 42);
    assert_eq!(stats.clicks_dropped, 0);
    assert_eq!(stats.persists_failed, 0);
}

#[test]
fn test_start_twice_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let devices = inventory("Logitech", "G305");
    let mut service = service(dir.path(), &devices, ManualHook::default(), ServiceOptions::default());

    service.start().unwrap();
    assert_eq!(
        service.start(),
        Err(ServiceError::InvalidState(ServiceState::Running))
    );

    service.stop();
    service.stop();
    assert_eq!(service.state(), ServiceState::Stopped);
    assert_eq!(
        service.start(),
        Err(ServiceError::InvalidState(ServiceState::Stopped))
    );
}

#[test]
fn test_hook_failure_keeps_service_running() {
    let dir = tempfile::tempdir().unwrap();
    let devices = inventory("Logitech", "G305");
    let hook = ManualHook::failing(InterceptorError::PermissionDenied);
    let mut service = service(dir.path(), &devices, hook, ServiceOptions::default());

    service.start().unwrap();
    assert_eq!(service.state(), ServiceState::Running);
    assert!(!service.is_counting());
    assert!(drain(&service)
        .iter()
        .any(|n| matches!(n, Notice::CountingDisabled(_))));

    // The record was still created and can be edited
    assert!(service.store().report_path(MOUSE).exists());
    service.stop();
    assert_eq!(service.state(), ServiceState::Stopped);
}

#[test]
fn test_device_query_failure_uses_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let devices: Inventory = Arc::new(Mutex::new(Err(DeviceQueryError::Io(
        "permission denied".to_string(),
    ))));
    let hook = ManualHook::default();
    let mut service = service(dir.path(), &devices, hook.clone(), ServiceOptions::default());

    service.start().unwrap();
    assert_eq!(service.current_identity().as_deref(), Some(UNKNOWN_DEVICE));

    hook.click(3);
    service.stop();

    assert_eq!(
        service.store().snapshot(UNKNOWN_DEVICE).unwrap().total_clicks,
        3
    );
    let query_failures = drain(&service)
        .into_iter()
        .filter(|n| matches!(n, Notice::DeviceQueryFailed(_)))
        .count();
    assert_eq!(query_failures, 1);
}

#[test]
fn test_device_swap_moves_clicks_to_new_record() {
    let dir = tempfile::tempdir().unwrap();
    let devices = inventory("Logitech", "G305");
    let hook = ManualHook::default();
    let options = ServiceOptions {
        identity_ttl: Duration::ZERO,
        ..ServiceOptions::default()
    };
    let mut service = service(dir.path(), &devices, hook.clone(), options);
    service.start().unwrap();

    hook.click(2);
    // Wait for the worker so the swap lands between the two batches
    while service.stats().snapshot().clicks_counted < 2 {
        std::thread::sleep(Duration::from_millis(5));
    }
    *devices.lock().unwrap() = Ok(vec![device("Razer", "Viper")]);
    hook.click(5);
    service.stop();

    let store = service.store();
    assert_eq!(store.snapshot(MOUSE).unwrap().total_clicks, 2);
    assert_eq!(store.snapshot(OTHER_MOUSE).unwrap().total_clicks, 5);
    assert_eq!(total_on_disk(store, OTHER_MOUSE), 5);
    assert_eq!(service.current_identity().as_deref(), Some(OTHER_MOUSE));
    assert!(drain(&service).contains(&Notice::DeviceChanged {
        device: OTHER_MOUSE.to_string()
    }));
}

#[test]
fn test_settings_commit_and_reset_are_saved() {
    let dir = tempfile::tempdir().unwrap();
    let devices = inventory("Logitech", "G305");
    let hook = ManualHook::default();
    let mut service = service(dir.path(), &devices, hook.clone(), ServiceOptions::default());
    service.start().unwrap();
    hook.click(10);
    while service.stats().snapshot().clicks_counted < 10 {
        std::thread::sleep(Duration::from_millis(5));
    }

    let failures = service.commit_settings(&[RecordEdit {
        device_identity: MOUSE.to_string(),
        switch_brand: Some("Huano".to_string()),
        ..RecordEdit::default()
    }]);
    assert!(failures.is_empty());
    assert_eq!(total_on_disk(service.store(), MOUSE), 10);

    let record = service.reset_device(MOUSE).unwrap();
    assert_eq!(record.total_clicks, 0);
    assert_eq!(record.switch_brand, "Huano");
    assert_eq!(total_on_disk(service.store(), MOUSE), 0);

    hook.click(1);
    service.stop();
    assert_eq!(service.records()[0].total_clicks, 1);
}

#[test]
fn test_save_failures_are_reported_and_counts_kept() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the data directory should be
    let data_dir = dir.path().join("reports");
    std::fs::write(&data_dir, "not a directory").unwrap();
    let devices = inventory("Logitech", "G305");
    let hook = ManualHook::default();
    let mut service = service(&data_dir, &devices, hook.clone(), ServiceOptions::default());

    service.start().unwrap();
    assert!(service.is_counting());
    hook.click(150);
    service.stop();
    assert_eq!(service.state(), ServiceState::Stopped);

    // Initial save, the save at click 100 and the save on stop
    let failures: Vec<Notice> = drain(&service)
        .into_iter()
        .filter(|n| matches!(n, Notice::PersistFailed { device, .. } if device == MOUSE))
        .collect();
    assert_eq!(failures.len(), 3);
    let stats = service.stats().snapshot();
    assert_eq!(stats.persists_failed, 3);
    assert_eq!(stats.clicks_counted, 150);
    assert_eq!(service.store().snapshot(MOUSE).unwrap().total_clicks, 150);

    std::fs::remove_file(&data_dir).unwrap();
    assert!(service.store().persist_all().is_empty());
    assert_eq!(total_on_disk(service.store(), MOUSE), 150);
}

#[test]
fn test_settings_commit_while_clicking_keeps_both() {
    let dir = tempfile::tempdir().unwrap();
    let devices = inventory("Logitech", "G305");
    let hook = ManualHook::default();
    let mut service = service(dir.path(), &devices, hook.clone(), ServiceOptions::default());
    service.start().unwrap();

    std::thread::scope(|scope| {
        let clicker = hook.clone();
        scope.spawn(move || {
            for _ in 0..50 {
                clicker.click(10);
                std::thread::yield_now();
            }
        });
        for i in 0..50 {
            let failures = service.commit_settings(&[RecordEdit {
                device_identity: MOUSE.to_string(),
                switch_brand: Some(format!("Huano {i}")),
                switch_model: Some("Blue Shell Pink Dot".to_string()),
                ..RecordEdit::default()
            }]);
            assert!(failures.is_empty());
        }
    });
    service.stop();

    let record = service.store().snapshot(MOUSE).unwrap();
    assert_eq!(record.total_clicks, 500);
    assert_eq!(record.switch_brand, "Huano 49");

    let reloaded = UsageStore::new(dir.path(), 100);
    let lookup = reloaded.get_or_create(MOUSE);
    assert_eq!(lookup.record.total_clicks, 500);
    assert_eq!(lookup.record.switch_brand, "Huano 49");
    assert_eq!(lookup.record.switch_model, "Blue Shell Pink Dot");
    assert!(!drain(&service)
        .iter()
        .any(|n| matches!(n, Notice::PersistFailed { .. })));
}

#[test]
fn test_drop_stops_running_service() {
    let dir = tempfile::tempdir().unwrap();
    let devices = inventory("Logitech", "G305");
    let hook = ManualHook::default();
    {
        let mut service = service(dir.path(), &devices, hook.clone(), ServiceOptions::default());
        service.start().unwrap();
        hook.click(7);
    }

    assert!(!hook.is_installed());
    let store = UsageStore::new(dir.path(), 100);
    assert_eq!(total_on_disk(&store, MOUSE), 7);
}
