//! Demonstration of the Mouse Click Counter pipeline.
//!
//! This example shows how to:
//! 1. Describe a device to the identity resolver
//! 2. Drive the tracking service with simulated clicks
//! 3. Watch periodic saves and notices
//! 4. Read back the HTML report written for the device
//!
//! Run with: cargo run --example click_demo
//!
//! No input permission is needed: clicks come from a simulated hook rather
//! than the real mouse.

use std::sync::{Arc, Mutex};

use mouse_click_counter::{
    device::{DeviceDescriptor, DeviceQueryError, DeviceSource},
    ledger::RecordEdit,
    DeviceIdentityResolver, InputInterceptor, InterceptorError, PrimaryButtonCallback,
    ServiceOptions, TrackingService, UsageStore,
};

/// A hook whose "clicks" are triggered by the demo itself.
#[derive(Default)]
struct SimulatedHook {
    callback: Arc<Mutex<Option<PrimaryButtonCallback>>>,
}

impl SimulatedHook {
    fn handle(&self) -> Arc<Mutex<Option<PrimaryButtonCallback>>> {
        self.callback.clone()
    }
}

impl InputInterceptor for SimulatedHook {
    fn install(&mut self, on_primary_down: PrimaryButtonCallback) -> Result<(), InterceptorError> {
        *self.callback.lock().unwrap() = Some(on_primary_down);
        Ok(())
    }

    fn uninstall(&mut self) {
        self.callback.lock().unwrap().take();
    }

    fn is_installed(&self) -> bool {
        self.callback.lock().unwrap().is_some()
    }
}

struct DemoMouse;

impl DeviceSource for DemoMouse {
    fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError> {
        Ok(vec![DeviceDescriptor::new(
            Some("Logitech".to_string()),
            Some("G305".to_string()),
        )])
    }
}

fn main() {
    println!("Mouse Click Counter - Click Demo");
    println!("================================");
    println!();

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let store = Arc::new(UsageStore::new(dir.path(), 100));

    let hook = SimulatedHook::default();
    let clicks = hook.handle();
    let mut service = TrackingService::new(
        store.clone(),
        DeviceIdentityResolver::new(Box::new(DemoMouse)),
        hook,
        ServiceOptions::default(),
    );

    service.start().expect("Failed to start service");
    let identity = service.current_identity().unwrap_or_default();
    println!("Tracking: {identity}");
    println!("Counting: {}", service.is_counting());
    println!();

    // Simulate 250 presses of the primary button
    let callback = clicks.lock().unwrap().clone().expect("hook not installed");
    for _ in 0..250 {
        callback();
    }

    let edits = [RecordEdit {
        device_identity: identity.clone(),
        switch_brand: Some("Omron".to_string()),
        switch_model: Some("D2FC-F-7N".to_string()),
        image_path: None,
    }];
    service.commit_settings(&edits);

    service.stop();

    for notice in service.notices().try_iter() {
        println!("Notice: {notice}");
    }

    if let Some(record) = store.snapshot(&identity) {
        println!(
            "{}: {} today, {} total (switch: {} {})",
            record.device_identity,
            record.daily_clicks,
            record.total_clicks,
            record.switch_brand,
            record.switch_model
        );
    }
    println!();
    println!("{}", service.stats().summary());
    println!();

    let report = store.report_path(&identity);
    println!("Report written to {}:", report.display());
    println!();
    match std::fs::read_to_string(&report) {
        Ok(html) => println!("{html}"),
        Err(e) => eprintln!("Could not read report: {e}"),
    }
}
