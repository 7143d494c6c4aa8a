//! macOS implementation of the primary-button hook using a CGEvent tap.
//!
//! The tap is listen-only, so events always continue to their target. It
//! requires Input Monitoring permission.

use crate::interceptor::types::{InputInterceptor, InterceptorError, PrimaryButtonCallback};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    CallbackResult,
};
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// The macOS primary-button hook.
pub struct MacOSInterceptor {
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSInterceptor {
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }
}

impl Default for MacOSInterceptor {
    fn default() -> Self {
        Self::new()
    }
}

impl InputInterceptor for MacOSInterceptor {
    fn install(&mut self, on_primary_down: PrimaryButtonCallback) -> Result<(), InterceptorError> {
        if self.thread_handle.is_some() {
            return Err(InterceptorError::AlreadyInstalled);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();
        let (ready_tx, ready_rx) = bounded(1);

        let handle = thread::Builder::new()
            .name("mouse-tap".to_string())
            .spawn(move || run_tap_loop(on_primary_down, running, ready_tx))
            .map_err(|e| InterceptorError::HookInstallationFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                let _ = handle.join();
                Err(InterceptorError::HookInstallationFailed(
                    "event tap thread exited before reporting".to_string(),
                ))
            }
        }
    }

    fn uninstall(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop wakes at least every 100ms to check the flag
            let _ = handle.join();
        }
    }

    fn is_installed(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for MacOSInterceptor {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Create the tap on this thread and run its loop until stopped.
fn run_tap_loop(
    on_primary_down: PrimaryButtonCallback,
    running: Arc<AtomicBool>,
    ready: Sender<Result<(), InterceptorError>>,
) {
    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::LeftMouseDown],
        move |_proxy, event_type, _event| {
            if matches!(event_type, CGEventType::LeftMouseDown) {
                on_primary_down();
            }
            CallbackResult::Keep
        },
    );
    let tap = match tap {
        Ok(tap) => tap,
        Err(_) => {
            // Tap creation fails when Input Monitoring is not granted
            let _ = ready.send(Err(InterceptorError::PermissionDenied));
            return;
        }
    };

    let source = match tap.mach_port().create_runloop_source(0) {
        Ok(source) => source,
        Err(_) => {
            let _ = ready.send(Err(InterceptorError::HookInstallationFailed(
                "could not create run loop source".to_string(),
            )));
            return;
        }
    };

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();
    let _ = ready.send(Ok(()));
    debug!("Event tap installed");

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            Duration::from_millis(100),
            false,
        );
    }

    // The tap is disabled when dropped
    debug!("Event tap removed");
}

/// Check if the application has Input Monitoring permission.
///
/// macOS has no direct query; creating a passive tap fails without it.
pub fn check_permission() -> bool {
    let result = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::LeftMouseDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interceptor_creation() {
        let interceptor = MacOSInterceptor::new();
        assert!(!interceptor.is_installed());
    }
}
