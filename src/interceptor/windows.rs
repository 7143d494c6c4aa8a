//! Windows implementation of the primary-button hook.
//!
//! Installs a `WH_MOUSE_LL` hook on a dedicated thread. Low-level hooks are
//! called on the installing thread while it pumps messages, so the thread
//! runs a `GetMessageW` loop until it receives `WM_QUIT`.

use crate::interceptor::types::{InputInterceptor, InterceptorError, PrimaryButtonCallback};
use crossbeam_channel::{bounded, Sender};
use std::cell::{Cell, RefCell};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, GetSystemMetrics, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, UnhookWindowsHookEx, HHOOK, MSG, PM_NOREMOVE, SM_SWAPBUTTON,
    WH_MOUSE_LL, WM_LBUTTONDOWN, WM_QUIT, WM_RBUTTONDOWN,
};

thread_local! {
    static ON_PRIMARY_DOWN: RefCell<Option<PrimaryButtonCallback>> = const { RefCell::new(None) };
    static PRIMARY_DOWN_MESSAGE: Cell<u32> = const { Cell::new(WM_LBUTTONDOWN) };
}

/// The Windows primary-button hook.
#[derive(Default)]
pub struct WindowsInterceptor {
    hook_thread_id: Option<u32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsInterceptor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InputInterceptor for WindowsInterceptor {
    fn install(&mut self, on_primary_down: PrimaryButtonCallback) -> Result<(), InterceptorError> {
        if self.thread_handle.is_some() {
            return Err(InterceptorError::AlreadyInstalled);
        }

        let (ready_tx, ready_rx) = bounded(1);
        let handle = thread::Builder::new()
            .name("mouse-hook".to_string())
            .spawn(move || run_hook_loop(on_primary_down, ready_tx))
            .map_err(|e| InterceptorError::HookInstallationFailed(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(thread_id)) => {
                self.hook_thread_id = Some(thread_id);
                self.thread_handle = Some(handle);
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                let _ = handle.join();
                Err(InterceptorError::HookInstallationFailed(
                    "hook thread exited before reporting".to_string(),
                ))
            }
        }
    }

    fn uninstall(&mut self) {
        if let Some(thread_id) = self.hook_thread_id.take() {
            if let Err(e) = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) }
            {
                warn!("Could not stop mouse hook thread: {e}");
            }
        }
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }

    fn is_installed(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Drop for WindowsInterceptor {
    fn drop(&mut self) {
        self.uninstall();
    }
}

/// Low-level mouse hook callback.
unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 && w_param.0 as u32 == PRIMARY_DOWN_MESSAGE.with(Cell::get) {
        ON_PRIMARY_DOWN.with(|callback| {
            if let Some(callback) = callback.borrow().as_ref() {
                callback();
            }
        });
    }

    // Always pass the event on
    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Install the hook on this thread and pump messages until `WM_QUIT`.
fn run_hook_loop(
    on_primary_down: PrimaryButtonCallback,
    ready: Sender<Result<u32, InterceptorError>>,
) {
    ON_PRIMARY_DOWN.with(|cb| *cb.borrow_mut() = Some(on_primary_down));

    unsafe {
        // Low-level hooks report physical buttons; honour swapped buttons.
        let primary = if GetSystemMetrics(SM_SWAPBUTTON) != 0 {
            WM_RBUTTONDOWN
        } else {
            WM_LBUTTONDOWN
        };
        PRIMARY_DOWN_MESSAGE.with(|m| m.set(primary));

        // Create the message queue before anyone can post WM_QUIT to it
        let mut msg = MSG::default();
        let _ = PeekMessageW(&mut msg, HWND::default(), 0, 0, PM_NOREMOVE);

        let hook = match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) {
            Ok(hook) => hook,
            Err(e) => {
                let _ = ready.send(Err(InterceptorError::HookInstallationFailed(e.to_string())));
                return;
            }
        };
        let _ = ready.send(Ok(GetCurrentThreadId()));
        debug!("Mouse hook installed");

        while GetMessageW(&mut msg, HWND::default(), 0, 0).0 > 0 {}

        let _ = UnhookWindowsHookEx(hook);
        debug!("Mouse hook removed");
    }

    ON_PRIMARY_DOWN.with(|cb| cb.borrow_mut().take());
}

/// Check whether a low-level mouse hook can be installed.
pub fn check_permission() -> bool {
    unsafe {
        match SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) {
            Ok(hook) => {
                let _ = UnhookWindowsHookEx(hook);
                true
            }
            Err(_) => false,
        }
    }
}
