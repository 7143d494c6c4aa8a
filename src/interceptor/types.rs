//! Platform-independent interceptor types.

use std::sync::Arc;

/// Callback run on the hook thread for every primary-button press.
///
/// It runs inside the OS input pipeline and must return immediately; hand
/// the event off (e.g. `try_send` on a channel) instead of doing work.
pub type PrimaryButtonCallback = Arc<dyn Fn() + Send + Sync>;

/// A process-wide low-level hook on the primary pointer button.
///
/// Implementations observe presses and always pass them on to the rest of
/// the system; they never swallow input.
pub trait InputInterceptor: Send {
    /// Install the hook and start calling `on_primary_down`.
    fn install(&mut self, on_primary_down: PrimaryButtonCallback) -> Result<(), InterceptorError>;

    /// Remove the hook. Calling it when nothing is installed does nothing.
    fn uninstall(&mut self);

    fn is_installed(&self) -> bool;
}

/// Errors that can occur while installing the hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterceptorError {
    AlreadyInstalled,
    PermissionDenied,
    HookInstallationFailed(String),
    Unsupported,
}

impl std::fmt::Display for InterceptorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InterceptorError::AlreadyInstalled => write!(f, "Mouse hook is already installed"),
            InterceptorError::PermissionDenied => {
                write!(f, "Input Monitoring permission not granted")
            }
            InterceptorError::HookInstallationFailed(e) => {
                write!(f, "Failed to install mouse hook: {e}")
            }
            InterceptorError::Unsupported => {
                write!(f, "No global mouse hook is available on this platform")
            }
        }
    }
}

impl std::error::Error for InterceptorError {}
