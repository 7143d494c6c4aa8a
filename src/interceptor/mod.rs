//! Global primary-button interception.
//!
//! This module provides platform-specific hooks that report presses of the
//! primary pointer button without ever consuming them.

pub mod types;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub mod noop;

// Re-export commonly used types
pub use types::{InputInterceptor, InterceptorError, PrimaryButtonCallback};

#[cfg(target_os = "macos")]
pub use self::macos::{check_permission, MacOSInterceptor};

/// Platform-agnostic interceptor type alias
#[cfg(target_os = "macos")]
pub type SystemInterceptor = MacOSInterceptor;

#[cfg(target_os = "windows")]
pub use self::windows::{check_permission, WindowsInterceptor};

/// Platform-agnostic interceptor type alias
#[cfg(target_os = "windows")]
pub type SystemInterceptor = WindowsInterceptor;

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub use noop::{check_permission, NoopInterceptor};

/// Platform-agnostic interceptor type alias
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
pub type SystemInterceptor = NoopInterceptor;
