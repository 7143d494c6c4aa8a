//! User-facing notifications raised by the tracking service.

use serde::{Deserialize, Serialize};

/// A non-fatal condition the user should hear about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notice {
    /// Device enumeration failed; the sentinel identity is in use
    DeviceQueryFailed(String),
    /// The input hook could not be installed; nothing is counted
    CountingDisabled(String),
    /// A record could not be saved; it will be retried on the next save
    PersistFailed { device: String, message: String },
    /// Run-on-login registration failed
    AutoStartFailed(String),
    /// Clicks are now attributed to another device
    DeviceChanged { device: String },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::DeviceQueryFailed(e) => write!(f, "Could not detect the mouse model: {e}"),
            Notice::CountingDisabled(e) => {
                write!(f, "Clicks are not being counted: {e}. Restart to try again.")
            }
            Notice::PersistFailed { device, message } => {
                write!(f, "Could not save clicks for '{device}': {message}")
            }
            Notice::AutoStartFailed(e) => write!(f, "Could not enable start on login: {e}"),
            Notice::DeviceChanged { device } => write!(f, "Now counting clicks for '{device}'"),
        }
    }
}
