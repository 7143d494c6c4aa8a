//! Mouse Click Counter - per-device primary button usage tracking.
//!
//! This library counts presses of the primary mouse button, attributes them
//! to the attached pointing device, and keeps a daily and lifetime tally for
//! every device in a human-readable report file.
//!
//! # What is tracked
//!
//! - **Only primary-button presses**: no coordinates, no other buttons, no keys
//! - **Never consumed**: every click still reaches the application under it
//! - **Local only**: one HTML report per device in the data directory
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Mouse Click Counter                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │ Interceptor │──▶│  Tracking   │──▶│ UsageStore  │        │
//! │  │  (OS hook)  │   │   Service   │   │ (per device)│        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │                           │                  │              │
//! │                           ▼                  ▼              │
//! │                    ┌─────────────┐   ┌─────────────┐        │
//! │                    │  Identity   │   │   Report    │        │
//! │                    │  Resolver   │   │   Codec     │        │
//! │                    └─────────────┘   └─────────────┘        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mouse_click_counter::{
//!     interceptor, DeviceIdentityResolver, ServiceOptions, TrackingService, UsageStore,
//! };
//! use std::sync::Arc;
//!
//! let store = Arc::new(UsageStore::new("/tmp/clicks", 100));
//! let mut service = TrackingService::new(
//!     store,
//!     DeviceIdentityResolver::system(),
//!     interceptor::SystemInterceptor::new(),
//!     ServiceOptions::default(),
//! );
//! service.start().expect("service was idle");
//! // ... clicks are counted until
//! service.stop();
//! ```

pub mod autostart;
pub mod clock;
pub mod config;
pub mod device;
pub mod instance;
pub mod interceptor;
pub mod ledger;
pub mod service;

// Re-export key types at crate root for convenience
pub use clock::{Clock, SystemClock};
pub use config::{Config, ConfigError};
pub use device::{
    DeviceDescriptor, DeviceIdentityResolver, DeviceQueryError, DeviceSource, IdentityCache,
    UNKNOWN_DEVICE,
};
pub use instance::{InstanceError, InstanceGuard};
pub use interceptor::{InputInterceptor, InterceptorError, PrimaryButtonCallback};
pub use ledger::{RecordEdit, StoreError, UsageRecord, UsageStore};
pub use service::{Notice, ServiceError, ServiceOptions, ServiceState, TrackingService};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Information text shown by the `about` command.
pub const ABOUT: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                      MOUSE CLICK COUNTER                         ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Counts how often the primary mouse button is pressed, so you    ║
║  can see how much wear each mouse switch has taken.              ║
║                                                                  ║
║  ✓ WHAT IS RECORDED:                                             ║
║    • Primary-button presses, per mouse model                     ║
║    • A daily count (reset at local midnight) and a total         ║
║    • The switch brand, model and picture you assign              ║
║                                                                  ║
║  ✗ WHAT IS NEVER RECORDED:                                       ║
║    • Where you click or what you click on                        ║
║    • Keystrokes or other buttons                                 ║
║                                                                  ║
║  Clicks always pass through to your applications. Reports are    ║
║  saved every 100 clicks and on exit, one HTML file per mouse.    ║
║                                                                  ║
║  View the current counts anytime with:                           ║
║    mouse-click-counter status                                    ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;
