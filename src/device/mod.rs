//! Pointing-device identity resolution.
//!
//! The identity of the attached mouse is derived from the OS device inventory
//! as `"{manufacturer} - {name}"` and used as the key of its usage record.
//! Enumeration failures never propagate: the resolver falls back to a
//! sentinel identity and logs the fault.

#[cfg(any(target_os = "macos", test))]
pub mod ioreg;
#[cfg(any(target_os = "linux", test))]
pub mod procfs;
#[cfg(target_os = "windows")]
pub mod setupapi;

use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Identity used when no pointing device can be described.
pub const UNKNOWN_DEVICE: &str = "Unknown Mouse";

/// Substitute for a missing manufacturer.
pub const UNKNOWN_MANUFACTURER: &str = "Unknown";

/// What the OS reports about one pointing device.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub manufacturer: Option<String>,
    pub name: Option<String>,
}

impl DeviceDescriptor {
    pub fn new(manufacturer: Option<String>, name: Option<String>) -> Self {
        Self {
            manufacturer: non_blank(manufacturer),
            name: non_blank(name),
        }
    }

    /// The identity string for this device.
    pub fn identity(&self) -> String {
        format!(
            "{} - {}",
            self.manufacturer.as_deref().unwrap_or(UNKNOWN_MANUFACTURER),
            self.name.as_deref().unwrap_or(UNKNOWN_DEVICE)
        )
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Errors from querying the device inventory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceQueryError {
    /// The inventory could not be read
    Io(String),
    /// A helper program failed
    Command(String),
    /// The OS API returned an error
    Api(String),
}

impl std::fmt::Display for DeviceQueryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceQueryError::Io(e) => write!(f, "Device inventory unreadable: {e}"),
            DeviceQueryError::Command(e) => write!(f, "Device query command failed: {e}"),
            DeviceQueryError::Api(e) => write!(f, "Device query failed: {e}"),
        }
    }
}

impl std::error::Error for DeviceQueryError {}

/// A source of pointing-device descriptors, in enumeration order.
pub trait DeviceSource: Send {
    fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError>;
}

/// The device source for the current platform.
pub fn system_source() -> Box<dyn DeviceSource> {
    #[cfg(target_os = "linux")]
    {
        Box::new(procfs::ProcInputSource::default())
    }
    #[cfg(target_os = "macos")]
    {
        Box::new(ioreg::IoregSource)
    }
    #[cfg(target_os = "windows")]
    {
        Box::new(setupapi::SetupApiSource)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Box::new(NoDevices)
    }
}

/// Source for platforms without a device inventory.
#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
struct NoDevices;

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
impl DeviceSource for NoDevices {
    fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError> {
        Ok(Vec::new())
    }
}

/// Derives the identity of the active pointing device.
pub struct DeviceIdentityResolver {
    source: Box<dyn DeviceSource>,
}

impl DeviceIdentityResolver {
    pub fn new(source: Box<dyn DeviceSource>) -> Self {
        Self { source }
    }

    /// Resolver backed by the platform's device inventory.
    pub fn system() -> Self {
        Self::new(system_source())
    }

    /// Identity of the first enumerated pointing device, or
    /// [`UNKNOWN_DEVICE`] when there is none.
    pub fn try_resolve(&self) -> Result<String, DeviceQueryError> {
        let devices = self.source.pointing_devices()?;
        Ok(devices
            .first()
            .map(DeviceDescriptor::identity)
            .unwrap_or_else(|| UNKNOWN_DEVICE.to_string()))
    }

    /// Like [`try_resolve`](Self::try_resolve), but a failed query yields
    /// [`UNKNOWN_DEVICE`].
    pub fn resolve(&self) -> String {
        self.try_resolve().unwrap_or_else(|e| {
            warn!("{e}; using '{UNKNOWN_DEVICE}'");
            UNKNOWN_DEVICE.to_string()
        })
    }
}

/// Outcome of asking the [`IdentityCache`] for the current device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub identity: String,
    /// The identity differs from the previously cached one
    pub changed: bool,
    /// The query failed and the sentinel identity was substituted
    pub failure: Option<DeviceQueryError>,
}

/// Caches the resolved identity and re-queries once it is older than `ttl`.
///
/// A zero `ttl` re-resolves on every call.
pub struct IdentityCache {
    resolver: DeviceIdentityResolver,
    ttl: Duration,
    cached: Option<(String, Instant)>,
}

impl IdentityCache {
    pub fn new(resolver: DeviceIdentityResolver, ttl: Duration) -> Self {
        Self {
            resolver,
            ttl,
            cached: None,
        }
    }

    /// Last resolved identity, if any.
    pub fn cached(&self) -> Option<&str> {
        self.cached.as_ref().map(|(identity, _)| identity.as_str())
    }

    /// Current identity, re-resolving if the cached one has expired.
    pub fn current(&mut self) -> Resolution {
        if let Some((identity, at)) = &self.cached {
            if !self.ttl.is_zero() && at.elapsed() < self.ttl {
                return Resolution {
                    identity: identity.clone(),
                    changed: false,
                    failure: None,
                };
            }
        }
        self.refresh()
    }

    /// Re-resolve now regardless of age.
    pub fn refresh(&mut self) -> Resolution {
        let (identity, failure) = match self.resolver.try_resolve() {
            Ok(identity) => (identity, None),
            Err(e) => {
                warn!("{e}; using '{UNKNOWN_DEVICE}'");
                (UNKNOWN_DEVICE.to_string(), Some(e))
            }
        };

        let changed = match self.cached() {
            Some(previous) if previous != identity => {
                info!("Pointing device changed: '{previous}' -> '{identity}'");
                true
            }
            _ => false,
        };

        self.cached = Some((identity.clone(), Instant::now()));
        Resolution {
            identity,
            changed,
            failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct ScriptedSource(Arc<Mutex<Result<Vec<DeviceDescriptor>, DeviceQueryError>>>);

    impl DeviceSource for ScriptedSource {
        fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError> {
            self.0.lock().unwrap().clone()
        }
    }

    fn mouse(manufacturer: &str, name: &str) -> DeviceDescriptor {
        DeviceDescriptor::new(Some(manufacturer.to_string()), Some(name.to_string()))
    }

    #[test]
    fn test_first_device_wins() {
        let source = ScriptedSource(Arc::new(Mutex::new(Ok(vec![
            mouse("Logitech", "G305"),
            mouse("Razer", "Viper"),
        ]))));
        let resolver = DeviceIdentityResolver::new(Box::new(source));
        assert_eq!(resolver.resolve(), "Logitech - G305");
    }

    #[test]
    fn test_missing_fields_use_placeholders() {
        let descriptor = DeviceDescriptor::new(None, Some("  ".to_string()));
        assert_eq!(descriptor.identity(), "Unknown - Unknown Mouse");
    }

    #[test]
    fn test_empty_inventory_and_failure_use_sentinel() {
        let state = Arc::new(Mutex::new(Ok(Vec::new())));
        let resolver = DeviceIdentityResolver::new(Box::new(ScriptedSource(state.clone())));
        assert_eq!(resolver.resolve(), UNKNOWN_DEVICE);

        *state.lock().unwrap() = Err(DeviceQueryError::Api("access denied".to_string()));
        assert!(resolver.try_resolve().is_err());
        assert_eq!(resolver.resolve(), UNKNOWN_DEVICE);
    }

    #[test]
    fn test_cache_detects_device_change() {
        let state = Arc::new(Mutex::new(Ok(vec![mouse("Logitech", "G305")])));
        let resolver = DeviceIdentityResolver::new(Box::new(ScriptedSource(state.clone())));
        let mut cache = IdentityCache::new(resolver, Duration::ZERO);

        let first = cache.current();
        assert_eq!(first.identity, "Logitech - G305");
        assert!(!first.changed);

        *state.lock().unwrap() = Ok(vec![mouse("Razer", "Viper")]);
        let second = cache.current();
        assert_eq!(second.identity, "Razer - Viper");
        assert!(second.changed);
    }

    #[test]
    fn test_cache_holds_identity_within_ttl() {
        let state = Arc::new(Mutex::new(Ok(vec![mouse("Logitech", "G305")])));
        let resolver = DeviceIdentityResolver::new(Box::new(ScriptedSource(state.clone())));
        let mut cache = IdentityCache::new(resolver, Duration::from_secs(3600));

        cache.current();
        *state.lock().unwrap() = Ok(vec![mouse("Razer", "Viper")]);
        assert_eq!(cache.current().identity, "Logitech - G305");
        assert_eq!(cache.refresh().identity, "Razer - Viper");
    }

    #[test]
    fn test_cache_reports_failures() {
        let state = Arc::new(Mutex::new(Err(DeviceQueryError::Io("gone".to_string()))));
        let resolver = DeviceIdentityResolver::new(Box::new(ScriptedSource(state)));
        let mut cache = IdentityCache::new(resolver, Duration::ZERO);

        let resolution = cache.current();
        assert_eq!(resolution.identity, UNKNOWN_DEVICE);
        assert!(resolution.failure.is_some());
    }
}
