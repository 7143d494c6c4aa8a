//! Linux device inventory from `/proc/bus/input/devices`.
//!
//! Pointing devices are the entries with a `mouseN` handler. The kernel only
//! reports a product name there; the manufacturer comes from the
//! `manufacturer` attribute of the nearest USB ancestor in sysfs.

use super::{DeviceDescriptor, DeviceQueryError, DeviceSource};
use std::fs;
use std::path::{Path, PathBuf};

/// One entry of `/proc/bus/input/devices`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputDeviceEntry {
    pub name: Option<String>,
    pub sysfs: Option<String>,
    pub handlers: Vec<String>,
}

impl InputDeviceEntry {
    /// Whether the kernel exposes this device as a mouse.
    pub fn is_pointer(&self) -> bool {
        self.handlers.iter().any(|h| h.starts_with("mouse"))
    }
}

/// Parse the text of `/proc/bus/input/devices`.
pub fn parse_devices(text: &str) -> Vec<InputDeviceEntry> {
    let mut entries = Vec::new();
    let mut current = InputDeviceEntry::default();
    let mut in_entry = false;

    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            if in_entry {
                entries.push(std::mem::take(&mut current));
                in_entry = false;
            }
            continue;
        }

        in_entry = true;
        if let Some(rest) = line.strip_prefix("N: Name=") {
            current.name = Some(rest.trim_matches('"').to_string());
        } else if let Some(rest) = line.strip_prefix("S: Sysfs=") {
            current.sysfs = Some(rest.to_string());
        } else if let Some(rest) = line.strip_prefix("H: Handlers=") {
            current.handlers = rest.split_whitespace().map(str::to_string).collect();
        }
    }
    if in_entry {
        entries.push(current);
    }

    entries
}

/// Device source reading procfs and sysfs.
#[derive(Debug, Clone)]
pub struct ProcInputSource {
    devices_path: PathBuf,
    sysfs_root: PathBuf,
}

impl Default for ProcInputSource {
    fn default() -> Self {
        Self::new("/proc/bus/input/devices", "/sys")
    }
}

impl ProcInputSource {
    pub fn new(devices_path: impl Into<PathBuf>, sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            devices_path: devices_path.into(),
            sysfs_root: sysfs_root.into(),
        }
    }

    /// Walk up from the device's sysfs node to the first `manufacturer` file.
    fn manufacturer(&self, sysfs: &str) -> Option<String> {
        let mut dir = self.sysfs_root.join(sysfs.trim_start_matches('/'));
        loop {
            if let Some(value) = read_attribute(&dir.join("manufacturer")) {
                return Some(value);
            }
            if !dir.pop() || dir == self.sysfs_root {
                return None;
            }
        }
    }
}

impl DeviceSource for ProcInputSource {
    fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError> {
        let text = fs::read_to_string(&self.devices_path)
            .map_err(|e| DeviceQueryError::Io(format!("{}: {e}", self.devices_path.display())))?;

        Ok(parse_devices(&text)
            .into_iter()
            .filter(InputDeviceEntry::is_pointer)
            .map(|entry| {
                let manufacturer = entry.sysfs.as_deref().and_then(|s| self.manufacturer(s));
                DeviceDescriptor::new(manufacturer, entry.name)
            })
            .collect())
    }
}

fn read_attribute(path: &Path) -> Option<String> {
    fs::read_to_string(path)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
