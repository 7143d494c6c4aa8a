//! macOS device inventory from the IORegistry.
//!
//! `ioreg -r -c IOHIDDevice -d 1` lists every HID device with its
//! properties. Mice are the devices whose primary usage is Mouse (2) or
//! Pointer (1) on the Generic Desktop page (1).

use super::DeviceDescriptor;
#[cfg(target_os = "macos")]
use super::{DeviceQueryError, DeviceSource};
#[cfg(target_os = "macos")]
use std::process::Command;

const GENERIC_DESKTOP_PAGE: i64 = 1;
const USAGE_POINTER: i64 = 1;
const USAGE_MOUSE: i64 = 2;

/// Properties of one IOHIDDevice node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HidNode {
    pub product: Option<String>,
    pub manufacturer: Option<String>,
    pub usage_page: Option<i64>,
    pub usage: Option<i64>,
}

impl HidNode {
    pub fn is_pointer(&self) -> bool {
        self.usage_page == Some(GENERIC_DESKTOP_PAGE)
            && matches!(self.usage, Some(USAGE_POINTER) | Some(USAGE_MOUSE))
    }
}

/// Parse `ioreg` text output into HID nodes.
pub fn parse_ioreg(text: &str) -> Vec<HidNode> {
    let mut nodes = Vec::new();
    let mut current: Option<HidNode> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("+-o ") {
            if let Some(node) = current.take() {
                nodes.push(node);
            }
            current = Some(HidNode::default());
            continue;
        }

        let (Some(node), Some((key, value))) = (current.as_mut(), line.split_once(" = ")) else {
            continue;
        };
        match key.trim_matches('"') {
            "Product" => node.product = Some(unquote(value)),
            "Manufacturer" => node.manufacturer = Some(unquote(value)),
            "PrimaryUsagePage" => node.usage_page = value.trim().parse().ok(),
            "PrimaryUsage" => node.usage = value.trim().parse().ok(),
            _ => {}
        }
    }
    if let Some(node) = current {
        nodes.push(node);
    }

    nodes
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches('"').to_string()
}

/// Device source running `ioreg`.
#[cfg(target_os = "macos")]
#[derive(Debug, Clone, Copy, Default)]
pub struct IoregSource;

#[cfg(target_os = "macos")]
impl DeviceSource for IoregSource {
    fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError> {
        let output = Command::new("ioreg")
            .args(["-r", "-c", "IOHIDDevice", "-d", "1"])
            .output()
            .map_err(|e| DeviceQueryError::Command(format!("ioreg: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DeviceQueryError::Command(format!("ioreg: {stderr}")));
        }

        Ok(pointers(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Pointing devices in `ioreg` output, in listing order.
pub fn pointers(text: &str) -> Vec<DeviceDescriptor> {
    parse_ioreg(text)
        .into_iter()
        .filter(HidNode::is_pointer)
        .map(|node| DeviceDescriptor::new(node.manufacturer, node.product))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const IOREG: &str = r#"
+-o Apple Internal Keyboard / Trackpad  <class AppleUserHIDDevice, id 0x100000a1c, registered, matched, active, busy 0 (0 ms), retain 16>
    {
      "Product" = "Apple Internal Keyboard / Trackpad"
      "Manufacturer" = "Apple Inc."
      "PrimaryUsagePage" = 1
      "PrimaryUsage" = 6
    }

+-o USB Receiver  <class IOUSBHostHIDDevice, id 0x100000b2d, registered, matched, active, busy 0 (0 ms), retain 12>
    {
      "Product" = "USB Receiver"
      "Manufacturer" = "Logitech"
      "PrimaryUsagePage" = 1
      "PrimaryUsage" = 2
    }
"#;

    #[test]
    fn test_parse_nodes() {
        let nodes = parse_ioreg(IOREG);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].manufacturer.as_deref(), Some("Apple Inc."));
        assert_eq!(nodes[0].usage, Some(6));
        assert!(!nodes[0].is_pointer());
        assert!(nodes[1].is_pointer());
    }

    #[test]
    fn test_pointers_only() {
        let devices = pointers(IOREG);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].identity(), "Logitech - USB Receiver");
    }
}
