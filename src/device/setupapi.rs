//! Windows device inventory through SetupAPI.
//!
//! Enumerates the present devices of the Mouse setup class and reads the
//! manufacturer and name properties the driver package registered.

use super::{DeviceDescriptor, DeviceQueryError, DeviceSource};
use windows::core::PCWSTR;
use windows::Win32::Devices::DeviceAndDriverInstallation::{
    SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInfo, SetupDiGetClassDevsW,
    SetupDiGetDeviceRegistryPropertyW, DIGCF_PRESENT, GUID_DEVCLASS_MOUSE, HDEVINFO,
    SETUP_DI_REGISTRY_PROPERTY, SPDRP_DEVICEDESC, SPDRP_FRIENDLYNAME, SPDRP_MFG,
    SP_DEVINFO_DATA,
};
use windows::Win32::Foundation::HWND;

/// Device source backed by SetupAPI.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupApiSource;

impl DeviceSource for SetupApiSource {
    fn pointing_devices(&self) -> Result<Vec<DeviceDescriptor>, DeviceQueryError> {
        let set = unsafe {
            SetupDiGetClassDevsW(
                Some(&GUID_DEVCLASS_MOUSE),
                PCWSTR::null(),
                HWND::default(),
                DIGCF_PRESENT,
            )
        }
        .map_err(|e| DeviceQueryError::Api(e.to_string()))?;

        let mut devices = Vec::new();
        let mut index = 0;
        loop {
            let mut info = SP_DEVINFO_DATA {
                cbSize: std::mem::size_of::<SP_DEVINFO_DATA>() as u32,
                ..Default::default()
            };
            // Fails with ERROR_NO_MORE_ITEMS past the last device
            if unsafe { SetupDiEnumDeviceInfo(set, index, &mut info) }.is_err() {
                break;
            }
            index += 1;

            let manufacturer = string_property(set, &info, SPDRP_MFG);
            let name = string_property(set, &info, SPDRP_FRIENDLYNAME)
                .or_else(|| string_property(set, &info, SPDRP_DEVICEDESC));
            devices.push(DeviceDescriptor::new(manufacturer, name));
        }

        unsafe {
            let _ = SetupDiDestroyDeviceInfoList(set);
        }
        Ok(devices)
    }
}

/// Read a REG_SZ device property, or `None` if it is absent.
fn string_property(
    set: HDEVINFO,
    info: &SP_DEVINFO_DATA,
    property: SETUP_DI_REGISTRY_PROPERTY,
) -> Option<String> {
    let mut buffer = vec![0u8; 512];
    let mut required = 0u32;
    unsafe {
        SetupDiGetDeviceRegistryPropertyW(
            set,
            info,
            property,
            None,
            Some(buffer.as_mut_slice()),
            Some(&mut required),
        )
    }
    .ok()?;

    let used = (required as usize).min(buffer.len());
    let wide: Vec<u16> = buffer[..used]
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&c| c != 0)
        .collect();
    Some(String::from_utf16_lossy(&wide))
}
