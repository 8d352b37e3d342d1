//! USB vendor ids known to ship GNSS hardware
//!
//! Pure lookup data for display and filtering assistance. Nothing in the
//! connection lifecycle gates on this table.

use crate::descriptor::DeviceDescriptor;

/// u-blox receivers (NEO/MAX/ZED families)
pub mod ublox {
    pub const VID: u16 = 0x1546;
}

/// Quectel modules with integrated GNSS (EC/EG/LC families)
pub mod quectel {
    pub const VID: u16 = 0x2C7C;

    /// EC25 LTE module, common GNSS source on embedded boards
    pub const EC25_PID: u16 = 0x0125;
}

/// Garmin handhelds and pucks
pub mod garmin {
    pub const VID: u16 = 0x0FCF;
}

/// USB-serial bridge vendors frequently fronting GNSS boards
pub mod bridges {
    pub const PROLIFIC: u16 = 0x067B;
    pub const FTDI: u16 = 0x0403;
    pub const SILICON_LABS: u16 = 0x10C4;
}

/// Cellular vendors whose modems expose GNSS endpoints
pub mod cellular {
    pub const QUALCOMM: u16 = 0x05C6;
    pub const SIERRA_WIRELESS: u16 = 0x1199;
    pub const HUAWEI: u16 = 0x12D1;
}

/// Human-readable vendor name for a known vendor id
pub fn vendor_name(vendor_id: u16) -> Option<&'static str> {
    match vendor_id {
        self::ublox::VID => Some("u-blox"),
        self::quectel::VID => Some("Quectel"),
        self::garmin::VID => Some("Garmin"),
        x if x == bridges::PROLIFIC => Some("Prolific"),
        x if x == bridges::FTDI => Some("FTDI"),
        x if x == bridges::SILICON_LABS => Some("Silicon Labs"),
        x if x == cellular::QUALCOMM => Some("Qualcomm"),
        x if x == cellular::SIERRA_WIRELESS => Some("Sierra Wireless"),
        x if x == cellular::HUAWEI => Some("Huawei"),
        _ => None,
    }
}

/// Heuristic: could this device plausibly be a GNSS source?
///
/// Known vendors match outright; otherwise communications-class (0x02) and
/// composite (0xEF) devices are considered candidates.
pub fn is_potential_gnss_device(device: &DeviceDescriptor) -> bool {
    if vendor_name(device.vendor_id).is_some() {
        return true;
    }
    device.device_class == 0x02 || device.device_class == 0xEF
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_device(vendor_id: u16, device_class: u8) -> DeviceDescriptor {
        DeviceDescriptor {
            name: "/dev/bus/usb/001/002".to_string(),
            vendor_id,
            product_id: 0x0001,
            device_class,
            device_subclass: 0,
            device_protocol: 0,
            product: None,
            manufacturer: None,
            serial_number: None,
            interfaces: Vec::new(),
        }
    }

    #[test]
    fn known_vendors_resolve() {
        assert_eq!(vendor_name(ublox::VID), Some("u-blox"));
        assert_eq!(vendor_name(quectel::VID), Some("Quectel"));
        assert_eq!(vendor_name(0xBEEF), None);
    }

    #[test]
    fn gnss_heuristic_accepts_vendor_or_class() {
        assert!(is_potential_gnss_device(&bare_device(ublox::VID, 0x00)));
        assert!(is_potential_gnss_device(&bare_device(0xBEEF, 0x02)));
        assert!(is_potential_gnss_device(&bare_device(0xBEEF, 0xEF)));
        assert!(!is_potential_gnss_device(&bare_device(0xBEEF, 0x03)));
    }
}
