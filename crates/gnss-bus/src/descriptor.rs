//! Device descriptors and identity keys
//!
//! A descriptor is an immutable snapshot of one attached device as reported
//! by the bus; re-enumeration supersedes it rather than mutating it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cdc;

/// One logical interface exposed by a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Interface id, unique within the device
    pub id: u8,
    /// Interface class code
    pub class: u8,
    /// Interface subclass code
    pub subclass: u8,
    /// Interface protocol code
    pub protocol: u8,
    /// Number of endpoints on this interface
    pub endpoint_count: u8,
}

impl InterfaceDescriptor {
    /// Check whether this interface is a CDC/ACM communication interface
    pub fn is_cdc_acm(&self) -> bool {
        self.class == cdc::CLASS_COMM && self.subclass == cdc::SUBCLASS_ACM
    }
}

/// Snapshot of an attached device as reported by the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Bus-assigned name/path (e.g. /dev/bus/usb/001/002)
    pub name: String,
    /// USB vendor id
    pub vendor_id: u16,
    /// USB product id
    pub product_id: u16,
    /// Device class code
    pub device_class: u8,
    /// Device subclass code
    pub device_subclass: u8,
    /// Device protocol code
    pub device_protocol: u8,
    /// Product string, if the device reports one
    pub product: Option<String>,
    /// Manufacturer string, if the device reports one
    pub manufacturer: Option<String>,
    /// Serial number string, if the device reports one
    pub serial_number: Option<String>,
    /// Interfaces exposed by the device
    pub interfaces: Vec<InterfaceDescriptor>,
}

impl DeviceDescriptor {
    /// Number of interfaces the device exposes
    pub fn interface_count(&self) -> usize {
        self.interfaces.len()
    }

    /// Check whether any interface is CDC/ACM-class serial
    pub fn is_cdc(&self) -> bool {
        self.interfaces.iter().any(InterfaceDescriptor::is_cdc_acm)
    }

    /// Basic validity: zero ids, an empty bus name, or zero interfaces mark
    /// virtual/host-internal entries, not real peripherals.
    pub fn is_valid(&self) -> bool {
        self.vendor_id != 0
            && self.product_id != 0
            && !self.name.is_empty()
            && !self.interfaces.is_empty()
    }

    /// Catalog key for this device
    pub fn device_key(&self) -> DeviceKey {
        DeviceKey {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
            name: self.name.clone(),
        }
    }

    /// Registry key for this device
    pub fn connection_key(&self) -> ConnectionKey {
        ConnectionKey {
            vendor_id: self.vendor_id,
            product_id: self.product_id,
        }
    }
}

/// Catalog identity: multiple physical devices may share a vendor/product
/// pair, so the bus name is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceKey {
    pub vendor_id: u16,
    pub product_id: u16,
    pub name: String,
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x}:{}",
            self.vendor_id, self.product_id, self.name
        )
    }
}

/// Connection identity: at most one logical connection is active per
/// vendor/product pair, regardless of how many physical entries exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionKey {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl ConnectionKey {
    /// Create a key from a vendor/product pair
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }
}

impl fmt::Display for ConnectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04x}:{:04x}", self.vendor_id, self.product_id)
    }
}

/// How a caller names the device it wants to act on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceSelector {
    /// Select by bus-assigned name/path
    Name(String),
    /// Select by vendor/product pair
    Ids { vendor_id: u16, product_id: u16 },
}

impl DeviceSelector {
    /// Select by vendor/product pair
    pub fn ids(vendor_id: u16, product_id: u16) -> Self {
        Self::Ids {
            vendor_id,
            product_id,
        }
    }

    /// Select by bus name
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// A selector is well-formed if it can name a real device at all
    pub fn is_well_formed(&self) -> bool {
        match self {
            Self::Name(name) => !name.is_empty(),
            Self::Ids {
                vendor_id,
                product_id,
            } => *vendor_id != 0 && *product_id != 0,
        }
    }

    /// Check whether a descriptor matches this selector
    pub fn matches(&self, device: &DeviceDescriptor) -> bool {
        match self {
            Self::Name(name) => device.name == *name,
            Self::Ids {
                vendor_id,
                product_id,
            } => device.vendor_id == *vendor_id && device.product_id == *product_id,
        }
    }
}

impl fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::Ids {
                vendor_id,
                product_id,
            } => write!(f, "{:04x}:{:04x}", vendor_id, product_id),
        }
    }
}
