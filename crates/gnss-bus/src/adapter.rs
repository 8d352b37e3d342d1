//! Bus adapter contract
//!
//! The host provides enumeration, permission checks, and raw device access;
//! this module defines the traits the engine consumes for those
//! capabilities. Implementations wrap the platform bus (or a simulation).

use std::time::Duration;

use crate::descriptor::DeviceDescriptor;
use crate::error::BusError;

/// Parameters for one synchronous control transfer
#[derive(Debug, Clone, Copy)]
pub struct ControlTransfer {
    /// bmRequestType field
    pub request_type: u8,
    /// bRequest field
    pub request: u8,
    /// wValue field
    pub value: u16,
    /// wIndex field
    pub index: u16,
    /// Upper bound on how long the transfer may block
    pub timeout: Duration,
}

/// An open device, obtained from [`BusAdapter::open`]
///
/// The underlying bus handle is closed when the value is dropped.
pub trait DeviceHandle: Send + Sync {
    /// Claim exclusive access to one logical interface.
    ///
    /// Claiming an interface that is already claimed on this handle is
    /// expected to succeed again.
    fn claim_interface(&self, interface_id: u8) -> bool;

    /// Release a previously claimed interface. Best-effort; the return value
    /// may be ignored.
    fn release_interface(&self, interface_id: u8) -> bool;

    /// Perform a host-to-device control transfer, returning the number of
    /// bytes transferred.
    fn control_out(&self, transfer: &ControlTransfer, data: &[u8]) -> Result<usize, BusError>;

    /// Perform a device-to-host control transfer into `buf`, returning the
    /// number of bytes received.
    fn control_in(&self, transfer: &ControlTransfer, buf: &mut [u8]) -> Result<usize, BusError>;
}

/// Host bus capability consumed by the engine
pub trait BusAdapter: Send + Sync {
    /// Enumerate currently attached devices. May include entries that fail
    /// basic validity; the catalog filters those.
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, BusError>;

    /// Check whether access to the device is currently granted.
    fn has_permission(&self, device: &DeviceDescriptor) -> bool;

    /// Ask the host to prompt for access. The outcome arrives later as a
    /// [`BusEvent::PermissionResult`].
    fn request_permission(&self, device: &DeviceDescriptor) -> Result<(), BusError>;

    /// Open a raw handle to the device.
    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>, BusError>;
}

/// Asynchronous notifications delivered by the host bus
#[derive(Debug, Clone)]
pub enum BusEvent {
    /// A device was plugged in
    Attached(DeviceDescriptor),
    /// A device was unplugged
    Detached(DeviceDescriptor),
    /// The host finished a permission prompt
    PermissionResult {
        /// Device the prompt was for
        device: DeviceDescriptor,
        /// Whether access was granted
        granted: bool,
    },
}
