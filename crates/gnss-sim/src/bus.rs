//! Virtual bus and devices
//!
//! Devices carry shared failure switches so a test can flip behavior while
//! the engine holds live handles, plus counters for asserting how often the
//! engine actually touched the bus.

use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use gnss_bus::{
    cdc, BusAdapter, BusError, ControlTransfer, DeviceDescriptor, DeviceHandle,
    InterfaceDescriptor, LineCoding,
};
use parking_lot::Mutex;
use tracing::debug;

/// Shared mutable state of one simulated device
#[derive(Debug, Default)]
struct DeviceState {
    permission: AtomicBool,
    open_fails: AtomicBool,
    claims_fail: AtomicBool,
    control_out_fails: AtomicBool,
    control_in_fails: AtomicBool,
    open_count: AtomicUsize,
    permission_requests: AtomicUsize,
    active_claims: AtomicIsize,
    control_out_count: AtomicUsize,
    control_in_count: AtomicUsize,
}

/// A simulated device attached to a [`VirtualBus`]
///
/// Clones share state, so a test can keep one clone to script failures and
/// read counters while the bus owns another.
#[derive(Debug, Clone)]
pub struct VirtualDevice {
    descriptor: DeviceDescriptor,
    state: Arc<DeviceState>,
}

impl VirtualDevice {
    /// Create a device with no interfaces; compose with the `with_*`
    /// builders. Permission starts granted.
    pub fn new(vendor_id: u16, product_id: u16, name: impl Into<String>) -> Self {
        let state = DeviceState {
            permission: AtomicBool::new(true),
            ..Default::default()
        };
        Self {
            descriptor: DeviceDescriptor {
                name: name.into(),
                vendor_id,
                product_id,
                device_class: 0x02,
                device_subclass: 0,
                device_protocol: 0,
                product: None,
                manufacturer: None,
                serial_number: None,
                interfaces: Vec::new(),
            },
            state: Arc::new(state),
        }
    }

    /// Add one interface with explicit class codes
    pub fn with_interface(mut self, class: u8, subclass: u8, protocol: u8, endpoint_count: u8) -> Self {
        let id = self.descriptor.interfaces.len() as u8;
        self.descriptor.interfaces.push(InterfaceDescriptor {
            id,
            class,
            subclass,
            protocol,
            endpoint_count,
        });
        self
    }

    /// Add a CDC/ACM communication interface
    pub fn with_cdc_interface(self) -> Self {
        self.with_interface(cdc::CLASS_COMM, cdc::SUBCLASS_ACM, 0x01, 1)
    }

    /// Add a CDC data interface
    pub fn with_data_interface(self) -> Self {
        self.with_interface(0x0A, 0, 0, 2)
    }

    /// Set the product string
    pub fn with_product(mut self, product: impl Into<String>) -> Self {
        self.descriptor.product = Some(product.into());
        self
    }

    /// Set the manufacturer string
    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.descriptor.manufacturer = Some(manufacturer.into());
        self
    }

    /// Start with access not granted
    pub fn without_permission(self) -> Self {
        self.state.permission.store(false, Ordering::Relaxed);
        self
    }

    /// The descriptor this device reports on enumeration
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Grant or revoke access
    pub fn set_permission(&self, granted: bool) {
        self.state.permission.store(granted, Ordering::Relaxed);
    }

    /// Make subsequent opens fail
    pub fn set_open_failing(&self, failing: bool) {
        self.state.open_fails.store(failing, Ordering::Relaxed);
    }

    /// Make interface claims fail
    pub fn set_claims_failing(&self, failing: bool) {
        self.state.claims_fail.store(failing, Ordering::Relaxed);
    }

    /// Make host-to-device control transfers fail (kills liveness probes
    /// and CDC configuration)
    pub fn set_probe_failing(&self, failing: bool) {
        self.state.control_out_fails.store(failing, Ordering::Relaxed);
    }

    /// Make device-to-host control transfers fail (kills heartbeats only)
    pub fn set_heartbeat_failing(&self, failing: bool) {
        self.state.control_in_fails.store(failing, Ordering::Relaxed);
    }

    /// How many times the device was opened
    pub fn open_count(&self) -> usize {
        self.state.open_count.load(Ordering::Relaxed)
    }

    /// How many permission prompts were fired for this device
    pub fn permission_requests(&self) -> usize {
        self.state.permission_requests.load(Ordering::Relaxed)
    }

    /// Claims currently outstanding across all handles
    pub fn active_claims(&self) -> isize {
        self.state.active_claims.load(Ordering::Relaxed)
    }

    /// Total host-to-device control transfers attempted
    pub fn control_out_count(&self) -> usize {
        self.state.control_out_count.load(Ordering::Relaxed)
    }

    /// Total device-to-host control transfers attempted
    pub fn control_in_count(&self) -> usize {
        self.state.control_in_count.load(Ordering::Relaxed)
    }
}

/// Handle to an open [`VirtualDevice`]
struct VirtualHandle {
    state: Arc<DeviceState>,
}

impl DeviceHandle for VirtualHandle {
    fn claim_interface(&self, _interface_id: u8) -> bool {
        if self.state.claims_fail.load(Ordering::Relaxed) {
            return false;
        }
        self.state.active_claims.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn release_interface(&self, _interface_id: u8) -> bool {
        self.state.active_claims.fetch_sub(1, Ordering::Relaxed);
        true
    }

    fn control_out(&self, transfer: &ControlTransfer, data: &[u8]) -> Result<usize, BusError> {
        self.state.control_out_count.fetch_add(1, Ordering::Relaxed);
        if self.state.control_out_fails.load(Ordering::Relaxed) {
            return Err(BusError::Timeout {
                timeout_ms: transfer.timeout.as_millis() as u64,
            });
        }
        Ok(data.len())
    }

    fn control_in(&self, transfer: &ControlTransfer, buf: &mut [u8]) -> Result<usize, BusError> {
        self.state.control_in_count.fetch_add(1, Ordering::Relaxed);
        if self.state.control_in_fails.load(Ordering::Relaxed) {
            return Err(BusError::Timeout {
                timeout_ms: transfer.timeout.as_millis() as u64,
            });
        }
        let coding = LineCoding::default().encode();
        let n = coding.len().min(buf.len());
        buf[..n].copy_from_slice(&coding[..n]);
        Ok(n)
    }
}

/// In-memory bus adapter holding a scriptable set of devices
#[derive(Default)]
pub struct VirtualBus {
    devices: Mutex<Vec<VirtualDevice>>,
    scan_count: AtomicUsize,
    enumeration_fails: AtomicBool,
}

impl VirtualBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a bus pre-populated with devices
    pub fn with_devices(devices: impl IntoIterator<Item = VirtualDevice>) -> Self {
        Self {
            devices: Mutex::new(devices.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Plug a device in
    pub fn attach(&self, device: VirtualDevice) {
        debug!(name = %device.descriptor.name, "virtual device attached");
        self.devices.lock().push(device);
    }

    /// Unplug every device matching the vendor/product pair
    pub fn detach(&self, vendor_id: u16, product_id: u16) {
        self.devices.lock().retain(|device| {
            device.descriptor.vendor_id != vendor_id || device.descriptor.product_id != product_id
        });
    }

    /// How many enumerations have been served
    pub fn scan_count(&self) -> usize {
        self.scan_count.load(Ordering::Relaxed)
    }

    /// Make enumeration fail
    pub fn set_enumeration_failing(&self, failing: bool) {
        self.enumeration_fails.store(failing, Ordering::Relaxed);
    }

    fn find(&self, descriptor: &DeviceDescriptor) -> Option<VirtualDevice> {
        self.devices
            .lock()
            .iter()
            .find(|device| device.descriptor.name == descriptor.name)
            .cloned()
    }
}

impl BusAdapter for VirtualBus {
    fn list_devices(&self) -> Result<Vec<DeviceDescriptor>, BusError> {
        self.scan_count.fetch_add(1, Ordering::Relaxed);
        if self.enumeration_fails.load(Ordering::Relaxed) {
            return Err(BusError::EnumerationFailed("simulated failure".to_string()));
        }
        Ok(self
            .devices
            .lock()
            .iter()
            .map(|device| device.descriptor.clone())
            .collect())
    }

    fn has_permission(&self, device: &DeviceDescriptor) -> bool {
        self.find(device)
            .map(|d| d.state.permission.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn request_permission(&self, device: &DeviceDescriptor) -> Result<(), BusError> {
        match self.find(device) {
            Some(d) => {
                d.state.permission_requests.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(BusError::Disconnected(device.name.clone())),
        }
    }

    fn open(&self, device: &DeviceDescriptor) -> Result<Box<dyn DeviceHandle>, BusError> {
        let found = self
            .find(device)
            .ok_or_else(|| BusError::Disconnected(device.name.clone()))?;

        if !found.state.permission.load(Ordering::Relaxed) {
            return Err(BusError::AccessDenied {
                device: device.name.clone(),
            });
        }
        if found.state.open_fails.load(Ordering::Relaxed) {
            return Err(BusError::Io("simulated open failure".to_string()));
        }

        found.state.open_count.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(VirtualHandle {
            state: found.state.clone(),
        }))
    }
}
