//! Device catalog
//!
//! Caches the last-seen descriptor per device identity so callers can list
//! and resolve devices without hammering the bus. A full re-enumeration runs
//! at most once per refresh interval; attach/detach notifications update the
//! cache incrementally in between.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use gnss_bus::{BusAdapter, DeviceDescriptor, DeviceKey, DeviceSelector};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// Cache of attached-device descriptors keyed by identity
pub struct DeviceCatalog {
    bus: Arc<dyn BusAdapter>,
    cache: Mutex<HashMap<DeviceKey, DeviceDescriptor>>,
    last_refresh: Mutex<Option<Instant>>,
    // Checked-and-set so concurrent callers ride on one in-flight refresh
    refreshing: AtomicBool,
    min_interval: Duration,
}

impl DeviceCatalog {
    /// Create a catalog over a bus adapter with the given refresh gate
    pub fn new(bus: Arc<dyn BusAdapter>, min_interval: Duration) -> Self {
        Self {
            bus,
            cache: Mutex::new(HashMap::new()),
            last_refresh: Mutex::new(None),
            refreshing: AtomicBool::new(false),
            min_interval,
        }
    }

    /// List known devices.
    ///
    /// Returns the cached snapshot unless `force_refresh` is set or the
    /// refresh gate has elapsed; a caller racing an in-flight refresh also
    /// gets the previous snapshot rather than a second enumeration.
    pub fn list_devices(&self, force_refresh: bool) -> HashMap<DeviceKey, DeviceDescriptor> {
        if !force_refresh && !self.gate_elapsed() {
            return self.snapshot();
        }

        if self.refreshing.swap(true, Ordering::AcqRel) {
            debug!("enumeration already in flight, serving cached snapshot");
            return self.snapshot();
        }

        self.refresh();
        self.refreshing.store(false, Ordering::Release);
        self.snapshot()
    }

    /// Resolve a selector against the catalog, refreshing if the gate allows
    pub fn resolve(&self, selector: &DeviceSelector) -> Option<DeviceDescriptor> {
        self.list_devices(false)
            .into_values()
            .find(|device| selector.matches(device))
    }

    /// Apply an attach notification, outside the timed refresh path
    pub fn apply_attached(&self, device: &DeviceDescriptor) {
        if !device.is_valid() {
            debug!(name = %device.name, "ignoring attach of invalid device");
            return;
        }
        self.cache
            .lock()
            .insert(device.device_key(), device.clone());
    }

    /// Apply a detach notification: drop entries matching the bus name or
    /// the vendor/product pair.
    pub fn apply_detached(&self, device: &DeviceDescriptor) {
        self.cache.lock().retain(|key, cached| {
            cached.name != device.name
                && !(key.vendor_id == device.vendor_id && key.product_id == device.product_id)
        });
    }

    /// Drop every cached entry
    pub fn clear(&self) {
        self.cache.lock().clear();
        *self.last_refresh.lock() = None;
    }

    fn gate_elapsed(&self) -> bool {
        match *self.last_refresh.lock() {
            Some(at) => at.elapsed() >= self.min_interval,
            None => true,
        }
    }

    fn refresh(&self) {
        let devices = match self.bus.list_devices() {
            Ok(devices) => devices,
            Err(e) => {
                warn!("device enumeration failed: {}", e);
                return;
            }
        };

        let mut valid = 0usize;
        {
            let mut cache = self.cache.lock();
            for device in devices {
                if !device.is_valid() {
                    continue;
                }
                valid += 1;
                cache.insert(device.device_key(), device);
            }
        }
        *self.last_refresh.lock() = Some(Instant::now());
        info!("enumerated {} device(s)", valid);
    }

    fn snapshot(&self) -> HashMap<DeviceKey, DeviceDescriptor> {
        self.cache.lock().clone()
    }
}
