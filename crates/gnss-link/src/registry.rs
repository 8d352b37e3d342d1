//! Connection registry
//!
//! Tracks every open connection by its vendor/product key. A record exists
//! in the registry iff its bus handle is open and at least one interface is
//! claimed; removal from the map is the exactly-once point for teardown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use gnss_bus::{ConnectionKey, DeviceDescriptor, DeviceHandle};
use parking_lot::Mutex;
use tracing::debug;

/// Milliseconds since the unix epoch
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One open, supervised connection
///
/// Health fields are plain atomics: the supervisor, the heartbeat
/// acknowledgement path, and close may race on them, and lost updates
/// between those are benign. Removal from the registry map is what must be
/// exactly-once.
pub struct ConnectionRecord {
    device: DeviceDescriptor,
    handle: Box<dyn DeviceHandle>,
    claimed: Vec<u8>,
    opened_at_ms: u64,
    last_heartbeat_ms: AtomicU64,
    stable: AtomicBool,
    retry_count: AtomicU32,
}

impl ConnectionRecord {
    /// Create a record for a freshly opened handle with its claimed
    /// interface ids. Starts stable with a current heartbeat.
    pub fn new(device: DeviceDescriptor, handle: Box<dyn DeviceHandle>, claimed: Vec<u8>) -> Self {
        let now = now_millis();
        Self {
            device,
            handle,
            claimed,
            opened_at_ms: now,
            last_heartbeat_ms: AtomicU64::new(now),
            stable: AtomicBool::new(true),
            retry_count: AtomicU32::new(0),
        }
    }

    /// Descriptor snapshot the connection was opened against
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// The open bus handle
    pub fn handle(&self) -> &dyn DeviceHandle {
        self.handle.as_ref()
    }

    /// Interface ids claimed at open
    pub fn claimed_interfaces(&self) -> &[u8] {
        &self.claimed
    }

    /// Whether the last known health check or heartbeat succeeded
    pub fn is_stable(&self) -> bool {
        self.stable.load(Ordering::Acquire)
    }

    /// Set the stability flag
    pub fn set_stable(&self, stable: bool) {
        self.stable.store(stable, Ordering::Release);
    }

    /// Timestamp of the last heartbeat, ms since the unix epoch
    pub fn last_heartbeat_ms(&self) -> u64 {
        self.last_heartbeat_ms.load(Ordering::Acquire)
    }

    /// Refresh the heartbeat timestamp to now
    pub fn touch(&self) {
        self.last_heartbeat_ms.store(now_millis(), Ordering::Release);
    }

    /// Milliseconds since the last heartbeat
    pub fn heartbeat_age_ms(&self) -> u64 {
        now_millis().saturating_sub(self.last_heartbeat_ms())
    }

    /// Milliseconds since the connection was opened
    pub fn duration_ms(&self) -> u64 {
        now_millis().saturating_sub(self.opened_at_ms)
    }

    /// Current consecutive-failure count
    pub fn retry_count(&self) -> u32 {
        self.retry_count.load(Ordering::Acquire)
    }

    /// Record a probe failure; returns the incremented count
    pub fn record_failure(&self) -> u32 {
        self.retry_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Record a probe success: stable again, failure count cleared
    pub fn record_success(&self) {
        self.retry_count.store(0, Ordering::Release);
        self.set_stable(true);
    }

    /// Release every claimed interface, best-effort. Called exactly once by
    /// whichever path removed the record from the registry; the handle
    /// itself closes when the record is dropped.
    pub fn teardown(&self) {
        for &interface_id in &self.claimed {
            if !self.handle.release_interface(interface_id) {
                debug!(
                    device = %self.device.name,
                    interface_id,
                    "interface release failed during teardown"
                );
            }
        }
    }
}

/// The set of currently open connections
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: Mutex<HashMap<ConnectionKey, Arc<ConnectionRecord>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, replacing any previous one for the key
    pub fn insert(&self, key: ConnectionKey, record: Arc<ConnectionRecord>) {
        self.inner.lock().insert(key, record);
    }

    /// Look up the record for a key
    pub fn get(&self, key: &ConnectionKey) -> Option<Arc<ConnectionRecord>> {
        self.inner.lock().get(key).cloned()
    }

    /// Remove the record for a key.
    ///
    /// Exactly-once semantics: of two concurrent removals, one gets the
    /// record (and must call [`ConnectionRecord::teardown`]); the other
    /// observes `None` and does nothing.
    pub fn remove(&self, key: &ConnectionKey) -> Option<Arc<ConnectionRecord>> {
        self.inner.lock().remove(key)
    }

    /// Whether a record exists for the key
    pub fn contains(&self, key: &ConnectionKey) -> bool {
        self.inner.lock().contains_key(key)
    }

    /// Keys and records at this instant, for iteration without holding the
    /// map lock across bus I/O
    pub fn snapshot(&self) -> Vec<(ConnectionKey, Arc<ConnectionRecord>)> {
        self.inner
            .lock()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }

    /// Number of open connections
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no connections are open
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss_bus::{BusError, ControlTransfer};

    struct NullHandle;

    impl DeviceHandle for NullHandle {
        fn claim_interface(&self, _interface_id: u8) -> bool {
            true
        }
        fn release_interface(&self, _interface_id: u8) -> bool {
            true
        }
        fn control_out(&self, _t: &ControlTransfer, _data: &[u8]) -> Result<usize, BusError> {
            Ok(0)
        }
        fn control_in(&self, _t: &ControlTransfer, _buf: &mut [u8]) -> Result<usize, BusError> {
            Ok(0)
        }
    }

    fn record() -> Arc<ConnectionRecord> {
        let device = DeviceDescriptor {
            name: "/dev/bus/usb/001/002".to_string(),
            vendor_id: 0x2c7c,
            product_id: 0x0125,
            device_class: 0x02,
            device_subclass: 0,
            device_protocol: 0,
            product: None,
            manufacturer: None,
            serial_number: None,
            interfaces: Vec::new(),
        };
        Arc::new(ConnectionRecord::new(device, Box::new(NullHandle), vec![0]))
    }

    #[test]
    fn removal_is_exactly_once() {
        let registry = ConnectionRegistry::new();
        let key = ConnectionKey::new(0x2c7c, 0x0125);
        registry.insert(key, record());

        assert!(registry.remove(&key).is_some());
        assert!(registry.remove(&key).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn failure_and_success_counters() {
        let rec = record();
        assert!(rec.is_stable());
        assert_eq!(rec.retry_count(), 0);

        assert_eq!(rec.record_failure(), 1);
        assert_eq!(rec.record_failure(), 2);
        rec.set_stable(false);

        rec.record_success();
        assert_eq!(rec.retry_count(), 0);
        assert!(rec.is_stable());
    }

    #[test]
    fn touch_refreshes_heartbeat_age() {
        let rec = record();
        rec.touch();
        assert!(rec.heartbeat_age_ms() < 1000);
    }
}
