//! Connection orchestrator
//!
//! [`LinkManager`] is the public entry point: it coordinates the catalog,
//! the registry, and the bus adapter for open/close/query/reset operations,
//! and owns the two background tasks that keep registry state honest.
//!
//! Caller operations run synchronously on the calling context and may block
//! briefly on bus I/O; every bus call carries a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gnss_bus::{
    cdc, vendors, BusAdapter, BusError, BusEvent, ConnectionKey, ControlTransfer,
    DeviceDescriptor, DeviceKey, DeviceSelector, LineCoding,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::catalog::DeviceCatalog;
use crate::error::LinkError;
use crate::events::LinkEvent;
use crate::heartbeat::run_heartbeat;
use crate::registry::{ConnectionRecord, ConnectionRegistry};
use crate::supervisor::run_supervisor;

/// Outbound event channel depth
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Tunable intervals and budgets for the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Minimum time between full bus enumerations
    pub refresh_min_interval: Duration,
    /// Cadence of the health supervisor
    pub check_interval: Duration,
    /// Cadence of the heartbeat emitter
    pub heartbeat_interval: Duration,
    /// Heartbeat age beyond which a connection is considered stale
    pub connection_timeout: Duration,
    /// Consecutive probe failures tolerated before eviction
    pub max_retries: u32,
    /// Timeout for liveness-probe and heartbeat control transfers
    pub probe_timeout: Duration,
    /// Timeout for the one-time CDC configuration transfers
    pub setup_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            refresh_min_interval: Duration::from_millis(3000),
            check_interval: Duration::from_millis(5000),
            heartbeat_interval: Duration::from_millis(3000),
            connection_timeout: Duration::from_millis(15000),
            max_retries: 3,
            probe_timeout: Duration::from_millis(500),
            setup_timeout: Duration::from_millis(1000),
        }
    }
}

/// Catalog entry decorated with live state for callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Descriptor snapshot from the catalog
    pub descriptor: DeviceDescriptor,
    /// Whether the host currently grants access
    pub has_permission: bool,
    /// Whether a connection is open for this vendor/product pair
    pub is_open: bool,
    /// Whether the device is CDC/ACM-class serial
    pub is_cdc: bool,
    /// Vendor name, when the vendor id is a known GNSS supplier
    pub vendor_name: Option<String>,
    /// Whether the device looks like a GNSS source at all
    pub is_gnss_candidate: bool,
}

/// Per-interface slice of a [`ConnectionInfo`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub id: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub endpoint_count: u8,
    /// Whether this interface was claimed at open
    pub claimed: bool,
}

/// Result payload of a successful open
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub opened: bool,
    /// Bus name of the connected device
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub stable: bool,
    /// Last heartbeat, ms since the unix epoch
    pub last_heartbeat_ms: u64,
    pub claimed_interface_count: usize,
    pub is_cdc: bool,
    pub interfaces: Vec<InterfaceInfo>,
}

/// Coarse link quality derived from the stability flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalQuality {
    Good,
    Poor,
}

/// Statistics for one open connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub connection_duration_ms: u64,
    pub stable: bool,
    pub retry_count: u32,
    pub last_heartbeat_ms: u64,
    pub claimed_interface_count: usize,
    pub signal_quality: SignalQuality,
}

/// Outcome of a one-shot connection test
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeReport {
    pub success: bool,
    pub message: String,
}

/// Outcome of a reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetReport {
    pub success: bool,
    pub message: String,
}

/// State shared between the orchestrator and the background tasks
pub(crate) struct LinkShared {
    pub(crate) bus: Arc<dyn BusAdapter>,
    pub(crate) catalog: DeviceCatalog,
    pub(crate) registry: ConnectionRegistry,
    pub(crate) config: LinkConfig,
}

/// The connection lifecycle manager
pub struct LinkManager {
    shared: Arc<LinkShared>,
    event_tx: mpsc::Sender<LinkEvent>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl LinkManager {
    /// Create a manager over a bus adapter and start both background tasks.
    ///
    /// Must be called within a tokio runtime. Returns the manager and the
    /// receiving end of the outbound event stream.
    pub fn new(
        bus: Arc<dyn BusAdapter>,
        config: LinkConfig,
    ) -> (Self, mpsc::Receiver<LinkEvent>) {
        let shared = Arc::new(LinkShared {
            catalog: DeviceCatalog::new(bus.clone(), config.refresh_min_interval),
            registry: ConnectionRegistry::new(),
            config,
            bus,
        });

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let tasks = vec![
            tokio::spawn(run_supervisor(
                shared.clone(),
                event_tx.clone(),
                shutdown_rx.clone(),
            )),
            tokio::spawn(run_heartbeat(shared.clone(), shutdown_rx)),
        ];

        info!("connection manager started");
        (
            Self {
                shared,
                event_tx,
                shutdown_tx,
                tasks,
            },
            event_rx,
        )
    }

    /// List known devices, decorated with permission and open state
    pub fn list_devices(&self, force_refresh: bool) -> HashMap<DeviceKey, DeviceInfo> {
        self.shared
            .catalog
            .list_devices(force_refresh)
            .into_iter()
            .map(|(key, descriptor)| {
                let info = DeviceInfo {
                    has_permission: self.shared.bus.has_permission(&descriptor),
                    is_open: self.shared.registry.contains(&descriptor.connection_key()),
                    is_cdc: descriptor.is_cdc(),
                    vendor_name: vendors::vendor_name(descriptor.vendor_id).map(str::to_string),
                    is_gnss_candidate: vendors::is_potential_gnss_device(&descriptor),
                    descriptor,
                };
                (key, info)
            })
            .collect()
    }

    /// Whether the host currently grants access to the selected device
    pub fn check_permission(&self, selector: &DeviceSelector) -> bool {
        match self.shared.catalog.resolve(selector) {
            Some(device) => self.shared.bus.has_permission(&device),
            None => false,
        }
    }

    /// Ask the host for access to the selected device.
    ///
    /// Returns `Ok(true)` if access is already granted. Otherwise the prompt
    /// is fired and `Ok(false)` is returned; the outcome arrives later as a
    /// [`LinkEvent::PermissionResult`].
    pub fn request_permission(&self, selector: &DeviceSelector) -> Result<bool, LinkError> {
        if !selector.is_well_formed() {
            return Err(LinkError::InvalidArgument(selector.to_string()));
        }
        let device = self
            .shared
            .catalog
            .resolve(selector)
            .ok_or_else(|| LinkError::DeviceNotFound(selector.to_string()))?;

        if self.shared.bus.has_permission(&device) {
            return Ok(true);
        }
        if let Err(e) = self.shared.bus.request_permission(&device) {
            warn!(device = %device.name, "permission request failed: {}", e);
        }
        Ok(false)
    }

    /// Open a connection to the selected device.
    ///
    /// Idempotent against a stable existing connection for the same
    /// vendor/product pair; an unstable one is torn down and reopened.
    pub fn open(&self, selector: &DeviceSelector) -> Result<ConnectionInfo, LinkError> {
        if !selector.is_well_formed() {
            return Err(LinkError::InvalidArgument(selector.to_string()));
        }
        let device = self
            .shared
            .catalog
            .resolve(selector)
            .ok_or_else(|| LinkError::DeviceNotFound(selector.to_string()))?;

        if !self.shared.bus.has_permission(&device) {
            return Err(LinkError::PermissionDenied(device.name.clone()));
        }

        let key = device.connection_key();
        if let Some(existing) = self.shared.registry.get(&key) {
            if existing.is_stable() {
                debug!(%key, "device already connected and stable");
                return Ok(connection_info(&existing));
            }
            if let Some(stale) = self.shared.registry.remove(&key) {
                stale.teardown();
                debug!(%key, "removed unstable connection before reopen");
            }
        }

        let handle = self.shared.bus.open(&device).map_err(|e| match e {
            BusError::AccessDenied { .. } => LinkError::SecurityRejected(device.name.clone()),
            other => LinkError::ConnectionFailed {
                device: device.name.clone(),
                reason: other.to_string(),
            },
        })?;

        let mut claimed = Vec::new();
        for interface in &device.interfaces {
            if handle.claim_interface(interface.id) {
                debug!(device = %device.name, interface = interface.id, "claimed interface");
                claimed.push(interface.id);
            }
        }
        if claimed.is_empty() {
            // Dropping the handle closes the device.
            return Err(LinkError::NoInterfaceClaimed(device.name.clone()));
        }

        if device.is_cdc() {
            self.configure_cdc(handle.as_ref(), &device);
        }

        let record = Arc::new(ConnectionRecord::new(device.clone(), handle, claimed));
        let info = connection_info(&record);
        self.shared.registry.insert(key, record);
        info!(device = %device.name, %key, "opened connection");
        Ok(info)
    }

    /// Close the connection for a vendor/product pair.
    ///
    /// Always reports success; "not connected" is an equally valid outcome.
    pub fn close(&self, vendor_id: u16, product_id: u16) -> bool {
        let key = ConnectionKey::new(vendor_id, product_id);
        if let Some(record) = self.shared.registry.remove(&key) {
            record.teardown();
            info!(%key, "closed connection");
        }
        true
    }

    /// Whether a connection exists for the pair and is currently stable
    pub fn is_connected(&self, vendor_id: u16, product_id: u16) -> bool {
        self.shared
            .registry
            .get(&ConnectionKey::new(vendor_id, product_id))
            .is_some_and(|record| record.is_stable())
    }

    /// Caller-side heartbeat: refreshes the timestamp and restores the
    /// stable flag, independent of the supervisor's own checks.
    pub fn heartbeat_ack(&self, vendor_id: u16, product_id: u16) -> bool {
        match self
            .shared
            .registry
            .get(&ConnectionKey::new(vendor_id, product_id))
        {
            Some(record) => {
                record.touch();
                record.set_stable(true);
                true
            }
            None => false,
        }
    }

    /// One-shot open/claim/release/close probe that never persists a record
    pub fn test_connection(
        &self,
        vendor_id: u16,
        product_id: u16,
    ) -> Result<ProbeReport, LinkError> {
        let selector = DeviceSelector::ids(vendor_id, product_id);
        let device = self
            .shared
            .catalog
            .resolve(&selector)
            .ok_or_else(|| LinkError::DeviceNotFound(selector.to_string()))?;

        if !self.shared.bus.has_permission(&device) {
            return Err(LinkError::PermissionDenied(device.name.clone()));
        }

        let handle = match self.shared.bus.open(&device) {
            Ok(handle) => handle,
            Err(e) => {
                return Ok(ProbeReport {
                    success: false,
                    message: format!("failed to open device: {}", e),
                })
            }
        };

        let mut interface_claimed = false;
        for interface in &device.interfaces {
            if handle.claim_interface(interface.id) {
                interface_claimed = true;
                let _ = handle.release_interface(interface.id);
                break;
            }
        }
        // Handle drops here, closing the device.

        Ok(ProbeReport {
            success: interface_claimed,
            message: if interface_claimed {
                "device opened successfully".to_string()
            } else {
                "failed to claim interface".to_string()
            },
        })
    }

    /// Statistics for an open connection, if one exists for the pair
    pub fn statistics(&self, vendor_id: u16, product_id: u16) -> Option<ConnectionStats> {
        let record = self
            .shared
            .registry
            .get(&ConnectionKey::new(vendor_id, product_id))?;
        let stable = record.is_stable();
        Some(ConnectionStats {
            connection_duration_ms: record.duration_ms(),
            stable,
            retry_count: record.retry_count(),
            last_heartbeat_ms: record.last_heartbeat_ms(),
            claimed_interface_count: record.claimed_interfaces().len(),
            signal_quality: if stable {
                SignalQuality::Good
            } else {
                SignalQuality::Poor
            },
        })
    }

    /// Unconditionally close the connection and clear retry bookkeeping
    pub fn reset(&self, vendor_id: u16, product_id: u16) -> ResetReport {
        self.close(vendor_id, product_id);
        ResetReport {
            success: true,
            message: "connection reset".to_string(),
        }
    }

    /// Drop every catalog entry. Open connections are unaffected.
    pub fn clear_cache(&self) -> bool {
        self.shared.catalog.clear();
        true
    }

    /// Feed a host bus notification into the engine
    pub fn handle_bus_event(&self, event: BusEvent) {
        match event {
            BusEvent::Attached(device) => {
                if !device.is_valid() {
                    return;
                }
                info!(name = %device.name, "device attached");
                self.shared.catalog.apply_attached(&device);
                self.emit(LinkEvent::DeviceAttached { device });
            }
            BusEvent::Detached(device) => {
                info!(name = %device.name, "device detached");
                self.shared.catalog.apply_detached(&device);
                if let Some(record) = self.shared.registry.remove(&device.connection_key()) {
                    record.teardown();
                    debug!(key = %device.connection_key(), "closed connection of detached device");
                }
                self.emit(LinkEvent::DeviceDetached { device });
            }
            BusEvent::PermissionResult { device, granted } => {
                info!(name = %device.name, granted, "permission result");
                self.emit(LinkEvent::PermissionResult { device, granted });
            }
        }
    }

    /// Stop both background tasks and tear down every open connection.
    ///
    /// No probes fire after this returns.
    pub async fn shutdown(self) {
        info!("shutting down connection manager");
        let _ = self.shutdown_tx.send(true);
        for task in self.tasks {
            let _ = task.await;
        }
        for (key, _) in self.shared.registry.snapshot() {
            if let Some(record) = self.shared.registry.remove(&key) {
                record.teardown();
                debug!(%key, "closed connection on shutdown");
            }
        }
    }

    /// Best-effort serial setup for CDC devices: raise DTR, then set the
    /// default GNSS line coding. Failure is logged, never fatal.
    fn configure_cdc(&self, handle: &dyn gnss_bus::DeviceHandle, device: &DeviceDescriptor) {
        let line_state = ControlTransfer {
            request_type: cdc::REQUEST_TYPE_HOST_TO_INTERFACE,
            request: cdc::SET_CONTROL_LINE_STATE,
            value: cdc::CONTROL_LINE_DTR,
            index: 0,
            timeout: self.shared.config.setup_timeout,
        };
        if let Err(e) = handle.control_out(&line_state, &[]) {
            warn!(device = %device.name, "failed to set control line state: {}", e);
            return;
        }

        let set_coding = ControlTransfer {
            request_type: cdc::REQUEST_TYPE_HOST_TO_INTERFACE,
            request: cdc::SET_LINE_CODING,
            value: 0,
            index: 0,
            timeout: self.shared.config.setup_timeout,
        };
        match handle.control_out(&set_coding, &LineCoding::default().encode()) {
            Ok(_) => debug!(device = %device.name, "configured CDC device for serial communication"),
            Err(e) => warn!(device = %device.name, "failed to configure CDC device: {}", e),
        }
    }

    fn emit(&self, event: LinkEvent) {
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping notification");
        }
    }
}

/// Build the caller-facing payload for a record
fn connection_info(record: &ConnectionRecord) -> ConnectionInfo {
    let device = record.device();
    let interfaces = device
        .interfaces
        .iter()
        .map(|interface| InterfaceInfo {
            id: interface.id,
            class: interface.class,
            subclass: interface.subclass,
            protocol: interface.protocol,
            endpoint_count: interface.endpoint_count,
            claimed: record.claimed_interfaces().contains(&interface.id),
        })
        .collect();

    ConnectionInfo {
        opened: true,
        name: device.name.clone(),
        vendor_id: device.vendor_id,
        product_id: device.product_id,
        stable: record.is_stable(),
        last_heartbeat_ms: record.last_heartbeat_ms(),
        claimed_interface_count: record.claimed_interfaces().len(),
        is_cdc: device.is_cdc(),
        interfaces,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_reference_constants() {
        let config = LinkConfig::default();
        assert_eq!(config.refresh_min_interval, Duration::from_millis(3000));
        assert_eq!(config.check_interval, Duration::from_millis(5000));
        assert_eq!(config.heartbeat_interval, Duration::from_millis(3000));
        assert_eq!(config.connection_timeout, Duration::from_millis(15000));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.probe_timeout, Duration::from_millis(500));
    }

    #[test]
    fn signal_quality_serializes_as_reference_strings() {
        assert_eq!(
            serde_json::to_string(&SignalQuality::Good).unwrap(),
            "\"GOOD\""
        );
        assert_eq!(
            serde_json::to_string(&SignalQuality::Poor).unwrap(),
            "\"POOR\""
        );
    }
}
