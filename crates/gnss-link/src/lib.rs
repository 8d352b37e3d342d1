//! GNSS Connection Lifecycle Engine
//!
//! This crate discovers USB GNSS receivers through a [`gnss_bus::BusAdapter`],
//! negotiates access permission, opens and configures a channel per device,
//! and supervises every open connection's health until it is closed, dies,
//! or the device is unplugged.
//!
//! # Architecture
//!
//! - **[`DeviceCatalog`]** caches the last-seen descriptor per device and
//!   rate-limits full bus enumeration.
//! - **[`ConnectionRegistry`]** holds one record per vendor/product pair;
//!   removal from the registry is the exactly-once teardown point.
//! - Two background tasks reconcile registry state: the **health
//!   supervisor** (liveness probes, bounded retries, stale revival,
//!   eviction) and the **heartbeat emitter** (keep-alive probes to stable
//!   connections).
//! - **[`LinkManager`]** is the caller-facing orchestrator; state-change
//!   notifications flow out as [`LinkEvent`]s over one channel.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gnss_bus::DeviceSelector;
//! use gnss_link::{LinkConfig, LinkManager};
//! use gnss_sim::VirtualBus;
//!
//! # async fn demo() {
//! let bus = Arc::new(VirtualBus::new());
//! let (manager, mut events) = LinkManager::new(bus, LinkConfig::default());
//!
//! let info = manager.open(&DeviceSelector::ids(0x1546, 0x01A8)).unwrap();
//! println!("claimed {} interface(s)", info.claimed_interface_count);
//!
//! while let Some(event) = events.recv().await {
//!     println!("engine event: {:?}", event);
//! }
//! # }
//! ```

pub mod catalog;
pub mod error;
pub mod events;
mod heartbeat;
pub mod manager;
mod probe;
pub mod registry;
mod supervisor;

pub use catalog::DeviceCatalog;
pub use error::LinkError;
pub use events::{LinkEvent, LostReason};
pub use manager::{
    ConnectionInfo, ConnectionStats, DeviceInfo, InterfaceInfo, LinkConfig, LinkManager,
    ProbeReport, ResetReport, SignalQuality,
};
pub use registry::{ConnectionRecord, ConnectionRegistry};
