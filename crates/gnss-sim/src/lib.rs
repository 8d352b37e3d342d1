//! GNSS Bus Simulation Library
//!
//! This crate provides a simulation layer for testing the connection engine
//! without physical hardware:
//!
//! - **[`VirtualBus`]**: an in-memory [`gnss_bus::BusAdapter`] with
//!   pluggable devices and enumeration counters
//! - **[`VirtualDevice`]**: a scriptable device whose permission, open,
//!   claim, and control-transfer behavior can be flipped mid-test
//!
//! # Example
//!
//! ```rust
//! use gnss_bus::BusAdapter;
//! use gnss_sim::{VirtualBus, VirtualDevice};
//!
//! let receiver = VirtualDevice::new(0x1546, 0x01A8, "/dev/bus/usb/001/002")
//!     .with_cdc_interface()
//!     .with_data_interface()
//!     .with_product("NEO-M8N");
//!
//! let bus = VirtualBus::with_devices([receiver.clone()]);
//! assert_eq!(bus.list_devices().unwrap().len(), 1);
//!
//! // Later, simulate the device going silent:
//! receiver.set_probe_failing(true);
//! ```

pub mod bus;

pub use bus::{VirtualBus, VirtualDevice};
