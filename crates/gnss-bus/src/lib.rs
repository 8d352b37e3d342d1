//! GNSS Bus Contract Library
//!
//! This crate defines the low-level bus capability the connection engine
//! consumes: device descriptors and identity keys, the adapter and handle
//! traits, CDC/ACM control constants, and the table of USB vendors known to
//! ship GNSS hardware.
//!
//! The engine never talks to the platform bus directly; it goes through
//! [`BusAdapter`] so that real hosts and the simulation layer are
//! interchangeable.

pub mod adapter;
pub mod cdc;
pub mod descriptor;
pub mod error;
pub mod vendors;

pub use adapter::{BusAdapter, BusEvent, ControlTransfer, DeviceHandle};
pub use cdc::LineCoding;
pub use descriptor::{
    ConnectionKey, DeviceDescriptor, DeviceKey, DeviceSelector, InterfaceDescriptor,
};
pub use error::BusError;
