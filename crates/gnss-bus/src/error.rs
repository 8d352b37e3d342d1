//! Error types for bus adapters

use thiserror::Error;

/// Errors reported by a bus adapter or an open device handle
#[derive(Debug, Error)]
pub enum BusError {
    /// Failed to enumerate attached devices
    #[error("failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    /// The host denied or revoked access to the device
    #[error("access denied for {device}")]
    AccessDenied {
        /// Bus name of the device
        device: String,
    },

    /// The device is no longer attached
    #[error("device {0} disconnected")]
    Disconnected(String),

    /// A control transfer timed out
    #[error("control transfer timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// Low-level I/O failure
    #[error("bus I/O error: {0}")]
    Io(String),
}
