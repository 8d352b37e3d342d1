//! Error types for the connection engine

use thiserror::Error;

/// Errors surfaced to callers of the orchestrator
#[derive(Debug, Error)]
pub enum LinkError {
    /// No attached device matches the selector
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// The host has not granted access to the device
    #[error("no permission to access device {0}")]
    PermissionDenied(String),

    /// The bus adapter refused to open the device
    #[error("failed to open device {device}: {reason}")]
    ConnectionFailed {
        /// Bus name of the device
        device: String,
        /// Adapter-reported reason
        reason: String,
    },

    /// The device opened but no interface could be claimed
    #[error("no interfaces could be claimed on {0}")]
    NoInterfaceClaimed(String),

    /// The selector cannot name a real device
    #[error("invalid device selector: {0}")]
    InvalidArgument(String),

    /// Access was revoked at the host layer
    #[error("access rejected by the host for {0}")]
    SecurityRejected(String),
}
