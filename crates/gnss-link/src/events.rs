//! Outbound event stream
//!
//! All engine notifications (hot-plug, permission outcomes, lost
//! connections) are emitted through a single channel, so observers see a
//! consistent ordering without polling.

use std::fmt;

use gnss_bus::{ConnectionKey, DeviceDescriptor};
use serde::{Deserialize, Serialize};

/// Why a supervised connection was evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LostReason {
    /// Consecutive liveness probe failures exhausted the retry budget
    MaxRetriesExceeded,
    /// The heartbeat went stale and a revival attempt failed
    ConnectionTimeout,
}

impl fmt::Display for LostReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxRetriesExceeded => write!(f, "max retries exceeded"),
            Self::ConnectionTimeout => write!(f, "connection_timeout"),
        }
    }
}

/// Notifications emitted by the engine
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A valid device was plugged in
    DeviceAttached {
        /// Descriptor of the new device
        device: DeviceDescriptor,
    },

    /// A device was unplugged; any open connection for it was torn down
    DeviceDetached {
        /// Descriptor of the removed device
        device: DeviceDescriptor,
    },

    /// The supervisor evicted a connection
    ConnectionLost {
        /// Registry key of the evicted connection
        key: ConnectionKey,
        /// Why it was evicted
        reason: LostReason,
    },

    /// The host finished a permission prompt
    PermissionResult {
        /// Device the prompt was for
        device: DeviceDescriptor,
        /// Whether access was granted
        granted: bool,
    },
}

impl LinkEvent {
    /// Check if this is a hot-plug event
    pub fn is_hotplug(&self) -> bool {
        matches!(
            self,
            LinkEvent::DeviceAttached { .. } | LinkEvent::DeviceDetached { .. }
        )
    }

    /// Connection key, for events tied to a specific connection
    pub fn connection_key(&self) -> Option<ConnectionKey> {
        match self {
            LinkEvent::ConnectionLost { key, .. } => Some(*key),
            LinkEvent::DeviceAttached { device }
            | LinkEvent::DeviceDetached { device }
            | LinkEvent::PermissionResult { device, .. } => Some(device.connection_key()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lost_reasons_render_reference_codes() {
        assert_eq!(LostReason::MaxRetriesExceeded.to_string(), "max retries exceeded");
        assert_eq!(LostReason::ConnectionTimeout.to_string(), "connection_timeout");
    }

    #[test]
    fn connection_lost_exposes_its_key() {
        let event = LinkEvent::ConnectionLost {
            key: ConnectionKey::new(0x2c7c, 0x0125),
            reason: LostReason::MaxRetriesExceeded,
        };
        assert!(!event.is_hotplug());
        assert_eq!(event.connection_key(), Some(ConnectionKey::new(0x2c7c, 0x0125)));
    }
}
