//! Liveness probe
//!
//! A cheap, non-destructive check that an open connection still answers:
//! claim any one interface and release it, plus a short class transfer for
//! CDC devices. Must not disturb data in flight.

use std::time::Duration;

use gnss_bus::{cdc, ControlTransfer, DeviceDescriptor, DeviceHandle};
use tracing::trace;

/// Verify that a connection is still healthy.
///
/// The transient claim here is released before returning and never touches
/// the record's claimed-interface list.
pub(crate) fn verify_connection_health(
    device: &DeviceDescriptor,
    handle: &dyn DeviceHandle,
    probe_timeout: Duration,
) -> bool {
    let mut interface_claimed = false;
    for interface in &device.interfaces {
        if handle.claim_interface(interface.id) {
            interface_claimed = true;
            let _ = handle.release_interface(interface.id);
            break;
        }
    }

    if !interface_claimed {
        trace!(device = %device.name, "probe could not claim any interface");
        return false;
    }

    // CDC devices also get a zero-length line-coding request; a response
    // without an error counts as alive.
    if device.is_cdc() {
        let transfer = ControlTransfer {
            request_type: cdc::REQUEST_TYPE_HOST_TO_INTERFACE,
            request: cdc::SET_LINE_CODING,
            value: 0,
            index: 0,
            timeout: probe_timeout,
        };
        match handle.control_out(&transfer, &[]) {
            Ok(_) => true,
            Err(e) => {
                trace!(device = %device.name, "probe control transfer failed: {}", e);
                false
            }
        }
    } else {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gnss_bus::{BusError, InterfaceDescriptor};
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    #[derive(Default)]
    struct StubHandle {
        claim_fails: AtomicBool,
        control_fails: AtomicBool,
        outstanding_claims: AtomicI32,
    }

    impl DeviceHandle for StubHandle {
        fn claim_interface(&self, _interface_id: u8) -> bool {
            if self.claim_fails.load(Ordering::Relaxed) {
                return false;
            }
            self.outstanding_claims.fetch_add(1, Ordering::Relaxed);
            true
        }
        fn release_interface(&self, _interface_id: u8) -> bool {
            self.outstanding_claims.fetch_sub(1, Ordering::Relaxed);
            true
        }
        fn control_out(&self, _t: &ControlTransfer, _data: &[u8]) -> Result<usize, BusError> {
            if self.control_fails.load(Ordering::Relaxed) {
                Err(BusError::Timeout { timeout_ms: 500 })
            } else {
                Ok(0)
            }
        }
        fn control_in(&self, _t: &ControlTransfer, _buf: &mut [u8]) -> Result<usize, BusError> {
            Ok(0)
        }
    }

    fn device(cdc_class: bool) -> DeviceDescriptor {
        let (class, subclass) = if cdc_class {
            (cdc::CLASS_COMM, cdc::SUBCLASS_ACM)
        } else {
            (0x0A, 0)
        };
        DeviceDescriptor {
            name: "/dev/bus/usb/001/002".to_string(),
            vendor_id: 0x1546,
            product_id: 0x01A8,
            device_class: 0x02,
            device_subclass: 0,
            device_protocol: 0,
            product: None,
            manufacturer: None,
            serial_number: None,
            interfaces: vec![InterfaceDescriptor {
                id: 0,
                class,
                subclass,
                protocol: 0,
                endpoint_count: 1,
            }],
        }
    }

    #[test]
    fn non_cdc_passes_on_claim_alone() {
        let handle = StubHandle::default();
        assert!(verify_connection_health(
            &device(false),
            &handle,
            Duration::from_millis(500)
        ));
    }

    #[test]
    fn claim_failure_fails_the_probe() {
        let handle = StubHandle::default();
        handle.claim_fails.store(true, Ordering::Relaxed);
        assert!(!verify_connection_health(
            &device(false),
            &handle,
            Duration::from_millis(500)
        ));
    }

    #[test]
    fn cdc_control_failure_fails_the_probe() {
        let handle = StubHandle::default();
        handle.control_fails.store(true, Ordering::Relaxed);
        assert!(!verify_connection_health(
            &device(true),
            &handle,
            Duration::from_millis(500)
        ));
    }

    #[test]
    fn probe_claim_is_always_released() {
        let handle = StubHandle::default();

        assert!(verify_connection_health(
            &device(true),
            &handle,
            Duration::from_millis(500)
        ));
        assert_eq!(handle.outstanding_claims.load(Ordering::Relaxed), 0);

        handle.control_fails.store(true, Ordering::Relaxed);
        assert!(!verify_connection_health(
            &device(true),
            &handle,
            Duration::from_millis(500)
        ));
        assert_eq!(handle.outstanding_claims.load(Ordering::Relaxed), 0);
    }
}
