//! Heartbeat emitter
//!
//! Periodic task that sends a minimal probe to every connection currently
//! believed stable, keeping the link from appearing idle to downstream
//! firmware. Failures are ignored; stability and retry state belong to the
//! supervisor alone.

use std::sync::Arc;

use gnss_bus::{cdc, ControlTransfer};
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

use crate::manager::LinkShared;

/// Run the heartbeat emitter until the shutdown signal flips
pub(crate) async fn run_heartbeat(shared: Arc<LinkShared>, mut shutdown: watch::Receiver<bool>) {
    let mut timer = interval(shared.config.heartbeat_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!("heartbeat emitter started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = timer.tick() => send_heartbeats(&shared),
        }
    }

    debug!("heartbeat emitter stopped");
}

fn send_heartbeats(shared: &LinkShared) {
    for (key, record) in shared.registry.snapshot() {
        if !record.is_stable() {
            continue;
        }
        if !record.device().is_cdc() {
            continue;
        }

        let transfer = ControlTransfer {
            request_type: cdc::REQUEST_TYPE_INTERFACE_TO_HOST,
            request: cdc::GET_LINE_CODING,
            value: 0,
            index: 0,
            timeout: shared.config.probe_timeout,
        };
        let mut buf = [0u8; cdc::LINE_CODING_LEN];
        if let Err(e) = record.handle().control_in(&transfer, &mut buf) {
            trace!(%key, "heartbeat transfer failed: {}", e);
        }
    }
}
