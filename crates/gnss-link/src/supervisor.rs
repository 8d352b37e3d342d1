//! Health supervisor
//!
//! Periodic task that re-verifies every open connection, applies the retry
//! budget, revives stale connections once, and evicts the dead. Evictions
//! are collected during the pass and applied after it, so the registry is
//! never mutated while being iterated.

use std::sync::Arc;

use gnss_bus::ConnectionKey;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};

use crate::events::{LinkEvent, LostReason};
use crate::manager::LinkShared;
use crate::probe::verify_connection_health;

/// Run the supervisor until the shutdown signal flips
pub(crate) async fn run_supervisor(
    shared: Arc<LinkShared>,
    event_tx: mpsc::Sender<LinkEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut timer = interval(shared.config.check_interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
    debug!("health supervisor started");

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = timer.tick() => {
                for (key, reason) in check_connections(&shared) {
                    // Exactly-once: a concurrent close/detach may have
                    // removed the record already, in which case nothing is
                    // torn down or reported here.
                    if let Some(record) = shared.registry.remove(&key) {
                        record.teardown();
                        warn!(%key, %reason, "connection evicted");
                        let _ = event_tx
                            .send(LinkEvent::ConnectionLost { key, reason })
                            .await;
                    }
                }
            }
        }
    }

    debug!("health supervisor stopped");
}

/// One supervision pass over the registry snapshot.
///
/// Probe failures only ever affect their own record; the pass always visits
/// every connection.
fn check_connections(shared: &LinkShared) -> Vec<(ConnectionKey, LostReason)> {
    let timeout_ms = shared.config.connection_timeout.as_millis() as u64;
    let mut evictions = Vec::new();

    for (key, record) in shared.registry.snapshot() {
        if record.heartbeat_age_ms() > timeout_ms {
            // Stale: one revival attempt decides between refresh and death.
            record.set_stable(false);
            if verify_connection_health(record.device(), record.handle(), shared.config.probe_timeout)
            {
                record.touch();
                record.set_stable(true);
                debug!(%key, "stale connection revived");
            } else {
                warn!(%key, "failed to revive stale connection");
                evictions.push((key, LostReason::ConnectionTimeout));
            }
        } else if verify_connection_health(
            record.device(),
            record.handle(),
            shared.config.probe_timeout,
        ) {
            record.record_success();
        } else {
            record.set_stable(false);
            let retries = record.record_failure();
            if retries > shared.config.max_retries {
                warn!(%key, "max retries exceeded");
                evictions.push((key, LostReason::MaxRetriesExceeded));
            } else {
                warn!(
                    %key,
                    retries,
                    max = shared.config.max_retries,
                    "connection unstable, retrying"
                );
            }
        }
    }

    evictions
}
