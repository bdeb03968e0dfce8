//! Background retention sweep for terminal sessions
//!
//! Passive time-based cleanup: terminal sessions older than the retention
//! window are removed on an interval. This is not a cancellation signal -
//! idle active sessions are left alone.

use crate::services::store::TrackingStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Run the sweep loop until shutdown
pub async fn run_retention_sweep(
    store: Arc<TrackingStore>,
    interval_secs: u64,
    retention_ms: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    info!(interval_secs = interval_secs, retention_ms = retention_ms, "retention_sweep_started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let removed = store.sweep_terminal(retention_ms);
                if removed > 0 {
                    info!(removed = removed, "retention_sweep_removed");
                } else {
                    debug!("retention_sweep_noop");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("retention_sweep_shutdown");
                    return;
                }
            }
        }
    }
}
