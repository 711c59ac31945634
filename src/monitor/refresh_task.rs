//! Background refresh loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use super::resource_monitor::ResourceMonitor;

/// Spawn the periodic capacity refresh.
///
/// The first tick fires immediately. Failures are logged and the next
/// attempt waits for the following tick.
#[must_use]
pub fn spawn_refresh_task(
    monitor: Arc<ResourceMonitor>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("refresh task shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = monitor.update().await {
                        error!(%err, "host stats refresh failed");
                    }
                }
            }
        }
    })
}
