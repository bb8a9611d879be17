//! Periodic eviction of finished download tasks.
//!
//! Without it the registry grows by one entry per download for the life of
//! the process.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vdash_core::downloads::DownloadTracker;

/// Run the pruning loop until `cancel` is triggered.
///
/// Every `interval`, evicts terminal tasks that finished more than
/// `retention` ago.
pub async fn run(
    tracker: DownloadTracker,
    retention: Duration,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_secs = retention.as_secs(),
        interval_secs = interval.as_secs(),
        "Download pruner started"
    );

    let mut ticker = tokio::time::interval(interval);
    // The first tick fires immediately; nothing can be stale at startup.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Download pruner stopping");
                break;
            }
            _ = ticker.tick() => {
                let pruned = tracker.prune_terminal(retention).await;
                if pruned > 0 {
                    tracing::info!(pruned, "Download pruner: evicted finished tasks");
                } else {
                    tracing::debug!("Download pruner: nothing to evict");
                }
            }
        }
    }
}
