//! The single process-wide download status poll.
//!
//! Each tick reads the tracker once, publishes the result on a `watch`
//! channel, and pushes it to WebSocket clients. Every open dashboard view
//! shares this one poll instead of running its own timer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use vdash_core::downloads::{DownloadSnapshot, DownloadStatus, DownloadTracker};
use vdash_core::types::TaskId;

use crate::ws::WsManager;

/// WebSocket event type carrying the full snapshot list.
pub const SNAPSHOT_EVENT: &str = "downloads.snapshot";

/// Part of a snapshot that changes only when the task itself changes.
type Fingerprint = Vec<(TaskId, DownloadStatus, u64, String)>;

fn fingerprint(snapshots: &[DownloadSnapshot]) -> Fingerprint {
    snapshots
        .iter()
        .map(|s| (s.id, s.status, s.downloaded_bytes, s.progress.clone()))
        .collect()
}

/// Create the channel the poller publishes on.
pub fn channel() -> (
    watch::Sender<Arc<Vec<DownloadSnapshot>>>,
    watch::Receiver<Arc<Vec<DownloadSnapshot>>>,
) {
    watch::channel(Arc::new(Vec::new()))
}

/// Run the poll loop until `cancel` is triggered.
///
/// The cache is refreshed on every tick. Clients are only pushed to while a
/// download is active or when the task list changed since the last push, so
/// an idle dashboard does not receive identical frames forever.
pub async fn run(
    tracker: DownloadTracker,
    ws_manager: Arc<WsManager>,
    publisher: watch::Sender<Arc<Vec<DownloadSnapshot>>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_ms = interval.as_millis() as u64, "Download status poller started");

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_pushed: Option<Fingerprint> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Download status poller stopping");
                break;
            }
            _ = ticker.tick() => {
                let snapshots = tracker.list_downloads(false).await;
                let current = fingerprint(&snapshots);
                let any_active = snapshots.iter().any(|s| s.status.is_active());
                let snapshots = Arc::new(snapshots);
                publisher.send_replace(Arc::clone(&snapshots));

                if any_active || last_pushed.as_ref() != Some(&current) {
                    let sent = ws_manager
                        .broadcast_event(SNAPSHOT_EVENT, snapshots.as_slice())
                        .await;
                    tracing::trace!(clients = sent, tasks = snapshots.len(), "Pushed download snapshot");
                    last_pushed = Some(current);
                }
            }
        }
    }
}
