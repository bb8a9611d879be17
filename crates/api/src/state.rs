use std::sync::Arc;

use tokio::sync::watch;
use vdash_core::downloads::{DownloadSnapshot, DownloadTracker};
use vdash_hub::{HubClient, ModelInventory};

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Latest result of the shared download status poll.
pub type DownloadFeed = watch::Receiver<Arc<Vec<DownloadSnapshot>>>;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: every field is an `Arc` or a handle around one.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Browser WebSocket connections.
    pub ws_manager: Arc<WsManager>,
    /// The process-wide download tracker.
    pub tracker: DownloadTracker,
    /// Model hub metadata client.
    pub hub: HubClient,
    /// Models already present in the models directory.
    pub inventory: ModelInventory,
    /// Snapshots published by the status poller.
    pub download_feed: DownloadFeed,
}
