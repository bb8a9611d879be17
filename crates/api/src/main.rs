use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vdash_api::background::{download_pruner, status_poller};
use vdash_api::config::{LogFormat, ServerConfig};
use vdash_api::router::build_app_router;
use vdash_api::state::AppState;
use vdash_api::ws;
use vdash_core::downloads::DownloadTracker;
use vdash_hub::{HubClient, HubExecutor, ModelInventory};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Configuration ---
    let config = ServerConfig::from_env().unwrap_or_else(|e| panic!("Invalid configuration: {e}"));

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "vdash_api=debug,vdash_core=debug,vdash_hub=debug,tower_http=debug".into()
    });
    match config.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
    tracing::info!(
        host = %config.host,
        port = config.port,
        models_dir = %config.models_dir.display(),
        hub = %config.hf_endpoint,
        "Loaded server configuration"
    );

    // --- Model hub and download tracker ---
    let hub = HubClient::new(config.hf_endpoint.clone(), config.hf_token.clone());
    let executor = Arc::new(HubExecutor::new(hub.clone(), config.models_dir.clone()));
    let tracker = DownloadTracker::new(executor);
    let inventory = ModelInventory::new(config.models_dir.clone());

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());
    let background_cancel = CancellationToken::new();
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager), background_cancel.clone());

    // --- Background jobs ---
    let (feed_tx, feed_rx) = status_poller::channel();
    let poller_handle = tokio::spawn(status_poller::run(
        tracker.clone(),
        Arc::clone(&ws_manager),
        feed_tx,
        config.status_poll_interval(),
        background_cancel.clone(),
    ));
    let pruner_handle = tokio::spawn(download_pruner::run(
        tracker.clone(),
        config.download_retention(),
        config.download_prune_interval(),
        background_cancel.clone(),
    ));
    tracing::info!("Background jobs started (status poller, download pruner, heartbeat)");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: Arc::clone(&ws_manager),
        tracker: tracker.clone(),
        hub,
        inventory,
        download_feed: feed_rx,
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    background_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), poller_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), pruner_handle).await;
    tracing::info!("Background jobs stopped");

    // Abort in-flight downloads and give executors time to clean up partial files.
    tracker.shutdown();
    let drained = tokio::time::timeout(config.shutdown_timeout(), async {
        while tracker.running_executions().await > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    })
    .await;
    match drained {
        Ok(()) => tracing::info!("Download executors stopped"),
        Err(_) => tracing::warn!(
            remaining = tracker.running_executions().await,
            "Download executors still running at shutdown deadline"
        ),
    }

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    let _ = heartbeat_handle.await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
