#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use vdash_api::background::status_poller;
use vdash_api::config::{LogFormat, ServerConfig};
use vdash_api::router::build_app_router;
use vdash_api::state::AppState;
use vdash_api::ws::WsManager;
use vdash_core::downloads::{
    DownloadExecutor, DownloadJob, DownloadTracker, ExecutionOutcome, ProgressHandle,
};
use vdash_hub::{HubClient, ModelInventory};

/// Build a test `ServerConfig` rooted at `models_dir`.
///
/// The hub endpoint points at a closed local port; tests never reach it.
pub fn test_config(models_dir: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        models_dir: models_dir.to_path_buf(),
        hf_endpoint: "http://127.0.0.1:9".to_string(),
        hf_token: None,
        download_retention_secs: 3600,
        download_prune_interval_secs: 300,
        status_poll_interval_ms: 50,
        log_format: LogFormat::Pretty,
    }
}

/// Build the full application router around `executor`.
///
/// Returns the tracker as well so tests can inspect or shut it down.
pub fn build_test_app(
    models_dir: &Path,
    executor: Arc<dyn DownloadExecutor>,
) -> (Router, DownloadTracker) {
    build_test_app_with_config(test_config(models_dir), executor)
}

/// Same as [`build_test_app`] with a caller-supplied configuration.
pub fn build_test_app_with_config(
    config: ServerConfig,
    executor: Arc<dyn DownloadExecutor>,
) -> (Router, DownloadTracker) {
    let models_dir = config.models_dir.clone();
    let tracker = DownloadTracker::new(executor);
    let (_feed_tx, feed_rx) = status_poller::channel();

    let state = AppState {
        config: Arc::new(config.clone()),
        ws_manager: Arc::new(WsManager::new()),
        tracker: tracker.clone(),
        hub: HubClient::new(config.hf_endpoint.clone(), None),
        inventory: ModelInventory::new(models_dir).with_min_model_size(0),
        download_feed: feed_rx,
    };

    (build_app_router(state, &config), tracker)
}

// ---------------------------------------------------------------------------
// Fake executors
// ---------------------------------------------------------------------------

/// Starts the transfer into `{models_dir}/{model}` and holds it until
/// cancelled.
pub struct HoldingExecutor {
    pub models_dir: std::path::PathBuf,
}

#[async_trait]
impl DownloadExecutor for HoldingExecutor {
    async fn execute(
        &self,
        job: DownloadJob,
        progress: ProgressHandle,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        let target = self.models_dir.join(&job.model_name);
        if progress.begin("Downloading", Some(target.as_path())).await.is_err() {
            return ExecutionOutcome::Aborted;
        }
        let _ = progress.report(1024, "1 of 4 files").await;
        cancel.cancelled().await;
        ExecutionOutcome::Aborted
    }
}

/// Completes every job right away.
pub struct InstantExecutor;

#[async_trait]
impl DownloadExecutor for InstantExecutor {
    async fn execute(
        &self,
        _job: DownloadJob,
        progress: ProgressHandle,
        _cancel: CancellationToken,
    ) -> ExecutionOutcome {
        if progress.begin("Downloading", None).await.is_err() {
            return ExecutionOutcome::Aborted;
        }
        let _ = progress.report(2048, "All files downloaded").await;
        ExecutionOutcome::Completed { total_bytes: 2048 }
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn send(app: Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> Response<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.oneshot(request).await.unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::GET, uri, None).await
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::POST, uri, Some(body)).await
}

pub async fn post(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::POST, uri, None).await
}

pub async fn delete(app: Router, uri: &str) -> Response<Body> {
    send(app, Method::DELETE, uri, None).await
}

pub async fn delete_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    send(app, Method::DELETE, uri, Some(body)).await
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
