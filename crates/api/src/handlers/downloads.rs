//! Handlers for the model download tracker.
//!
//! Starting a download only registers it; the transfer runs in the
//! background and its progress is observed by polling these endpoints or
//! through the WebSocket feed.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use vdash_core::downloads::{DownloadSnapshot, DownloadStatus, RemoveDecision};
use vdash_core::types::TaskId;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Upper bound for `GET /downloads/{id}/wait`.
const MAX_WAIT_SECS: u64 = 25;

/// Longest wait that still answers before the request timeout fires.
fn wait_limit(request_timeout_secs: u64) -> u64 {
    MAX_WAIT_SECS.min(request_timeout_secs.saturating_sub(1))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListDownloadsQuery {
    /// Only `pending` and `downloading` tasks.
    #[serde(default)]
    pub active_only: bool,
}

#[derive(Debug, Deserialize)]
pub struct CreateDownloadRequest {
    pub model_name: String,
    pub revision: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadCreatedResponse {
    pub task_id: TaskId,
    pub model_name: String,
    pub revision: String,
    pub status: DownloadStatus,
}

#[derive(Debug, Deserialize)]
pub struct WaitQuery {
    pub timeout_secs: Option<u64>,
}

// ---------------------------------------------------------------------------
// GET /downloads
// ---------------------------------------------------------------------------

/// List tracked downloads in registration order.
pub async fn list_downloads(
    State(state): State<AppState>,
    Query(params): Query<ListDownloadsQuery>,
) -> AppResult<impl IntoResponse> {
    let downloads = state.tracker.list_downloads(params.active_only).await;
    Ok(Json(DataResponse { data: downloads }))
}

// ---------------------------------------------------------------------------
// POST /downloads
// ---------------------------------------------------------------------------

/// Register a download and start it in the background.
pub async fn create_download(
    State(state): State<AppState>,
    Json(input): Json<CreateDownloadRequest>,
) -> AppResult<impl IntoResponse> {
    let task_id = state
        .tracker
        .start_download(&input.model_name, input.revision.as_deref())
        .await?;
    let snapshot = state.tracker.get_download(task_id).await?;

    let response = DownloadCreatedResponse {
        task_id,
        model_name: snapshot.model_name,
        revision: snapshot.revision,
        status: snapshot.status,
    };
    Ok((StatusCode::CREATED, Json(DataResponse { data: response })))
}

// ---------------------------------------------------------------------------
// GET /downloads/{id}
// ---------------------------------------------------------------------------

pub async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    let snapshot = state.tracker.get_download(id).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// GET /downloads/{id}/wait
// ---------------------------------------------------------------------------

/// Long-poll until the task is terminal or the timeout elapses, then
/// return its snapshot.
pub async fn wait_for_download(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Query(params): Query<WaitQuery>,
) -> AppResult<impl IntoResponse> {
    let limit = wait_limit(state.config.request_timeout_secs);
    let timeout = params.timeout_secs.unwrap_or(limit).min(limit);
    let snapshot = state
        .tracker
        .wait_for_terminal(id, Duration::from_secs(timeout))
        .await?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// POST /downloads/{id}/cancel
// ---------------------------------------------------------------------------

/// Request cancellation.
///
/// Answers `202 Accepted` with the current snapshot: `cancelled` for a task
/// that was still pending, `downloading` while a running transfer winds down.
pub async fn cancel_download(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<impl IntoResponse> {
    state.tracker.cancel_download(id).await?;
    let snapshot = state.tracker.get_download(id).await?;
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: snapshot })))
}

// ---------------------------------------------------------------------------
// DELETE /downloads/{id}
// ---------------------------------------------------------------------------

/// Forget a task, aborting it first if it is still running.
///
/// `204 No Content` when the task is gone. A running transfer answers
/// `202 Accepted` with its snapshot; the task disappears once the transfer
/// has stopped and cleaned up.
pub async fn remove_download(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<Response> {
    let response = match state.tracker.remove_download(id).await? {
        RemoveDecision::Removed(_) => StatusCode::NO_CONTENT.into_response(),
        RemoveDecision::Deferred(task) => {
            let data = DownloadSnapshot::from(&task);
            (StatusCode::ACCEPTED, Json(DataResponse { data })).into_response()
        }
    };
    Ok(response)
}
