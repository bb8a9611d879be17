use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use vdash_core::error::{CoreError, TrackerError};
use vdash_hub::HubError;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain errors of the tracker, the hub client, and the core
/// crate. Implements [`IntoResponse`] to produce `{ "error", "code" }` JSON.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A synchronous download-tracker rejection.
    #[error(transparent)]
    Tracker(#[from] TrackerError),

    /// Hub or local model storage failure.
    #[error(transparent)]
    Hub(#[from] HubError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

const INTERNAL_MESSAGE: &str = "An internal error occurred";

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Tracker(err) => classify_tracker_error(err),
            AppError::Hub(err) => classify_hub_error(err),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
    }
}

/// Tracker rejections carry stable codes the dashboard switches on.
fn classify_tracker_error(err: &TrackerError) -> (StatusCode, &'static str, String) {
    let (status, code) = match err {
        TrackerError::DuplicateActiveDownload { .. } => (StatusCode::CONFLICT, "DUPLICATE_DOWNLOAD"),
        TrackerError::UnknownTask(_) => (StatusCode::NOT_FOUND, "UNKNOWN_TASK"),
        TrackerError::AlreadyTerminal(_) => (StatusCode::CONFLICT, "ALREADY_TERMINAL"),
        TrackerError::TerminalTaskImmutable(_) => (StatusCode::CONFLICT, "TERMINAL_TASK_IMMUTABLE"),
        TrackerError::InvalidTransition { .. } => (StatusCode::CONFLICT, "INVALID_TRANSITION"),
        TrackerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
        TrackerError::ShuttingDown => (StatusCode::SERVICE_UNAVAILABLE, "SHUTTING_DOWN"),
    };
    (status, code, err.to_string())
}

fn classify_hub_error(err: &HubError) -> (StatusCode, &'static str, String) {
    match err {
        HubError::Invalid(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        HubError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
        HubError::Api { .. } | HubError::Request(_) => {
            tracing::warn!(error = %err, "Model hub request failed");
            (StatusCode::BAD_GATEWAY, "HUB_ERROR", err.to_string())
        }
        HubError::Io(_) | HubError::Cancelled => {
            tracing::error!(error = %err, "Model storage error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                INTERNAL_MESSAGE.to_string(),
            )
        }
    }
}
