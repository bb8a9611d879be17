//! Handlers for local models and hub lookups.

use std::path::Path as FsPath;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use vdash_core::download_manager::validate_model_name;
use vdash_core::error::CoreError;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DeleteModelRequest {
    pub model_path: String,
}

/// GET /models -- models present in the models directory.
pub async fn list_models(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let models = state.inventory.list_models().await?;
    Ok(Json(DataResponse { data: models }))
}

/// DELETE /models -- remove a local model directory.
///
/// Refused while an active download is writing into the same directory.
pub async fn delete_model(
    State(state): State<AppState>,
    Json(input): Json<DeleteModelRequest>,
) -> AppResult<impl IntoResponse> {
    let requested = FsPath::new(&input.model_path);
    let target = if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        state.inventory.models_dir().join(requested)
    };
    let busy = state
        .tracker
        .registry()
        .list_active()
        .await
        .into_iter()
        .find(|task| {
            task.download_path
                .as_deref()
                .is_some_and(|p| FsPath::new(p).starts_with(&target) || target.starts_with(p))
        });
    if let Some(task) = busy {
        return Err(CoreError::Conflict(format!(
            "Model {} is still being downloaded (task {})",
            task.model_name, task.id
        ))
        .into());
    }

    state.inventory.delete_model(&input.model_path).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /models/validate/{*name} -- check a model id against the hub.
pub async fn validate_model(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    validate_model_name(&name)?;
    let validation = state.hub.validate_model(&name).await;
    Ok(Json(DataResponse { data: validation }))
}

/// GET /models/revisions/{*name} -- branches and tags of a hub model.
pub async fn model_revisions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<impl IntoResponse> {
    validate_model_name(&name)?;
    let revisions = state.hub.model_revisions(&name).await;
    Ok(Json(DataResponse { data: revisions }))
}
