//! Route definitions for local models and hub lookups.
//!
//! ```text
//! GET    /                        list_models
//! DELETE /                        delete_model (body: { model_path })
//! GET    /validate/{*name}        validate_model
//! GET    /revisions/{*name}       model_revisions
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::models;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(models::list_models).delete(models::delete_model))
        .route("/validate/{*name}", get(models::validate_model))
        .route("/revisions/{*name}", get(models::model_revisions))
}
