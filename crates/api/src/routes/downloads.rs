//! Route definitions for the download tracker.
//!
//! ```text
//! GET    /                    list_downloads (?active_only=true)
//! POST   /                    create_download
//! GET    /{id}                get_download
//! DELETE /{id}                remove_download
//! POST   /{id}/cancel         cancel_download
//! GET    /{id}/wait           wait_for_download (?timeout_secs=N)
//! ```

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::downloads;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(downloads::list_downloads).post(downloads::create_download),
        )
        .route(
            "/{id}",
            get(downloads::get_download).delete(downloads::remove_download),
        )
        .route("/{id}/cancel", post(downloads::cancel_download))
        .route("/{id}/wait", get(downloads::wait_for_download))
}
