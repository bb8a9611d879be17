pub mod downloads;
pub mod health;
pub mod models;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                  WebSocket (download snapshots)
///
/// /downloads                           list, start
/// /downloads/{id}                      get, remove
/// /downloads/{id}/cancel               cancel (POST)
/// /downloads/{id}/wait                 long-poll until terminal
///
/// /models                              list local, delete local
/// /models/validate/{*name}             check a hub model id
/// /models/revisions/{*name}            branches and tags of a hub model
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/downloads", downloads::router())
        .nest("/models", models::router())
}
