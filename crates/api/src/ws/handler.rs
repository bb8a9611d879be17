use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::background::status_poller::SNAPSHOT_EVENT;
use crate::state::{AppState, DownloadFeed};
use crate::ws::manager::{WsEvent, WsManager};

/// GET /api/v1/ws -- upgrade to a WebSocket that receives download
/// snapshot pushes.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.ws_manager, state.download_feed))
}

/// Manage a single WebSocket connection after upgrade.
///
/// The latest snapshot is sent right away so a new view does not wait for
/// the next poll; afterwards the connection only receives broadcasts.
async fn handle_socket(socket: WebSocket, ws_manager: Arc<WsManager>, feed: DownloadFeed) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id).await;
    let (mut sink, mut stream) = socket.split();

    let initial = {
        let snapshots = feed.borrow().clone();
        serde_json::to_string(&WsEvent {
            event_type: SNAPSHOT_EVENT,
            data: snapshots.as_slice(),
        })
    };
    if let Ok(text) = initial {
        if sink.send(Message::Text(text.into())).await.is_err() {
            ws_manager.remove(&conn_id).await;
            return;
        }
    }

    let sender_conn_id = conn_id;
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() || closing {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
