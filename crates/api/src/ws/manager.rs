use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use vdash_core::types::Timestamp;

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// One dashboard connection.
pub struct WsConnection {
    pub sender: WsSender,
    pub connected_at: Timestamp,
}

/// Typed event pushed to dashboard clients: `{ "type": ..., "data": ... }`.
#[derive(Debug, Serialize)]
pub struct WsEvent<'a, T: Serialize> {
    #[serde(rename = "type")]
    pub event_type: &'a str,
    pub data: T,
}

/// Manages all active WebSocket connections.
///
/// Designed to be wrapped in `Arc` and shared across the application.
#[derive(Default)]
pub struct WsManager {
    connections: RwLock<HashMap<Uuid, WsConnection>>,
}

impl WsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: Uuid) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            connected_at: chrono::Utc::now(),
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    pub async fn remove(&self, conn_id: &Uuid) {
        self.connections.write().await.remove(conn_id);
    }

    /// Send a message to every connection.
    ///
    /// Closed channels are skipped; their connections are removed when the
    /// receive loop notices the disconnect.
    pub async fn broadcast(&self, message: Message) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(message.clone());
        }
    }

    /// Serialise `data` as a typed event and broadcast it.
    ///
    /// Returns the number of connections addressed.
    pub async fn broadcast_event<T: Serialize>(&self, event_type: &str, data: T) -> usize {
        let text = match serde_json::to_string(&WsEvent { event_type, data }) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(event_type, error = %e, "Failed to serialise WebSocket event");
                return 0;
            }
        };
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Text(text.clone().into()));
        }
        conns.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}
