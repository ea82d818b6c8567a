// src/live.rs
//
// Live-update relay. Holds the open WebSocket connections per user and
// pushes JSON events at them. Delivery is best-effort: no connection, no
// event, no queueing.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::{config::Config, error::AppError, utils::jwt::verify_jwt};

pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// A JSON event pushed to connected clients.
#[derive(Debug, Clone, Serialize)]
pub struct LiveEvent {
    pub event: String,
    pub payload: serde_json::Value,
}

impl LiveEvent {
    pub fn new(event: &str, payload: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            payload,
        }
    }
}

/// Manages all WebSocket connections. A user may hold several at once
/// (multiple tabs/devices).
#[derive(Clone, Default)]
pub struct LiveHub {
    connections: Arc<RwLock<HashMap<Uuid, ConnectionSender>>>,
    user_connections: Arc<RwLock<HashMap<i64, Vec<Uuid>>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new WebSocket connection for a user.
    pub async fn register(&self, connection_id: Uuid, user_id: i64, sender: ConnectionSender) {
        self.connections.write().await.insert(connection_id, sender);

        self.user_connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(connection_id);

        tracing::debug!("registered connection {} for user {}", connection_id, user_id);
    }

    /// Unregister a WebSocket connection.
    pub async fn unregister(&self, connection_id: Uuid) {
        self.connections.write().await.remove(&connection_id);

        let mut user_connections = self.user_connections.write().await;
        user_connections.retain(|_user_id, connections| {
            connections.retain(|&id| id != connection_id);
            !connections.is_empty()
        });

        tracing::debug!("unregistered connection {}", connection_id);
    }

    /// Push an event to every open connection of a user. Absence of a
    /// connection is not an error; a failed send only logs.
    pub async fn send_to_user(&self, user_id: i64, event: &LiveEvent) {
        let user_connections = self.user_connections.read().await;
        let Some(connection_ids) = user_connections.get(&user_id) else {
            return;
        };

        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("failed to serialize live event: {}", e);
                return;
            }
        };

        let connections = self.connections.read().await;
        for &connection_id in connection_ids {
            if let Some(sender) = connections.get(&connection_id) {
                if let Err(e) = sender.send(Message::Text(json.clone().into())) {
                    tracing::warn!("failed to push to connection {}: {}", connection_id, e);
                }
            }
        }
    }

    /// Whether a user currently has any open connection.
    pub async fn is_online(&self, user_id: i64) -> bool {
        self.user_connections
            .read()
            .await
            .get(&user_id)
            .is_some_and(|c| !c.is_empty())
    }

    /// (total connections, distinct connected users)
    pub async fn stats(&self) -> (usize, usize) {
        let connections = self.connections.read().await;
        let user_connections = self.user_connections.read().await;
        (connections.len(), user_connections.len())
    }
}

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

/// WebSocket entry point. Browsers cannot set an Authorization header on
/// the upgrade request, so the JWT arrives as a query parameter.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(config): State<Config>,
    State(hub): State<LiveHub>,
) -> Result<impl IntoResponse, AppError> {
    let claims = verify_jwt(&params.token, &config.jwt_secret)?;
    let user_id = claims.user_id();

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, hub, user_id)))
}

async fn handle_socket(socket: WebSocket, hub: LiveHub, user_id: i64) {
    let connection_id = Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    hub.register(connection_id, user_id, tx).await;

    // Writer: drain the per-connection channel into the socket.
    let mut writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    // Reader: the client does not speak upstream; we only watch for close.
    loop {
        tokio::select! {
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {} // ignore pings and stray frames
                }
            }
            _ = &mut writer => break,
        }
    }

    hub.unregister(connection_id).await;
}
