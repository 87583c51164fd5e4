//! services/api/src/web/ws_handler.rs
//!
//! The live connection counter. Every open socket is counted and receives
//! `{"type":"connectionsCounter","value":N}` whenever the total changes.

use crate::web::{protocol::ServerMessage, state::AppState};
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// The handler for upgrading HTTP requests to WebSocket connections.
pub async fn ws_handler(ws: WebSocketUpgrade, State(app_state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe before counting ourselves so our own announcement arrives.
    let mut updates = app_state.live.subscribe();
    let total = app_state.live.connect();
    info!("WebSocket connected, {} open", total);

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(msg) => {
                    if send_json(&mut sender, &msg).await.is_err() {
                        debug!("Failed to push counter update, closing socket.");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Only the latest value matters; send it directly.
                    debug!("Counter subscriber lagged by {} messages", skipped);
                    let latest = ServerMessage::ConnectionsCounter {
                        value: app_state.live.connections(),
                    };
                    if send_json(&mut sender, &latest).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket error: {}", e);
                    break;
                }
            },
        }
    }

    let total = app_state.live.disconnect();
    info!("WebSocket closed, {} open", total);
}

async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> Result<(), axum::Error>
where
    S: futures::Sink<Message, Error = axum::Error> + Unpin,
{
    let json = serde_json::to_string(msg).map_err(axum::Error::new)?;
    sender.send(Message::Text(json.into())).await
}
