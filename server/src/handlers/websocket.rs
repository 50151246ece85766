//! WebSocket handler for live save status.
//!
//! Streams every status change of one session to the client and answers
//! save, status and ping requests.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use crate::session::Session;
use crate::websocket::{ClientMessage, ServerMessage};

/// Handle an established WebSocket connection.
///
/// This function:
/// 1. Spawns a task that forwards outgoing messages to the socket
/// 2. Spawns a task that turns status changes into messages
/// 3. Processes incoming messages in a loop
/// 4. Cleans up on disconnect
pub async fn handle_websocket_connection(socket: WebSocket, session: Arc<Session>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    tracing::info!(session = %session.id(), "WebSocket client connected");

    // Spawn task to forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                        tracing::warn!("Failed to send WebSocket message: {}", e);
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to serialize WebSocket message: {}", e);
                }
            }
        }
    });

    // The current report goes out first, then every change.
    let mut reports = session.subscribe();
    let status_tx = tx.clone();
    let status_task = tokio::spawn(async move {
        loop {
            let report = reports.borrow_and_update().clone();
            if status_tx.send(ServerMessage::status(report)).is_err() {
                break;
            }
            if reports.changed().await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let response = process_message(&text, &session).await;
                let _ = tx.send(response);
            }
            Ok(Message::Binary(_)) => {
                tracing::warn!("Binary messages not supported");
            }
            Ok(Message::Ping(data)) => {
                tracing::trace!("Received ping: {} bytes", data.len());
            }
            Ok(Message::Pong(_)) => {
                tracing::trace!("Received pong");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(session = %session.id(), "WebSocket close frame received");
                break;
            }
            Err(e) => {
                tracing::warn!(session = %session.id(), "WebSocket error: {}", e);
                break;
            }
        }
    }

    status_task.abort();
    send_task.abort();

    tracing::info!(session = %session.id(), "WebSocket client disconnected");
}

/// Process a client message and return a server response.
async fn process_message(text: &str, session: &Session) -> ServerMessage {
    let client_msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            return ServerMessage::error(format!("Invalid message format: {}", e), None);
        }
    };

    match client_msg {
        ClientMessage::Status => ServerMessage::status(session.status()),
        ClientMessage::Save { request_id } => match session.save_now().await {
            Some(summary) => ServerMessage::Saved {
                summary,
                request_id,
            },
            None => ServerMessage::error("autosave is not active for this session", request_id),
        },
        ClientMessage::Ping => ServerMessage::Pong,
    }
}
