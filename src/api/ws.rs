//! Notification channel over WebSocket

use super::AppState;
use crate::types::ClientMessage;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tracing::{debug, info};

pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Forward broadcasts to the client and answer its ping/subscribe messages
/// until either side goes away.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let broadcaster = &state.pipeline.context().broadcaster;
    let (observer, mut notifications) = broadcaster.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            notification = notifications.recv() => {
                // None means the broadcaster dropped us
                let Some(notification) = notification else { break };
                let Ok(text) = serde_json::to_string(&notification) else { continue };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => continue,
                };

                let reply = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => message.reply(),
                    Err(e) => {
                        debug!(
                            observer = %observer,
                            error = %e,
                            "Ignoring unrecognised client message"
                        );
                        continue;
                    }
                };
                let Ok(text) = serde_json::to_string(&reply) else { continue };
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    }

    broadcaster.unsubscribe(&observer);
    info!(observer = %observer, "WebSocket closed");
}
