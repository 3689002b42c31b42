// WebSocket handler for live game streaming.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use tokio::sync::broadcast::error::RecvError;

use super::AppState;
use crate::metrics;

pub async fn ws_game(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(mut socket: WebSocket, state: AppState) {
    metrics::CONNECTED_WEBSOCKETS.inc();
    let mut rx = state.game_server.subscribe();

    // Late joiners get the latest field straight away.
    if let Some(snapshot) = state.game_server.snapshot_json() {
        if socket.send(Message::Text(snapshot.into())).await.is_err() {
            metrics::CONNECTED_WEBSOCKETS.dec();
            return;
        }
    }

    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(msg) => {
                        if socket.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(n)) => {
                        tracing::warn!("Spectator lagged, skipped {n} messages");
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    // Spectators are read-only
                    _ => {}
                }
            }
        }
    }

    metrics::CONNECTED_WEBSOCKETS.dec();
}
