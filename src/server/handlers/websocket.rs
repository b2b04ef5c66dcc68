use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::server::state::AppState;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Fixed pause between samples; a slow tick pushes the schedule back
fn stream_ticker(interval_ms: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    let mut session = state.scorer.open_session();
    info!(
        "Client connected | Total: {}",
        state.scorer.connected_sessions()
    );

    let mut ticker = stream_ticker(state.scorer.config().interval_ms);

    loop {
        tokio::select! {
            // Score and push the next sample
            _ = ticker.tick() => {
                let payload = match session.tick() {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Session error: {}", e);
                        break;
                    }
                };
                let json = match serde_json::to_string(&payload) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!("Failed to encode payload: {}", e);
                        break;
                    }
                };
                if socket.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            // Client messages are ignored; close or error ends the session
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    drop(session);
    info!(
        "Client disconnected | Total: {}",
        state.scorer.connected_sessions()
    );
}
