//! WebSocket dispatch loop for client connections
//!
//! Each accepted socket gets its own read loop plus a forwarder task that
//! drains the connection's outbound channel into the sink. Frame handling
//! awaits inline, so a long transcription or turn suspends only this
//! connection; other clients keep their own loops.

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt, StreamExt};

use super::ApiState;
use crate::pipeline;
use crate::protocol::{Inbound, Outbound};
use crate::registry::ConnectionId;

/// User-visible message sent when a recording cannot be transcribed
pub const TRANSCRIPTION_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't process that recording.";

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ws", get(ws_upgrade))
        .with_state(state)
}

/// Handle WebSocket upgrade request
async fn ws_upgrade(State(state): State<Arc<ApiState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle one WebSocket connection from accept to close
async fn handle_socket(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(32);
    let id = state.registry.connect(tx).await;

    // Forward frames from the connection's channel to the socket sink
    let mut send_task = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let recv_state = Arc::clone(&state);
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => dispatch_frame(&recv_state, id, &text).await,
                Message::Ping(data) => {
                    // axum answers pongs itself
                    tracing::trace!(len = data.len(), "received ping");
                }
                Message::Close(_) => {
                    tracing::info!(connection = %id, "WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.registry.disconnect(id).await;
}

/// Decode one inbound frame and route it to its handler
async fn dispatch_frame(state: &Arc<ApiState>, conn: ConnectionId, text: &str) {
    let frame: Inbound = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(connection = %conn, error = %e, "undecodable frame");
            pipeline::send_error(state, conn, &decode_failure_message(text, &e)).await;
            return;
        }
    };

    match frame {
        Inbound::Text { text } => {
            tracing::info!(connection = %conn, "received text message");
            pipeline::run_turn(state, conn, &text).await;
        }
        Inbound::Audio { audio } => handle_audio(state, conn, &audio).await,
        Inbound::Pair { esp_id } => {
            let session_id = state.pairings.pair(&esp_id, conn).await;
            if let Err(e) = state
                .registry
                .send(conn, &Outbound::Paired { session_id })
                .await
            {
                tracing::warn!(error = %e, connection = %conn, "pairing reply delivery failed");
            }
        }
    }
}

/// Decode failures are non-fatal; classify them for the client
///
/// A well-formed envelope with an unrecognized `type` gets an explicit
/// unsupported-type error instead of a generic parse message.
fn decode_failure_message(raw: &str, err: &serde_json::Error) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) {
        if let Some(kind) = value.get("type").and_then(|t| t.as_str()) {
            if !matches!(kind, "text" | "audio" | "pair") {
                return format!("unsupported message type: {kind}");
            }
        }
    }
    format!("invalid message: {err}")
}

/// Decode, transcribe, and run the audio path of a turn
async fn handle_audio(state: &Arc<ApiState>, conn: ConnectionId, audio: &str) {
    let bytes = match BASE64.decode(audio) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(connection = %conn, error = %e, "invalid audio payload");
            pipeline::send_error(state, conn, &format!("invalid audio payload: {e}")).await;
            return;
        }
    };

    tracing::info!(connection = %conn, audio_bytes = bytes.len(), "received audio message");

    let text = match state.transcriber.transcribe(&bytes).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(error = %e, connection = %conn, "transcription failed");
            pipeline::send_error(state, conn, TRANSCRIPTION_FAILURE_MESSAGE).await;
            return;
        }
    };

    pipeline::run_turn(state, conn, &text).await;
}
