//! Trigger endpoint for the hardware recording button
//!
//! The ESP32 posts here when its button is pressed; the relay looks up the
//! device's session and instructs clients to start recording. Fan-out goes
//! to every registered connection, not only the paired one; the companion
//! app filters on session id.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
};
use serde::Serialize;
use uuid::Uuid;

use super::ApiState;
use crate::protocol::ClientCommand;

/// Header carrying the trigger device's identifier
pub const DEVICE_ID_HEADER: &str = "ESP-Device-ID";

/// JSON status body returned by the trigger endpoint
#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
}

impl TriggerResponse {
    fn error(message: &str) -> Self {
        Self {
            status: "error",
            message: Some(message.to_string()),
            recording_id: None,
        }
    }

    const fn success(recording_id: String) -> Self {
        Self {
            status: "success",
            message: None,
            recording_id: Some(recording_id),
        }
    }
}

/// Build trigger router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/trigger", post(trigger))
        .with_state(state)
}

/// Start a recording for the device named in the `ESP-Device-ID` header
async fn trigger(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
) -> (StatusCode, Json<TriggerResponse>) {
    let Some(device_id) = headers.get(DEVICE_ID_HEADER).and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(TriggerResponse::error("No device ID provided")),
        );
    };

    let Some(session_id) = state.pairings.session_for(device_id).await else {
        tracing::warn!(device_id = %device_id, "trigger from unpaired device");
        return (
            StatusCode::NOT_FOUND,
            Json(TriggerResponse::error("Device not paired")),
        );
    };

    let recording_id = Uuid::new_v4().to_string();
    state
        .pairings
        .record_recording(&session_id, &recording_id)
        .await;

    let command = ClientCommand::StartRecording {
        session_id: session_id.clone(),
        recording_id: recording_id.clone(),
    };
    match state.registry.broadcast(&command).await {
        Ok(delivered) => tracing::info!(
            device_id = %device_id,
            session_id = %session_id,
            recording_id = %recording_id,
            delivered,
            "start_recording broadcast"
        ),
        Err(e) => tracing::error!(error = %e, "start_recording broadcast failed to encode"),
    }

    (StatusCode::OK, Json(TriggerResponse::success(recording_id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_omits_recording_id() {
        let json = serde_json::to_string(&TriggerResponse::error("Device not paired")).unwrap();
        assert_eq!(json, r#"{"status":"error","message":"Device not paired"}"#);
    }

    #[test]
    fn success_body_omits_message() {
        let json = serde_json::to_string(&TriggerResponse::success("rec-1".to_string())).unwrap();
        assert_eq!(json, r#"{"status":"success","recording_id":"rec-1"}"#);
    }
}
