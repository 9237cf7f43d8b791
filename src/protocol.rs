//! Wire protocol for the `/ws` endpoint
//!
//! All frames are JSON text. Clients send [`Inbound`] frames; the relay
//! replies with [`Outbound`] frames and pushes unsolicited
//! [`ClientCommand`] frames (e.g. when a trigger device requests a
//! recording).

use serde::{Deserialize, Serialize};

/// Incoming WebSocket frame from a client
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    /// A line of user text to run through the pipeline
    Text { text: String },
    /// A base64-encoded audio recording to transcribe first
    Audio { audio: String },
    /// Bind a trigger device to this connection
    Pair { esp_id: String },
}

/// Outgoing WebSocket frame to a client
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outbound {
    /// One synthesized sentence
    Audio { audio: String, text: String },
    /// Turn- or frame-scoped failure, connection stays open
    Error { message: String },
    /// Pairing confirmation with the fresh session id
    Paired { session_id: String },
}

/// Unsolicited instruction fanned out to connected clients
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Begin capturing audio for the named session
    StartRecording {
        session_id: String,
        recording_id: String,
    },
}
