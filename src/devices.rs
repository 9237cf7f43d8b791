//! Pairing table binding trigger devices to sessions
//!
//! A device id maps to at most one active session. Re-pairing the same
//! device replaces the binding and drops the superseded session, so the
//! session map cannot grow without bound across re-pairs.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::registry::ConnectionId;

/// One conversational/recording context owned by a paired device
#[derive(Debug, Clone)]
pub struct Session {
    /// Identifier of the trigger device that owns this session
    pub device_id: String,
    /// Recording ids in the order their start instructions were issued
    pub recordings: Vec<String>,
}

/// Binding between a trigger device, a client connection, and a session
#[derive(Debug, Clone)]
struct Binding {
    connection: ConnectionId,
    session_id: String,
}

#[derive(Debug, Default)]
struct PairingMaps {
    devices: HashMap<String, Binding>,
    sessions: HashMap<String, Session>,
}

/// Maps physical trigger devices to their paired connection and session
#[derive(Debug, Default)]
pub struct DevicePairings {
    inner: RwLock<PairingMaps>,
}

impl DevicePairings {
    /// Create an empty pairing table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `device_id` to `connection`, creating a fresh session
    ///
    /// Always succeeds. A prior binding for the same device is overwritten
    /// and its session is evicted. Returns the new session id.
    pub async fn pair(&self, device_id: &str, connection: ConnectionId) -> String {
        let session_id = Uuid::new_v4().to_string();
        let mut maps = self.inner.write().await;

        if let Some(previous) = maps.devices.insert(
            device_id.to_string(),
            Binding {
                connection,
                session_id: session_id.clone(),
            },
        ) {
            maps.sessions.remove(&previous.session_id);
            tracing::info!(
                device_id = %device_id,
                superseded_session = %previous.session_id,
                "re-pairing device, previous session evicted"
            );
        }

        maps.sessions.insert(
            session_id.clone(),
            Session {
                device_id: device_id.to_string(),
                recordings: Vec::new(),
            },
        );

        tracing::info!(device_id = %device_id, session_id = %session_id, connection = %connection, "device paired");
        session_id
    }

    /// Session id from the most recent `pair` for `device_id`, if any
    pub async fn session_for(&self, device_id: &str) -> Option<String> {
        self.inner
            .read()
            .await
            .devices
            .get(device_id)
            .map(|binding| binding.session_id.clone())
    }

    /// Connection currently paired with `device_id`, if any
    pub async fn connection_for(&self, device_id: &str) -> Option<ConnectionId> {
        self.inner
            .read()
            .await
            .devices
            .get(device_id)
            .map(|binding| binding.connection)
    }

    /// Append a recording id to the named session's history
    ///
    /// An unknown session id is a logged no-op, not an error.
    pub async fn record_recording(&self, session_id: &str, recording_id: &str) {
        let mut maps = self.inner.write().await;
        if let Some(session) = maps.sessions.get_mut(session_id) {
            session.recordings.push(recording_id.to_string());
        } else {
            tracing::warn!(session_id = %session_id, recording_id = %recording_id, "recording for unknown session dropped");
        }
    }

    /// Snapshot of the named session, if it exists
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.inner.read().await.sessions.get(session_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_issues_unique_session_ids() {
        let pairings = DevicePairings::new();
        let conn = ConnectionId::new();

        let a = pairings.pair("ESP32_001", conn).await;
        let b = pairings.pair("ESP32_002", conn).await;
        let c = pairings.pair("ESP32_001", conn).await;
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_ne!(b, c);
    }

    #[tokio::test]
    async fn session_for_returns_the_latest_binding() {
        let pairings = DevicePairings::new();
        let conn = ConnectionId::new();

        assert!(pairings.session_for("ESP32_001").await.is_none());

        let first = pairings.pair("ESP32_001", conn).await;
        assert_eq!(pairings.session_for("ESP32_001").await.unwrap(), first);

        let second = pairings.pair("ESP32_001", conn).await;
        assert_eq!(pairings.session_for("ESP32_001").await.unwrap(), second);
    }

    #[tokio::test]
    async fn re_pairing_evicts_the_superseded_session() {
        let pairings = DevicePairings::new();
        let conn = ConnectionId::new();

        let first = pairings.pair("ESP32_001", conn).await;
        let second = pairings.pair("ESP32_001", conn).await;

        assert!(pairings.session(&first).await.is_none());
        assert!(pairings.session(&second).await.is_some());
    }

    #[tokio::test]
    async fn recordings_accumulate_in_order() {
        let pairings = DevicePairings::new();
        let session_id = pairings.pair("ESP32_001", ConnectionId::new()).await;

        pairings.record_recording(&session_id, "rec-1").await;
        pairings.record_recording(&session_id, "rec-2").await;

        let session = pairings.session(&session_id).await.unwrap();
        assert_eq!(session.device_id, "ESP32_001");
        assert_eq!(session.recordings, vec!["rec-1", "rec-2"]);
    }

    #[tokio::test]
    async fn recording_for_unknown_session_is_a_no_op() {
        let pairings = DevicePairings::new();
        pairings.record_recording("no-such-session", "rec-1").await;
        assert!(pairings.session("no-such-session").await.is_none());
    }
}
