//! Registry of live client connections
//!
//! The registry is the single source of truth for which connections are
//! currently reachable. Each connection registers a bounded sender feeding
//! its socket-forwarder task; delivery to a closed or unknown connection is
//! reported as an error to the caller, never propagated as a panic.

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::{Error, Result};

/// Opaque identity of one live connection, used for routing and logging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh connection id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Tracks all live connections and fans frames out to them
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<String>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection and return its id
    ///
    /// `sender` feeds the connection's forwarder task, which owns the
    /// actual WebSocket sink.
    pub async fn connect(&self, sender: mpsc::Sender<String>) -> ConnectionId {
        let id = ConnectionId::new();
        self.connections.write().await.insert(id, sender);
        tracing::info!(connection = %id, "client connected");
        id
    }

    /// Remove a connection from the registry
    ///
    /// Idempotent: removing an unknown or already-removed id is a no-op.
    pub async fn disconnect(&self, id: ConnectionId) {
        if self.connections.write().await.remove(&id).is_some() {
            tracing::info!(connection = %id, "client disconnected");
        }
    }

    /// Number of currently registered connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: ConnectionId) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Serialize `frame` and deliver it to one connection
    ///
    /// # Errors
    ///
    /// Returns [`Error::Delivery`] if the connection is unknown or its
    /// channel has closed, and [`Error::Serialization`] if the frame cannot
    /// be encoded.
    pub async fn send<T: Serialize>(&self, id: ConnectionId, frame: &T) -> Result<()> {
        let text = serde_json::to_string(frame)?;
        let sender = self
            .connections
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::Delivery(format!("unknown connection {id}")))?;

        sender
            .send(text)
            .await
            .map_err(|_| Error::Delivery(format!("connection {id} closed")))
    }

    /// Serialize `frame` and deliver it to every registered connection
    ///
    /// Fans out over a snapshot of the membership, so a concurrent
    /// disconnect cannot corrupt the iteration. A failed delivery to one
    /// connection is logged and skipped; the remainder still receive the
    /// frame. Returns the number of successful deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the frame cannot be encoded.
    pub async fn broadcast<T: Serialize>(&self, frame: &T) -> Result<usize> {
        let text = serde_json::to_string(frame)?;
        let snapshot: Vec<(ConnectionId, mpsc::Sender<String>)> = self
            .connections
            .read()
            .await
            .iter()
            .map(|(id, sender)| (*id, sender.clone()))
            .collect();

        let mut delivered = 0;
        for (id, sender) in snapshot {
            if sender.send(text.clone()).await.is_ok() {
                delivered += 1;
            } else {
                tracing::warn!(connection = %id, "broadcast delivery failed, skipping");
            }
        }
        Ok(delivered)
    }
}
