//! HTTP and WebSocket API server for the relay

pub mod health;
pub mod trigger;
pub mod websocket;

use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::devices::DevicePairings;
use crate::llm::ResponseGenerator;
use crate::registry::ConnectionRegistry;
use crate::speech::{Synthesizer, Transcriber};

/// Shared state for API handlers
///
/// Explicitly constructed at startup and injected into every handler; the
/// registry and pairing table guard their own maps internally.
pub struct ApiState {
    pub registry: ConnectionRegistry,
    pub pairings: DevicePairings,
    pub transcriber: Arc<dyn Transcriber>,
    pub generator: Arc<dyn ResponseGenerator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

impl ApiState {
    /// Assemble relay state from the three pipeline collaborators
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn ResponseGenerator>,
        synthesizer: Arc<dyn Synthesizer>,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            pairings: DevicePairings::new(),
            transcriber,
            generator,
            synthesizer,
        }
    }
}

/// Build the router with all routes
#[must_use]
pub fn router(state: Arc<ApiState>) -> Router {
    let router = Router::new()
        .nest("/esp32", trigger::router(state.clone()))
        .merge(websocket::router(state))
        .merge(health::router());

    // The companion app is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router.layer(cors).layer(TraceLayer::new_for_http())
}

/// Relay API server
pub struct RelayServer {
    state: Arc<ApiState>,
    port: u16,
}

impl RelayServer {
    /// Create a server for `state` listening on `port`
    #[must_use]
    pub const fn new(state: Arc<ApiState>, port: u16) -> Self {
        Self { state, port }
    }

    /// Run the server until the process exits
    ///
    /// # Errors
    ///
    /// Returns error if the server fails to bind or run.
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind relay server: {e}")))?;

        tracing::info!(port = self.port, "relay server listening");

        axum::serve(listener, router(self.state))
            .await
            .map_err(|e| crate::Error::Config(format!("relay server error: {e}")))?;

        Ok(())
    }

    /// Run the server in a background task
    #[must_use]
    pub fn spawn(self) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}
