//! Shared test utilities

use std::sync::Arc;

use async_trait::async_trait;
use exocortex_relay::api::ApiState;
use exocortex_relay::{Error, ResponseGenerator, Result, Synthesizer, Transcriber};

/// Transcriber that echoes a fixed transcript
pub struct StubTranscriber(pub &'static str);

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Generator that echoes a fixed response
pub struct StubGenerator(pub &'static str);

#[async_trait]
impl ResponseGenerator for StubGenerator {
    async fn generate(&self, _text: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Synthesizer that returns the unit text as audio bytes
pub struct StubSynthesizer;

#[async_trait]
impl Synthesizer for StubSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.is_empty() {
            return Err(Error::Tts("empty unit".to_string()));
        }
        Ok(text.as_bytes().to_vec())
    }
}

/// Build relay state with stub collaborators
#[must_use]
pub fn test_state() -> Arc<ApiState> {
    Arc::new(ApiState::new(
        Arc::new(StubTranscriber("hello from audio")),
        Arc::new(StubGenerator("Hello there. How are you? Fine!")),
        Arc::new(StubSynthesizer),
    ))
}
