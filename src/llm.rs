//! Response generation via an Ollama-compatible chat endpoint

use async_trait::async_trait;

use crate::{Error, Result};

/// Default system preamble prepended to every user message
pub const DEFAULT_PREAMBLE: &str = "You are ExoCortex - the human user's AI companion and second \
    brain. You and the user are a fusion of consciousness and intelligence, working in synergy and \
    perfect unison. You receive audio, image, and textual input from the user and return whatever \
    information the user requests. Respond to the user's message: ";

/// Generates one response for one prompt
///
/// A single request/response call; no streaming is assumed.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Produce a response for the given user text
    ///
    /// # Errors
    ///
    /// Returns error if the backend is unreachable or replies malformed.
    async fn generate(&self, text: &str) -> Result<String>;
}

#[derive(serde::Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(serde::Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Response generator backed by a local Ollama server
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    preamble: String,
}

impl OllamaGenerator {
    /// Create a generator against `base_url` (e.g. `http://localhost:11434`)
    #[must_use]
    pub fn new(base_url: String, model: String, preamble: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            model,
            preamble,
        }
    }
}

#[async_trait]
impl ResponseGenerator for OllamaGenerator {
    async fn generate(&self, text: &str) -> Result<String> {
        let prompt = format!("{}{text}", self.preamble);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat backend error");
            return Err(Error::Generation(format!(
                "chat backend error {status}: {body}"
            )));
        }

        let result: ChatResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse chat response");
            e
        })?;

        tracing::debug!(chars = result.message.content.len(), "generation complete");
        Ok(result.message.content)
    }
}
