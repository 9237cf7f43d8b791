//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use serde::Deserialize;

use crate::{Error, Result};

/// Fixed synthesis parameters applied to every sentence unit
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisParams {
    /// Reference speaker voice sample path on the synthesis server
    pub speaker_wav: String,
    /// Playback speed multiplier
    pub speed: f32,
    /// Sampling temperature
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    /// Target language code
    pub language: String,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            speaker_wav: "voices/colin.wav".to_string(),
            speed: 1.7,
            temperature: 0.9,
            top_k: 50,
            top_p: 0.5,
            language: "en".to_string(),
        }
    }
}

/// Synthesizes speech from one sentence unit
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` to raw audio bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails for this unit.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;
}

#[derive(serde::Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    speaker_wav: &'a str,
    speed: f32,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    language: &'a str,
}

/// Synthesizer backed by an XTTS HTTP synthesis server
pub struct XttsSynthesizer {
    client: reqwest::Client,
    base_url: String,
    params: SynthesisParams,
}

impl XttsSynthesizer {
    /// Create a synthesizer against `base_url` with fixed voice parameters
    #[must_use]
    pub fn new(base_url: String, params: SynthesisParams) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            params,
        }
    }
}

/// Strip trailing 'A' padding some models append to a synthesized unit
fn trim_trailing_padding(text: &str) -> &str {
    text.trim_end_matches('A')
}

#[async_trait]
impl Synthesizer for XttsSynthesizer {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let input = trim_trailing_padding(text);
        tracing::debug!(text = %input, "starting synthesis");

        let request = SynthesisRequest {
            text: input,
            speaker_wav: &self.params.speaker_wav,
            speed: self.params.speed,
            temperature: self.params.temperature,
            top_k: self.params.top_k,
            top_p: self.params.top_p,
            language: &self.params.language,
        };

        let response = self
            .client
            .post(format!("{}/synthesize", self.base_url))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("synthesis error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio.to_vec())
    }
}
