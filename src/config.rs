//! Relay configuration
//!
//! Loaded from an optional TOML file with sensible defaults for every
//! field; secrets (the STT API key) come from the environment, never from
//! the file.

use std::path::Path;

use serde::Deserialize;

use crate::Result;
use crate::speech::SynthesisParams;

/// Response-generation backend settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the Ollama-compatible server
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// System preamble prepended to every user message
    pub preamble: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2-vision:11b-instruct-q8_0".to_string(),
            preamble: crate::llm::DEFAULT_PREAMBLE.to_string(),
        }
    }
}

/// Speech-to-text settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SttConfig {
    /// Transcription model identifier
    pub model: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "whisper-1".to_string(),
        }
    }
}

/// Text-to-speech settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Base URL of the XTTS synthesis server
    pub base_url: String,
    /// Fixed voice profile and sampling parameters
    pub params: SynthesisParams,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8020".to_string(),
            params: SynthesisParams::default(),
        }
    }
}

/// Top-level relay configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub llm: LlmConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
}

impl RelayConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config = RelayConfig::default();
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert_eq!(config.stt.model, "whisper-1");
        assert_eq!(config.tts.params.language, "en");
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [llm]
            model = "llama3.1"

            [tts.params]
            speed = 1.0
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "llama3.1");
        assert_eq!(config.llm.base_url, "http://localhost:11434");
        assert!((config.tts.params.speed - 1.0).abs() < f32::EPSILON);
        assert_eq!(config.tts.params.speaker_wav, "voices/colin.wav");
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = RelayConfig::load(Some(Path::new("/nonexistent/relay.toml"))).unwrap();
        assert_eq!(config.stt.model, "whisper-1");
    }
}
