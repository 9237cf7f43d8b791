//! Streaming response pipeline
//!
//! Turns one line of user text into ordered, sentence-sized audio chunks:
//! generate the full response, segment it on sentence terminators, then
//! synthesize and stream each unit sequentially so delivery order always
//! matches sentence order. Every failure here is scoped to one turn or one
//! unit; the connection itself stays open.

use std::collections::HashSet;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::api::ApiState;
use crate::protocol::Outbound;
use crate::registry::ConnectionId;

/// User-visible message sent when response generation fails
pub const GENERATION_FAILURE_MESSAGE: &str =
    "Sorry, I encountered an error processing your request.";

/// Split a response into sentence units
///
/// A unit is the maximal run of characters up to and including one of `.`,
/// `!`, `?`, trimmed of surrounding whitespace. Units without any
/// non-terminator content are skipped, and a trailing fragment with no
/// terminator is dropped.
#[must_use]
pub fn segment_sentences(text: &str) -> Vec<String> {
    let mut units = Vec::new();
    let mut current = String::new();

    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            let trimmed = current.trim();
            if trimmed.chars().any(|c| !matches!(c, '.' | '!' | '?')) {
                units.push(trimmed.to_string());
            }
            current.clear();
        }
    }

    units
}

/// Run one turn: generate a response to `text` and stream synthesized
/// sentence chunks back to `reply_to`
///
/// Generation failure aborts the turn with one error chunk. A synthesis
/// failure skips that unit and continues. Duplicate units within the turn
/// are recorded before synthesis, so back-to-back repeats are suppressed
/// along with later ones. Delivery failures are logged, never raised; a
/// client that disconnected mid-turn simply stops receiving.
pub async fn run_turn(state: &Arc<ApiState>, reply_to: ConnectionId, text: &str) {
    let response = match state.generator.generate(text).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, connection = %reply_to, "response generation failed");
            send_error(state, reply_to, GENERATION_FAILURE_MESSAGE).await;
            return;
        }
    };

    let units = segment_sentences(&response);
    tracing::debug!(units = units.len(), connection = %reply_to, "response segmented");

    let mut seen: HashSet<String> = HashSet::new();
    for unit in units {
        if !seen.insert(unit.clone()) {
            tracing::debug!(unit = %unit, "duplicate unit within turn, skipping");
            continue;
        }

        let audio = match state.synthesizer.synthesize(&unit).await {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, unit = %unit, "synthesis failed, skipping unit");
                continue;
            }
        };

        let chunk = Outbound::Audio {
            audio: BASE64.encode(&audio),
            text: unit,
        };
        if let Err(e) = state.registry.send(reply_to, &chunk).await {
            tracing::warn!(error = %e, connection = %reply_to, "audio chunk delivery failed");
        }
    }
}

/// Best-effort error chunk delivery
pub(crate) async fn send_error(state: &Arc<ApiState>, reply_to: ConnectionId, message: &str) {
    let frame = Outbound::Error {
        message: message.to_string(),
    };
    if let Err(e) = state.registry.send(reply_to, &frame).await {
        tracing::warn!(error = %e, connection = %reply_to, "error chunk delivery failed");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::*;
    use crate::api::ApiState;
    use crate::devices::DevicePairings;
    use crate::llm::ResponseGenerator;
    use crate::registry::ConnectionRegistry;
    use crate::speech::{Synthesizer, Transcriber};
    use crate::{Error, Result};

    struct FixedGenerator(Option<String>);

    #[async_trait]
    impl ResponseGenerator for FixedGenerator {
        async fn generate(&self, _text: &str) -> Result<String> {
            self.0
                .clone()
                .ok_or_else(|| Error::Generation("backend down".to_string()))
        }
    }

    struct CountingSynthesizer {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    impl CountingSynthesizer {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl Synthesizer for CountingSynthesizer {
        async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on == Some(text) {
                return Err(Error::Tts("unit failed".to_string()));
            }
            Ok(text.as_bytes().to_vec())
        }
    }

    struct NoopTranscriber;

    #[async_trait]
    impl Transcriber for NoopTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String> {
            Ok(String::new())
        }
    }

    fn state_with(
        generator: FixedGenerator,
        synthesizer: Arc<CountingSynthesizer>,
    ) -> Arc<ApiState> {
        Arc::new(ApiState {
            registry: ConnectionRegistry::new(),
            pairings: DevicePairings::new(),
            transcriber: Arc::new(NoopTranscriber),
            generator: Arc::new(generator),
            synthesizer,
        })
    }

    fn decode_chunk(raw: &str) -> (String, String) {
        let value: serde_json::Value = serde_json::from_str(raw).unwrap();
        (
            value["type"].as_str().unwrap().to_string(),
            value
                .get("text")
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string(),
        )
    }

    #[test]
    fn segments_on_all_three_terminators() {
        assert_eq!(
            segment_sentences("Hello there. How are you? Fine!"),
            vec!["Hello there.", "How are you?", "Fine!"]
        );
    }

    #[test]
    fn trailing_fragment_without_terminator_is_dropped() {
        assert_eq!(
            segment_sentences("Done. And then some trailing words"),
            vec!["Done."]
        );
    }

    #[test]
    fn whitespace_only_and_bare_terminator_units_are_skipped() {
        assert_eq!(segment_sentences("Hello..   . Bye."), vec!["Hello.", "Bye."]);
        assert!(segment_sentences("   ").is_empty());
        assert!(segment_sentences("...").is_empty());
    }

    #[tokio::test]
    async fn chunks_arrive_in_sentence_order() {
        let synthesizer = Arc::new(CountingSynthesizer::new(None));
        let state = state_with(
            FixedGenerator(Some("Hello there. How are you? Fine!".to_string())),
            synthesizer.clone(),
        );

        let (tx, mut rx) = mpsc::channel(8);
        let conn = state.registry.connect(tx).await;
        run_turn(&state, conn, "hi").await;

        let mut texts = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            let (kind, text) = decode_chunk(&raw);
            assert_eq!(kind, "audio");
            texts.push(text);
        }
        assert_eq!(texts, vec!["Hello there.", "How are you?", "Fine!"]);
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn duplicates_within_a_turn_are_synthesized_once() {
        let synthesizer = Arc::new(CountingSynthesizer::new(None));
        let state = state_with(
            FixedGenerator(Some("Yes. Yes. No.".to_string())),
            synthesizer.clone(),
        );

        let (tx, mut rx) = mpsc::channel(8);
        let conn = state.registry.connect(tx).await;
        run_turn(&state, conn, "hi").await;

        // Dedup is recorded before synthesis, so the adjacent repeat is
        // suppressed too: exactly two synthesis calls.
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 2);

        let mut texts = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            texts.push(decode_chunk(&raw).1);
        }
        assert_eq!(texts, vec!["Yes.", "No."]);
    }

    #[tokio::test]
    async fn synthesis_failure_skips_only_that_unit() {
        let synthesizer = Arc::new(CountingSynthesizer::new(Some("How are you?")));
        let state = state_with(
            FixedGenerator(Some("Hello there. How are you? Fine!".to_string())),
            synthesizer.clone(),
        );

        let (tx, mut rx) = mpsc::channel(8);
        let conn = state.registry.connect(tx).await;
        run_turn(&state, conn, "hi").await;

        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 3);

        let mut texts = Vec::new();
        while let Ok(raw) = rx.try_recv() {
            texts.push(decode_chunk(&raw).1);
        }
        assert_eq!(texts, vec!["Hello there.", "Fine!"]);
    }

    #[tokio::test]
    async fn generation_failure_sends_one_error_chunk() {
        let synthesizer = Arc::new(CountingSynthesizer::new(None));
        let state = state_with(FixedGenerator(None), synthesizer.clone());

        let (tx, mut rx) = mpsc::channel(8);
        let conn = state.registry.connect(tx).await;
        run_turn(&state, conn, "hi").await;

        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 0);
        let raw = rx.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["message"], GENERATION_FAILURE_MESSAGE);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn disconnect_mid_turn_degrades_to_logged_failures() {
        let synthesizer = Arc::new(CountingSynthesizer::new(None));
        let state = state_with(
            FixedGenerator(Some("One. Two.".to_string())),
            synthesizer.clone(),
        );

        let (tx, rx) = mpsc::channel(8);
        let conn = state.registry.connect(tx).await;
        state.registry.disconnect(conn).await;
        drop(rx);

        // Must not panic; synthesis still runs to completion.
        run_turn(&state, conn, "hi").await;
        assert_eq!(synthesizer.calls.load(Ordering::SeqCst), 2);
    }
}
