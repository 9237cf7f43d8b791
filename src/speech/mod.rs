//! Speech collaborators: transcription in, synthesis out

pub mod stt;
pub mod tts;

pub use stt::{Transcriber, WhisperTranscriber};
pub use tts::{SynthesisParams, Synthesizer, XttsSynthesizer};
