//! ExoCortex Relay - real-time bridge between a hardware trigger device,
//! companion clients, and a speech/LLM pipeline
//!
//! Clients hold a persistent WebSocket to the relay; a physical trigger
//! device starts recordings over HTTP. Inbound audio or text is driven
//! through speech-to-text, response generation, and sentence-segmented
//! speech synthesis, with each synthesized sentence streamed back in order.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   POST /esp32/trigger   ┌─────────────────────────┐
//! │ ESP32 button ├────────────────────────▶│      ExoCortex Relay    │
//! └──────────────┘                         │  registry │ pairings    │
//! ┌──────────────┐   /ws (JSON frames)     │  dispatcher │ pipeline  │
//! │ companion app│◀───────────────────────▶│                         │
//! └──────────────┘                         └──────┬──────┬──────┬────┘
//!                                                 │      │      │
//!                                               STT    LLM    TTS
//! ```

pub mod api;
pub mod config;
pub mod devices;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod protocol;
pub mod registry;
pub mod speech;

pub use config::RelayConfig;
pub use devices::{DevicePairings, Session};
pub use error::{Error, Result};
pub use llm::{OllamaGenerator, ResponseGenerator};
pub use protocol::{ClientCommand, Inbound, Outbound};
pub use registry::{ConnectionId, ConnectionRegistry};
pub use speech::{SynthesisParams, Synthesizer, Transcriber, WhisperTranscriber, XttsSynthesizer};
