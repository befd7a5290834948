//! Voicebot - speak to a language model and hear it answer
//!
//! This library provides the pieces of a voice conversation loop:
//! - Recording and playback (cpal)
//! - Speech-to-text and text-to-speech clients
//! - Reply generation from the running message history
//! - The conversation state machine tying them together
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   AudioSample   ┌──────────────────────────────────────┐
//! │   Recorder   ├────────────────►│             Orchestrator             │
//! └──────────────┘                 │ Idle → Transcribing → Replying →     │
//!                                  │        Synthesizing → Idle           │
//!                                  └───┬──────────────┬──────────────┬────┘
//!                                      │              │              │
//!                               ┌──────▼─────┐ ┌──────▼─────┐ ┌──────▼─────┐
//!                               │ Transcriber│ │ ReplyClient│ │ Synthesizer│
//!                               └────────────┘ └────────────┘ └────────────┘
//!                                                                    │
//!                         chat log + SpeechClip ──► render / playback ◄┘
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod render;
pub mod setup;
pub mod voice;

pub use config::Config;
pub use conversation::{
    ChatLogEntry, ChatMessage, ConversationState, IgnoreReason, MessageHistory, Orchestrator,
    Phase, Role, Sender, TurnOutcome, TurnReport, TurnSettings,
};
pub use error::{Error, Result};
pub use llm::{ChatModel, OpenAiChat, ReplyClient};
pub use voice::{
    AudioSample, Fingerprint, SpeechClip, SpeechToText, Synthesizer, TextToSpeech, Transcriber,
};
