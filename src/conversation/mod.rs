//! Conversation core: history, transcript and the turn state machine

mod message;
mod orchestrator;
mod state;

pub use message::{ChatLogEntry, ChatMessage, MessageHistory, Role, Sender};
pub use orchestrator::{IgnoreReason, Orchestrator, TurnOutcome, TurnReport, TurnSettings};
pub use state::{ConversationState, Phase, SessionId};
