//! Per-session conversation state

use std::fmt;

use chrono::{DateTime, Local};
use uuid::Uuid;

use super::message::{ChatLogEntry, MessageHistory, Sender};
use crate::voice::Fingerprint;

/// Identifier issued on every (re)initialization
///
/// In-flight turns carry the id current when they started; a mismatch on
/// return means the conversation was reset underneath them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn fresh() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Where the turn state machine currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// Waiting for a new utterance
    #[default]
    Idle,
    /// Speech-to-text in flight
    Transcribing,
    /// Reply generation in flight
    Replying,
    /// Speech synthesis in flight
    Synthesizing,
}

/// Message history, chat log and novelty tracking for one conversation
#[derive(Debug, Clone)]
pub struct ConversationState {
    system_prompt: String,
    history: MessageHistory,
    chat_log: Vec<ChatLogEntry>,
    last_fingerprint: Option<Fingerprint>,
    session: SessionId,
    phase: Phase,
}

impl ConversationState {
    /// Start a conversation with only the system prompt
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            history: MessageHistory::new(system_prompt.clone()),
            system_prompt,
            chat_log: Vec::new(),
            last_fingerprint: None,
            session: SessionId::fresh(),
            phase: Phase::Idle,
        }
    }

    /// Reset to the initial state under `system_prompt`
    ///
    /// Safe to call at any time. A new session id is issued so results of
    /// calls started before the reset can be recognized and dropped.
    pub fn initialize(&mut self, system_prompt: impl Into<String>) {
        *self = Self::new(system_prompt);
        tracing::debug!(session = %self.session, "conversation initialized");
    }

    /// Record what the user said
    ///
    /// Novelty must already have been checked; no deduplication happens here.
    pub fn append_user(&mut self, text: impl Into<String>, time: DateTime<Local>) {
        let text = text.into();
        self.history.push_user(text.clone(), time);
        self.chat_log.push(ChatLogEntry {
            sender: Sender::User,
            time,
            text,
        });
    }

    /// Record the assistant's reply
    pub fn append_assistant(&mut self, text: impl Into<String>, time: DateTime<Local>) {
        let text = text.into();
        self.history.push_assistant(text.clone(), time);
        self.chat_log.push(ChatLogEntry {
            sender: Sender::Bot,
            time,
            text,
        });
    }

    /// Remember the most recently processed recording
    pub const fn set_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.last_fingerprint = Some(fingerprint);
    }

    /// Whether `fingerprint` differs from the last processed recording
    #[must_use]
    pub fn is_novel(&self, fingerprint: &Fingerprint) -> bool {
        self.last_fingerprint.as_ref() != Some(fingerprint)
    }

    pub(crate) const fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// History sent to the reply service
    #[must_use]
    pub const fn history(&self) -> &MessageHistory {
        &self.history
    }

    /// Visible transcript
    #[must_use]
    pub fn chat_log(&self) -> &[ChatLogEntry] {
        &self.chat_log
    }

    /// Fingerprint of the last processed recording
    #[must_use]
    pub const fn last_fingerprint(&self) -> Option<Fingerprint> {
        self.last_fingerprint
    }

    /// Current session id
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Current phase
    #[must_use]
    pub const fn phase(&self) -> Phase {
        self.phase
    }

    /// System prompt this conversation was started with
    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}
