//! Conversation records: the history sent to the model and the chat log shown to the user

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Wire name used by chat APIs
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A message in the history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

/// Ordered messages sent to the reply service
///
/// Always starts with exactly one system message. Entries are only ever
/// appended; nothing is reordered or edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageHistory {
    messages: Vec<ChatMessage>,
}

impl MessageHistory {
    /// Start a history holding only the system prompt
    #[must_use]
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage {
                role: Role::System,
                text: system_prompt.into(),
                timestamp: Local::now(),
            }],
        }
    }

    /// Append a user message
    pub fn push_user(&mut self, text: impl Into<String>, time: DateTime<Local>) {
        self.push(Role::User, text.into(), time);
    }

    /// Append an assistant message
    pub fn push_assistant(&mut self, text: impl Into<String>, time: DateTime<Local>) {
        self.push(Role::Assistant, text.into(), time);
    }

    fn push(&mut self, role: Role, text: String, timestamp: DateTime<Local>) {
        self.messages.push(ChatMessage {
            role,
            text,
            timestamp,
        });
    }

    /// The leading system message
    #[must_use]
    pub fn system(&self) -> &ChatMessage {
        // Constructed with the system message and never shrunk
        &self.messages[0]
    }

    /// Most recent message
    #[must_use]
    pub fn last(&self) -> &ChatMessage {
        self.messages.last().unwrap_or_else(|| self.system())
    }

    /// All messages in order
    #[must_use]
    pub fn as_slice(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Iterate in order
    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessage> {
        self.messages.iter()
    }

    /// Number of messages, system prompt included
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Never true; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

impl<'a> IntoIterator for &'a MessageHistory {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Who a chat bubble belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Bot,
}

/// One line of the visible transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLogEntry {
    pub sender: Sender,
    pub time: DateTime<Local>,
    pub text: String,
}

impl ChatLogEntry {
    /// Clock time shown next to the bubble
    #[must_use]
    pub fn display_time(&self) -> String {
        self.time.format("%H:%M").to_string()
    }
}
