//! Reply generation
//!
//! Turns the running message history into the assistant's next line.

mod openai;

pub use openai::OpenAiChat;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::conversation::MessageHistory;
use crate::{Error, Result};

/// Chat model backing the reply client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChatModel {
    /// `gpt-4`
    #[default]
    #[serde(rename = "gpt-4")]
    Gpt4,
    /// `gpt-3.5-turbo`
    #[serde(rename = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl ChatModel {
    /// All selectable models, in menu order
    pub const ALL: [Self; 2] = [Self::Gpt4, Self::Gpt35Turbo];

    /// Provider model identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gpt4 => "gpt-4",
            Self::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

impl fmt::Display for ChatModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChatModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "gpt-4" | "gpt4" => Ok(Self::Gpt4),
            "gpt-3.5-turbo" | "gpt-3.5" | "gpt35" => Ok(Self::Gpt35Turbo),
            other => Err(Error::Reply(format!("unrecognized model: {other}"))),
        }
    }
}

/// Produces the assistant reply for a conversation
#[async_trait]
pub trait ReplyClient: Send + Sync {
    /// Generate a reply to the full history
    ///
    /// No retries are attempted.
    ///
    /// # Errors
    ///
    /// Returns `Error::Reply` on provider, network or auth failure
    async fn reply(&self, history: &MessageHistory, model: ChatModel) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
