//! Error types for the voicebot

use thiserror::Error;

/// Result type alias for voicebot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a conversation
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// No API key configured; fatal to any action
    #[error("missing credential: set OPENAI_API_KEY or api_keys.openai in config.toml")]
    CredentialMissing,

    /// Speech-to-text failure (provider, network or auth)
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Reply generation failure (provider, network, auth or unknown model)
    #[error("reply error: {0}")]
    Reply(String),

    /// Text-to-speech failure
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio device or encoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the conversation can continue after this error
    ///
    /// Only a missing credential stops the session; everything else is
    /// surfaced to the user and the loop keeps going.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::CredentialMissing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_missing_credential_is_fatal() {
        assert!(!Error::CredentialMissing.is_recoverable());
        assert!(Error::Audio("no input device available".to_string()).is_recoverable());
        assert!(Error::Transcription("timeout".to_string()).is_recoverable());
        assert!(Error::Io(std::io::Error::other("stdin closed")).is_recoverable());
    }
}
