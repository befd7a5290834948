//! TOML configuration file loading
//!
//! Supports `~/.config/voicebot/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct VoicebotConfigFile {
    /// Reply model configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Network configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Reply model configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct LlmFileConfig {
    /// Model identifier ("gpt-4" or "gpt-3.5-turbo")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Persona/instruction prompt placed first in every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Voice processing configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct VoiceFileConfig {
    /// Spoken reply language (e.g. "ko")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// STT model (e.g. "whisper-1")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stt_model: Option<String>,

    /// TTS provider ("google" or "openai")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_provider: Option<String>,

    /// TTS voice identifier for `OpenAI` (e.g. "alloy")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_voice: Option<String>,

    /// TTS speed multiplier for `OpenAI`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts_speed: Option<f64>,
}

/// API keys configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ApiKeysFileConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<String>,
}

/// Network configuration
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ServerFileConfig {
    /// `OpenAI`-compatible API base URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Per-request timeout for external services
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VoicebotConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoicebotConfigFile {
    config_file_path().map_or_else(VoicebotConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> VoicebotConfigFile {
    if !path.exists() {
        return VoicebotConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoicebotConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoicebotConfigFile::default()
        }
    }
}

/// Serialize and write a config file, creating parent directories
///
/// # Errors
///
/// Returns error if the file cannot be serialized or written
pub fn write_config_file(path: &Path, config: &VoicebotConfigFile) -> crate::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let toml = toml::to_string_pretty(config)
        .map_err(|e| crate::Error::Config(format!("failed to serialize config: {e}")))?;
    std::fs::write(path, toml)?;

    tracing::info!(path = %path.display(), "wrote config file");
    Ok(())
}

/// Return the config file path: `~/.config/voicebot/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicebot").join("config.toml"))
}
