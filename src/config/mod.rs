//! Configuration management for the voicebot
//!
//! Values resolve in order: environment > TOML file > defaults.

pub mod file;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::llm::ChatModel;
use crate::voice::stt::OPENAI_API_BASE;
use crate::voice::{DEFAULT_LANGUAGE, TtsProvider};
use crate::{Error, Result};

use file::VoicebotConfigFile;

/// Persona prompt used when none is configured
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a thoughtful assistant. Respond to all input in 25 words and answer in korea";

/// Default per-request timeout for external services
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Voicebot configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// `OpenAI` API key; required before any conversation starts
    pub api_key: Option<SecretString>,

    /// `OpenAI`-compatible API base URL
    pub api_base: String,

    /// Reply model
    pub model: ChatModel,

    /// Persona/instruction prompt
    pub system_prompt: String,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Per-request timeout for STT, reply and TTS calls
    pub timeout: Duration,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Spoken reply language
    pub language: String,

    /// STT model (e.g. "whisper-1")
    pub stt_model: String,

    /// TTS backend
    pub tts_provider: TtsProvider,

    /// TTS voice identifier (`OpenAI` only)
    pub tts_voice: String,

    /// TTS speed multiplier (`OpenAI` only, 0.25 to 4.0)
    pub tts_speed: f64,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            stt_model: "whisper-1".to_string(),
            tts_provider: TtsProvider::Google,
            tts_voice: "alloy".to_string(),
            tts_speed: 1.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: OPENAI_API_BASE.to_string(),
            model: ChatModel::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            voice: VoiceConfig::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// A missing API key is not an error here; it surfaces from
    /// [`Config::credential`] before the first external call.
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid (e.g. unknown model)
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(&fc, |key| std::env::var(key).ok())
    }

    /// Resolve configuration from a parsed file and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid (e.g. unknown model)
    pub fn resolve(
        fc: &VoicebotConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = Self::default();

        let api_key = env("OPENAI_API_KEY")
            .or_else(|| fc.api_keys.openai.clone())
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let api_base = env("OPENAI_BASE_URL")
            .or_else(|| fc.server.api_base.clone())
            .map_or(defaults.api_base, |url| url.trim_end_matches('/').to_string());

        let model = env("VOICEBOT_MODEL")
            .or_else(|| fc.llm.model.clone())
            .map(|m| m.parse::<ChatModel>())
            .transpose()?
            .unwrap_or(defaults.model);

        let system_prompt = env("VOICEBOT_SYSTEM_PROMPT")
            .or_else(|| fc.llm.system_prompt.clone())
            .unwrap_or(defaults.system_prompt);

        let tts_provider = env("VOICEBOT_TTS_PROVIDER")
            .or_else(|| fc.voice.tts_provider.clone())
            .map(|p| p.parse::<TtsProvider>())
            .transpose()?
            .unwrap_or(defaults.voice.tts_provider);

        let tts_speed = fc.voice.tts_speed.unwrap_or(defaults.voice.tts_speed);
        if !(0.25..=4.0).contains(&tts_speed) {
            return Err(Error::Config(format!(
                "tts_speed must be between 0.25 and 4.0, got {tts_speed}"
            )));
        }

        let voice = VoiceConfig {
            language: env("VOICEBOT_LANGUAGE")
                .or_else(|| fc.voice.language.clone())
                .unwrap_or(defaults.voice.language),
            stt_model: fc
                .voice
                .stt_model
                .clone()
                .unwrap_or(defaults.voice.stt_model),
            tts_provider,
            tts_voice: fc
                .voice
                .tts_voice
                .clone()
                .unwrap_or(defaults.voice.tts_voice),
            tts_speed,
        };

        let timeout = fc
            .server
            .timeout_secs
            .filter(|secs| *secs > 0)
            .map_or(defaults.timeout, Duration::from_secs);

        Ok(Self {
            api_key,
            api_base,
            model,
            system_prompt,
            voice,
            timeout,
        })
    }

    /// The API credential
    ///
    /// # Errors
    ///
    /// Returns `Error::CredentialMissing` when no key is configured
    pub fn credential(&self) -> Result<&SecretString> {
        self.api_key
            .as_ref()
            .filter(|k| !k.expose_secret().trim().is_empty())
            .ok_or(Error::CredentialMissing)
    }
}
