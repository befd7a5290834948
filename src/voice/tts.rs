//! Text-to-speech (TTS) processing

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use secrecy::{ExposeSecret, SecretString};

use super::stt::OPENAI_API_BASE;
use crate::{Error, Result};

/// Default reply language
pub const DEFAULT_LANGUAGE: &str = "ko";

/// Google Translate TTS endpoint
const GOOGLE_TTS_URL: &str = "https://translate.google.com/translate_tts";

/// Longest text Google Translate TTS accepts per request
const GOOGLE_MAX_CHARS: usize = 100;

/// Converts reply text into playable audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` spoken in `language`
    ///
    /// # Errors
    ///
    /// Returns `Error::Synthesis` on provider failure
    async fn synthesize(&self, text: &str, language: &str) -> Result<SpeechClip>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Synthesized speech, ready for inline playback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechClip {
    mime: &'static str,
    bytes: Vec<u8>,
    encoded: String,
}

impl SpeechClip {
    /// Wrap MP3 bytes
    #[must_use]
    pub fn mp3(bytes: Vec<u8>) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Self {
            mime: "audio/mp3",
            bytes,
            encoded,
        }
    }

    /// Raw audio bytes
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type of the audio
    #[must_use]
    pub const fn mime(&self) -> &'static str {
        self.mime
    }

    /// Base64 form of the audio
    #[must_use]
    pub fn base64(&self) -> &str {
        &self.encoded
    }

    /// `data:` URL for embedding
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime, self.encoded)
    }

    /// Autoplaying HTML audio element
    #[must_use]
    pub fn audio_tag(&self) -> String {
        format!(
            "<audio autoplay=\"true\"><source src=\"{}\" type=\"{}\"></audio>",
            self.data_url(),
            self.mime
        )
    }
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    /// Google Translate TTS (no key needed)
    Google,
    /// `OpenAI` speech API
    OpenAI,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "google" | "gtts" => Ok(Self::Google),
            "openai" => Ok(Self::OpenAI),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    provider: TtsProvider,
    api_key: Option<SecretString>,
    voice: String,
    speed: f64,
    model: String,
    google_url: String,
    openai_base: String,
    scratch_dir: Option<PathBuf>,
}

impl TextToSpeech {
    /// Create a Google Translate TTS instance
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_google(timeout: Duration) -> Result<Self> {
        Self::build(TtsProvider::Google, None, String::new(), 1.0, timeout)
    }

    /// Create an `OpenAI` TTS instance
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_openai(
        api_key: SecretString,
        voice: String,
        speed: f64,
        timeout: Duration,
    ) -> Result<Self> {
        Self::build(TtsProvider::OpenAI, Some(api_key), voice, speed, timeout)
    }

    fn build(
        provider: TtsProvider,
        api_key: Option<SecretString>,
        voice: String,
        speed: f64,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            provider,
            api_key,
            voice,
            speed,
            model: "tts-1".to_string(),
            google_url: GOOGLE_TTS_URL.to_string(),
            openai_base: OPENAI_API_BASE.to_string(),
            scratch_dir: None,
        })
    }

    /// Override the provider endpoint (proxies, tests)
    #[must_use]
    pub fn with_endpoint(mut self, url: impl Into<String>) -> Self {
        let url = url.into().trim_end_matches('/').to_string();
        match self.provider {
            TtsProvider::Google => self.google_url = url,
            TtsProvider::OpenAI => self.openai_base = url,
        }
        self
    }

    /// Directory for the transient audio file (defaults to the system temp dir)
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Synthesize using Google Translate TTS, one request per chunk
    async fn synthesize_google(&self, text: &str, language: &str) -> Result<Vec<u8>> {
        let chunks = split_for_tts(text, GOOGLE_MAX_CHARS);
        let total = chunks.len();
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let url = format!(
                "{}?ie=UTF-8&client=tw-ob&tl={}&total={total}&idx={idx}&textlen={}&q={}",
                self.google_url,
                urlencoding::encode(language),
                chunk.chars().count(),
                urlencoding::encode(chunk),
            );

            let response = self
                .client
                .get(&url)
                .header("User-Agent", "Mozilla/5.0")
                .send()
                .await
                .map_err(|e| Error::Synthesis(e.to_string()))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(Error::Synthesis(format!("Google TTS error {status}: {body}")));
            }

            let bytes = response
                .bytes()
                .await
                .map_err(|e| Error::Synthesis(e.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        tracing::debug!(chunks = total, bytes = audio.len(), "google tts complete");
        Ok(audio)
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let api_key = self
            .api_key
            .as_ref()
            .ok_or(Error::CredentialMissing)?;

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.openai_base))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Synthesis(e.to_string()))?;
        Ok(audio.to_vec())
    }

    /// Round-trip the audio through a scoped temp file and encode it
    ///
    /// The file is removed when the guard drops, whether encoding worked or not.
    async fn encode_for_playback(&self, audio: Vec<u8>) -> Result<SpeechClip> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("voicebot-output-").suffix(".mp3");
        let staged = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Error::Synthesis(format!("failed to stage audio: {e}")))?;

        staged
            .as_file()
            .write_all(&audio)
            .map_err(|e| Error::Synthesis(format!("failed to stage audio: {e}")))?;

        let bytes = tokio::fs::read(staged.path())
            .await
            .map_err(|e| Error::Synthesis(format!("failed to read staged audio: {e}")))?;

        Ok(SpeechClip::mp3(bytes))
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SpeechClip> {
        if text.trim().is_empty() {
            return Err(Error::Synthesis("nothing to say".to_string()));
        }

        tracing::debug!(provider = ?self.provider, language, chars = text.len(), "synthesizing");

        let audio = match self.provider {
            TtsProvider::Google => self.synthesize_google(text, language).await?,
            TtsProvider::OpenAI => self.synthesize_openai(text).await?,
        };

        if audio.is_empty() {
            return Err(Error::Synthesis("provider returned no audio".to_string()));
        }

        self.encode_for_playback(audio).await
    }

    fn name(&self) -> &'static str {
        match self.provider {
            TtsProvider::Google => "google-translate-tts",
            TtsProvider::OpenAI => "openai-tts",
        }
    }
}

/// Split text into pieces of at most `max_chars` characters
///
/// Breaks on whitespace where possible; a single word longer than the
/// limit is cut mid-word.
#[must_use]
pub fn split_for_tts(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
