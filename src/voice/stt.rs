//! Speech-to-text (STT) processing

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::AudioSample;
use crate::{Error, Result};

/// Default OpenAI API base
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Converts a recorded utterance into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a non-empty sample
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcription` on provider, network or auth failure
    async fn transcribe(&self, sample: &AudioSample) -> Result<String>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}

/// Response from OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes speech to text with OpenAI Whisper
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    scratch_dir: Option<PathBuf>,
}

impl SpeechToText {
    /// Create a new Whisper client
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_whisper(api_key: SecretString, model: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: OPENAI_API_BASE.to_string(),
            scratch_dir: None,
        })
    }

    /// Point at a different API base (proxies, tests)
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Directory for the transient upload file (defaults to the system temp dir)
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Write the recording to a scoped temp file and read back the upload body
    ///
    /// The file is removed when the guard drops, on every path out of here.
    async fn stage_upload(&self, sample: &AudioSample) -> Result<Vec<u8>> {
        let wav = sample
            .to_wav()
            .map_err(|e| Error::Transcription(e.to_string()))?;

        let mut builder = tempfile::Builder::new();
        builder.prefix("voicebot-input-").suffix(".wav");
        let staged = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(|e| Error::Transcription(format!("failed to stage audio: {e}")))?;

        staged
            .as_file()
            .write_all(&wav)
            .map_err(|e| Error::Transcription(format!("failed to stage audio: {e}")))?;

        let body = tokio::fs::read(staged.path())
            .await
            .map_err(|e| Error::Transcription(format!("failed to read staged audio: {e}")))?;

        tracing::trace!(path = %staged.path().display(), bytes = body.len(), "staged upload");
        Ok(body)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, sample: &AudioSample) -> Result<String> {
        if sample.is_empty() {
            return Err(Error::Transcription("empty recording".to_string()));
        }

        tracing::debug!(
            samples = sample.len(),
            fingerprint = ?sample.fingerprint(),
            "starting Whisper transcription"
        );

        let audio = self.stage_upload(sample).await?;

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio)
                    .file_name("input.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Transcription(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                Error::Transcription(e.to_string())
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Transcription(format!(
                "Whisper API error {status}: {body}"
            )));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            Error::Transcription(e.to_string())
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "openai-whisper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(dir: &std::path::Path) -> SpeechToText {
        SpeechToText::new_whisper(
            SecretString::from("sk-test".to_string()),
            "whisper-1".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_scratch_dir(dir)
    }

    #[test]
    fn test_parse_whisper_response() {
        let parsed: WhisperResponse = serde_json::from_str(r#"{"text":"안녕하세요"}"#).unwrap();
        assert_eq!(parsed.text, "안녕하세요");
    }

    #[tokio::test]
    async fn test_empty_sample_rejected_without_staging() {
        let dir = tempfile::tempdir().unwrap();
        let stt = client(dir.path());
        let empty = AudioSample::new(Vec::new(), super::super::SAMPLE_RATE);

        let err = stt.transcribe(&empty).await.unwrap_err();
        assert!(matches!(err, Error::Transcription(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_staged_upload_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let stt = client(dir.path());
        let sample = AudioSample::new(vec![0.1; 160], super::super::SAMPLE_RATE);

        let body = stt.stage_upload(&sample).await.unwrap();
        assert_eq!(&body[0..4], b"RIFF");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
