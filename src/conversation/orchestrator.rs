//! Turn sequencing
//!
//! Drives one conversation through
//! `Idle → Transcribing → Replying → Synthesizing → Idle` for every new
//! utterance. The state lock is never held across a provider call, so a
//! [`Orchestrator::reset`] can land while a turn is in flight; the turn then
//! notices its session ticket is stale and drops whatever comes back.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::Mutex;

use super::message::ChatLogEntry;
use super::state::{ConversationState, Phase, SessionId};
use crate::config::Config;
use crate::llm::{ChatModel, OpenAiChat, ReplyClient};
use crate::voice::{
    AudioSample, SpeechClip, SpeechToText, Synthesizer, TextToSpeech, Transcriber, TtsProvider,
};
use crate::{Error, Result};

/// Per-conversation settings the orchestrator applies to every turn
#[derive(Debug, Clone)]
pub struct TurnSettings {
    /// Reply model
    pub model: ChatModel,
    /// Prompt the history is (re)initialized with
    pub system_prompt: String,
    /// Spoken reply language
    pub language: String,
}

impl From<&Config> for TurnSettings {
    fn from(config: &Config) -> Self {
        Self {
            model: config.model,
            system_prompt: config.system_prompt.clone(),
            language: config.voice.language.clone(),
        }
    }
}

/// Why an input did not start a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No recording, or a zero-length one
    Empty,
    /// Same recording as the last processed one
    Duplicate,
    /// Another turn is still in flight
    Busy,
}

/// What a completed turn hands to the render boundary
#[derive(Debug, Clone)]
pub struct TurnReport {
    /// Transcribed user utterance
    pub user_text: String,
    /// Assistant reply
    pub reply_text: String,
    /// Full transcript, in order, after this turn
    pub chat_log: Vec<ChatLogEntry>,
    /// Spoken reply; `None` when synthesis failed
    pub speech: Option<SpeechClip>,
}

/// Result of feeding one input to the orchestrator
#[derive(Debug, Clone)]
pub enum TurnOutcome {
    /// No transition fired
    Ignored(IgnoreReason),
    /// The turn ran to the end
    Completed(TurnReport),
    /// The conversation was reset while the turn was in flight
    Discarded,
}

/// Conversation state machine
pub struct Orchestrator {
    transcriber: Arc<dyn Transcriber>,
    replier: Arc<dyn ReplyClient>,
    synthesizer: Arc<dyn Synthesizer>,
    settings: TurnSettings,
    state: Mutex<ConversationState>,
}

impl Orchestrator {
    /// Create an orchestrator over the given clients
    #[must_use]
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        replier: Arc<dyn ReplyClient>,
        synthesizer: Arc<dyn Synthesizer>,
        settings: TurnSettings,
    ) -> Self {
        let state = ConversationState::new(settings.system_prompt.clone());
        tracing::debug!(
            session = %state.session(),
            stt = transcriber.name(),
            llm = replier.name(),
            tts = synthesizer.name(),
            model = %settings.model,
            "orchestrator created"
        );

        Self {
            transcriber,
            replier,
            synthesizer,
            settings,
            state: Mutex::new(state),
        }
    }

    /// Build the `OpenAI`-backed clients from configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::CredentialMissing` if no API key is configured, before
    /// any client is created
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.credential()?.clone();

        let transcriber = SpeechToText::new_whisper(
            api_key.clone(),
            config.voice.stt_model.clone(),
            config.timeout,
        )?
        .with_base_url(&config.api_base);

        let replier = OpenAiChat::new(api_key.clone(), config.timeout)?.with_base_url(&config.api_base);

        let synthesizer = match config.voice.tts_provider {
            TtsProvider::Google => TextToSpeech::new_google(config.timeout)?,
            TtsProvider::OpenAI => TextToSpeech::new_openai(
                api_key,
                config.voice.tts_voice.clone(),
                config.voice.tts_speed,
                config.timeout,
            )?
            .with_endpoint(&config.api_base),
        };

        Ok(Self::new(
            Arc::new(transcriber),
            Arc::new(replier),
            Arc::new(synthesizer),
            TurnSettings::from(config),
        ))
    }

    /// Settings applied to each turn
    #[must_use]
    pub const fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Feed the latest recording into the state machine
    ///
    /// Passing the same recording again (e.g. after a redraw) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `Error::Transcription` or `Error::Reply` when that stage fails.
    /// The phase is back to `Idle` and earlier history is intact. A failed
    /// transcription leaves the recording unconsumed so it can be resubmitted;
    /// a failed reply keeps the user's message in the history.
    pub async fn on_new_audio(&self, sample: Option<&AudioSample>) -> Result<TurnOutcome> {
        let Some(sample) = sample.filter(|s| !s.is_empty()) else {
            tracing::trace!("no recording to process");
            return Ok(TurnOutcome::Ignored(IgnoreReason::Empty));
        };
        let fingerprint = sample.fingerprint();

        let ticket = {
            let mut state = self.state.lock().await;
            if !state.is_novel(&fingerprint) {
                tracing::trace!(?fingerprint, "recording already processed");
                return Ok(TurnOutcome::Ignored(IgnoreReason::Duplicate));
            }
            if state.phase() != Phase::Idle {
                tracing::debug!(phase = ?state.phase(), "turn in flight, ignoring recording");
                return Ok(TurnOutcome::Ignored(IgnoreReason::Busy));
            }
            state.set_phase(Phase::Transcribing);
            state.session()
        };

        tracing::info!(
            session = %ticket,
            ?fingerprint,
            secs = sample.duration_secs(),
            "new utterance"
        );

        // Transcribing
        let user_text = match self.transcriber.transcribe(sample).await {
            Ok(text) => text,
            Err(e) => return self.abort(ticket, e).await,
        };

        let history = {
            let mut state = self.state.lock().await;
            if state.session() != ticket {
                return Ok(Self::discarded(ticket, Phase::Transcribing));
            }
            state.set_fingerprint(fingerprint);
            state.append_user(user_text.clone(), Local::now());
            state.set_phase(Phase::Replying);
            state.history().clone()
        };

        // Replying
        let reply_text = match self.replier.reply(&history, self.settings.model).await {
            Ok(text) => text,
            Err(e) => return self.abort(ticket, e).await,
        };

        {
            let mut state = self.state.lock().await;
            if state.session() != ticket {
                return Ok(Self::discarded(ticket, Phase::Replying));
            }
            state.append_assistant(reply_text.clone(), Local::now());
            state.set_phase(Phase::Synthesizing);
        }

        // Synthesizing: failure only costs the audio, the text is committed
        let speech = match self
            .synthesizer
            .synthesize(&reply_text, &self.settings.language)
            .await
        {
            Ok(clip) => Some(clip),
            Err(e) => {
                tracing::warn!(error = %e, "speech synthesis failed, reply shown as text only");
                None
            }
        };

        let chat_log = {
            let mut state = self.state.lock().await;
            if state.session() != ticket {
                return Ok(Self::discarded(ticket, Phase::Synthesizing));
            }
            state.set_phase(Phase::Idle);
            state.chat_log().to_vec()
        };

        tracing::info!(session = %ticket, entries = chat_log.len(), "turn complete");

        Ok(TurnOutcome::Completed(TurnReport {
            user_text,
            reply_text,
            chat_log,
            speech,
        }))
    }

    /// Clear the conversation back to just the system prompt
    ///
    /// Valid in any phase. Results of calls already in flight are dropped
    /// when they arrive.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        let previous = state.session();
        state.initialize(self.settings.system_prompt.clone());
        tracing::info!(%previous, session = %state.session(), "conversation reset");
    }

    /// Copy of the current conversation state
    pub async fn snapshot(&self) -> ConversationState {
        self.state.lock().await.clone()
    }

    /// Current visible transcript
    pub async fn chat_log(&self) -> Vec<ChatLogEntry> {
        self.state.lock().await.chat_log().to_vec()
    }

    /// Current phase
    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase()
    }

    /// Return to `Idle` after a failed stage and surface the error
    async fn abort(&self, ticket: SessionId, error: Error) -> Result<TurnOutcome> {
        let mut state = self.state.lock().await;
        if state.session() != ticket {
            return Ok(Self::discarded(ticket, state.phase()));
        }

        let failed = state.phase();
        state.set_phase(Phase::Idle);
        tracing::warn!(phase = ?failed, error = %error, "turn aborted");
        Err(error)
    }

    fn discarded(ticket: SessionId, stage: Phase) -> TurnOutcome {
        tracing::debug!(session = %ticket, ?stage, "conversation was reset, dropping result");
        TurnOutcome::Discarded
    }
}
