//! Shared test utilities
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use voicebot::voice::SAMPLE_RATE;
use voicebot::{
    AudioSample, ChatModel, Error, MessageHistory, Orchestrator, ReplyClient, Result, SpeechClip,
    Synthesizer, Transcriber, TurnSettings,
};

pub const SYSTEM_PROMPT: &str = "S";

/// A short recording whose content (and fingerprint) depends on `level`
#[must_use]
pub fn utterance(level: f32) -> AudioSample {
    AudioSample::new(vec![level; 1600], SAMPLE_RATE)
}

/// Orchestrator over test doubles with system prompt "S"
pub fn orchestrator(
    transcriber: Arc<dyn Transcriber>,
    replier: Arc<dyn ReplyClient>,
    synthesizer: Arc<dyn Synthesizer>,
) -> Orchestrator {
    Orchestrator::new(
        transcriber,
        replier,
        synthesizer,
        TurnSettings {
            model: ChatModel::Gpt4,
            system_prompt: SYSTEM_PROMPT.to_string(),
            language: "ko".to_string(),
        },
    )
}

/// Transcriber that plays back a fixed script of results
pub struct ScriptedTranscriber {
    script: Mutex<VecDeque<Result<String>>>,
    calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new(script: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn texts(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok((*t).to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _sample: &AudioSample) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Transcription("script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted-stt"
    }
}

/// Reply client that plays back a script and records what it was sent
pub struct ScriptedReply {
    script: Mutex<VecDeque<Result<String>>>,
    seen: Mutex<Vec<(MessageHistory, ChatModel)>>,
}

impl ScriptedReply {
    pub fn new(script: Vec<Result<String>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn texts(texts: &[&str]) -> Arc<Self> {
        Self::new(texts.iter().map(|t| Ok((*t).to_string())).collect())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<(MessageHistory, ChatModel)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReplyClient for ScriptedReply {
    async fn reply(&self, history: &MessageHistory, model: ChatModel) -> Result<String> {
        self.seen.lock().unwrap().push((history.clone(), model));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Reply("script exhausted".to_string())))
    }

    fn name(&self) -> &'static str {
        "scripted-llm"
    }
}

/// Synthesizer that either returns a tiny clip or always fails
pub struct StubSynth {
    fail: bool,
    calls: AtomicUsize,
    languages: Mutex<Vec<String>>,
}

impl StubSynth {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail: false,
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Synthesizer for StubSynth {
    async fn synthesize(&self, text: &str, language: &str) -> Result<SpeechClip> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.languages.lock().unwrap().push(language.to_string());
        if self.fail {
            return Err(Error::Synthesis("provider down".to_string()));
        }
        Ok(SpeechClip::mp3(text.as_bytes().to_vec()))
    }

    fn name(&self) -> &'static str {
        "stub-tts"
    }
}

/// Pause point inside a fake provider call
///
/// The call signals `started` on entry and then waits for `release`.
#[derive(Default)]
pub struct Gate {
    pub started: Notify,
    pub release: Notify,
}

impl Gate {
    pub async fn pass(&self) {
        self.started.notify_one();
        self.release.notified().await;
    }
}

/// Transcriber whose first call blocks on a gate; later calls answer at once
pub struct GatedTranscriber {
    pub gate: Gate,
    text: String,
    fail_first: bool,
    calls: AtomicUsize,
}

impl GatedTranscriber {
    pub fn new(text: &str) -> Arc<Self> {
        Self::build(text, false)
    }

    /// First call fails once released
    pub fn failing(text: &str) -> Arc<Self> {
        Self::build(text, true)
    }

    fn build(text: &str, fail_first: bool) -> Arc<Self> {
        Arc::new(Self {
            gate: Gate::default(),
            text: text.to_string(),
            fail_first,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transcriber for GatedTranscriber {
    async fn transcribe(&self, _sample: &AudioSample) -> Result<String> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.pass().await;
            if self.fail_first {
                return Err(Error::Transcription("connection reset".to_string()));
            }
        }
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "gated-stt"
    }
}

/// Reply client that blocks on a gate before answering
pub struct GatedReply {
    pub gate: Gate,
    text: String,
}

impl GatedReply {
    pub fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            gate: Gate::default(),
            text: text.to_string(),
        })
    }
}

#[async_trait]
impl ReplyClient for GatedReply {
    async fn reply(&self, _history: &MessageHistory, _model: ChatModel) -> Result<String> {
        self.gate.pass().await;
        Ok(self.text.clone())
    }

    fn name(&self) -> &'static str {
        "gated-llm"
    }
}

/// Synthesizer whose first call blocks on a gate; later calls answer at once
pub struct GatedSynth {
    pub gate: Gate,
    calls: AtomicUsize,
}

impl GatedSynth {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            gate: Gate::default(),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Synthesizer for GatedSynth {
    async fn synthesize(&self, text: &str, _language: &str) -> Result<SpeechClip> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            self.gate.pass().await;
        }
        Ok(SpeechClip::mp3(text.as_bytes().to_vec()))
    }

    fn name(&self) -> &'static str {
        "gated-tts"
    }
}

/// Canned response for requests whose target starts with `path`
#[derive(Clone)]
pub struct Route {
    pub path: &'static str,
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn json(path: &'static str, status: u16, body: &str) -> Self {
        Self {
            path,
            status,
            content_type: "application/json",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn audio(path: &'static str, body: &[u8]) -> Self {
        Self {
            path,
            status: 200,
            content_type: "audio/mpeg",
            body: body.to_vec(),
        }
    }
}

/// A request captured by [`MockServer`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
struct ServerState {
    routes: Arc<Vec<Route>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Local stand-in for the provider APIs, answering from a route table
pub struct MockServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests: Arc<Mutex<Vec<RecordedRequest>>> = Arc::default();

        let state = ServerState {
            routes: Arc::new(routes),
            requests: Arc::clone(&requests),
        };
        let router = Router::new().fallback(respond).with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { addr, requests }
    }

    /// Accepts connections and never answers
    pub async fn silent() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        Self {
            addr,
            requests: Arc::default(),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

/// Record the request, then answer from the first route whose path prefixes it
async fn respond(
    State(state): State<ServerState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let target = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), ToString::to_string);

    state.requests.lock().unwrap().push(RecordedRequest {
        method: method.to_string(),
        target: target.clone(),
        headers,
        body,
    });

    match state.routes.iter().find(|r| target.starts_with(r.path)) {
        Some(route) => (
            StatusCode::from_u16(route.status).unwrap(),
            [(header::CONTENT_TYPE, route.content_type)],
            route.body.clone(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
