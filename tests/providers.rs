//! HTTP adapters against a local stand-in server

mod common;

use std::time::Duration;

use common::{MockServer, Route, utterance};
use secrecy::SecretString;
use voicebot::voice::TtsProvider;
use voicebot::{
    ChatModel, Config, Error, MessageHistory, OpenAiChat, Orchestrator, ReplyClient, SpeechToText,
    Synthesizer, TextToSpeech, Transcriber, TurnOutcome,
};

const TIMEOUT: Duration = Duration::from_secs(5);

fn key() -> SecretString {
    SecretString::from("sk-test".to_string())
}

fn dir_is_empty(dir: &tempfile::TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

#[tokio::test]
async fn test_whisper_uploads_wav_and_returns_text() {
    let server = MockServer::start(vec![Route::json(
        "/v1/audio/transcriptions",
        200,
        r#"{"text":"Hello"}"#,
    )])
    .await;
    let scratch = tempfile::tempdir().unwrap();
    let stt = SpeechToText::new_whisper(key(), "whisper-1".to_string(), TIMEOUT)
        .unwrap()
        .with_base_url(format!("{}/v1", server.url()))
        .with_scratch_dir(scratch.path());

    let text = stt.transcribe(&utterance(0.1)).await.unwrap();
    assert_eq!(text, "Hello");

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.target, "/v1/audio/transcriptions");
    assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
    assert!(request.body_text().contains("whisper-1"));
    assert!(request.body_text().contains("RIFF"));

    assert!(dir_is_empty(&scratch));
}

#[tokio::test]
async fn test_whisper_auth_failure_is_transcription_error() {
    let server = MockServer::start(vec![Route::json(
        "/v1/audio/transcriptions",
        401,
        r#"{"error":{"message":"Incorrect API key"}}"#,
    )])
    .await;
    let scratch = tempfile::tempdir().unwrap();
    let stt = SpeechToText::new_whisper(key(), "whisper-1".to_string(), TIMEOUT)
        .unwrap()
        .with_base_url(format!("{}/v1", server.url()))
        .with_scratch_dir(scratch.path());

    let err = stt.transcribe(&utterance(0.1)).await.unwrap_err();
    assert!(matches!(err, Error::Transcription(_)));
    assert!(dir_is_empty(&scratch));
}

#[tokio::test]
async fn test_unresponsive_service_times_out() {
    let server = MockServer::silent().await;
    let stt = SpeechToText::new_whisper(key(), "whisper-1".to_string(), Duration::from_millis(200))
        .unwrap()
        .with_base_url(server.url());

    let err = stt.transcribe(&utterance(0.1)).await.unwrap_err();
    assert!(matches!(err, Error::Transcription(_)));
}

#[tokio::test]
async fn test_chat_sends_history_and_parses_reply() {
    let server = MockServer::start(vec![Route::json(
        "/v1/chat/completions",
        200,
        r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#,
    )])
    .await;
    let chat = OpenAiChat::new(key(), TIMEOUT)
        .unwrap()
        .with_base_url(format!("{}/v1", server.url()));

    let mut history = MessageHistory::new("S");
    history.push_user("Hello", chrono::Local::now());

    let reply = chat.reply(&history, ChatModel::Gpt35Turbo).await.unwrap();
    assert_eq!(reply, "Hi there");

    let requests = server.requests();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["model"], "gpt-3.5-turbo");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "S");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "Hello");
}

#[tokio::test]
async fn test_chat_unknown_model_is_reply_error() {
    let server = MockServer::start(vec![Route::json(
        "/v1/chat/completions",
        404,
        r#"{"error":{"code":"model_not_found"}}"#,
    )])
    .await;
    let chat = OpenAiChat::new(key(), TIMEOUT)
        .unwrap()
        .with_base_url(format!("{}/v1", server.url()));

    let err = chat
        .reply(&MessageHistory::new("S"), ChatModel::Gpt4)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Reply(_)));
}

#[tokio::test]
async fn test_google_tts_requests_one_chunk_per_piece() {
    let server = MockServer::start(vec![Route::audio("/translate_tts", b"MP3")]).await;
    let scratch = tempfile::tempdir().unwrap();
    let tts = TextToSpeech::new_google(TIMEOUT)
        .unwrap()
        .with_endpoint(format!("{}/translate_tts", server.url()))
        .with_scratch_dir(scratch.path());

    let text = "word ".repeat(50);
    let clip = tts.synthesize(&text, "ko").await.unwrap();

    let requests = server.requests();
    assert_eq!(requests.len(), 3);
    assert!(requests.iter().all(|r| r.target.contains("tl=ko")));
    assert!(requests[0].target.contains("idx=0"));
    assert!(requests[2].target.contains("total=3"));
    assert_eq!(clip.bytes(), b"MP3MP3MP3");
    assert_eq!(clip.mime(), "audio/mp3");
    assert!(dir_is_empty(&scratch));
}

#[tokio::test]
async fn test_tts_server_error_is_synthesis_error() {
    let server = MockServer::start(vec![Route::json("/translate_tts", 500, "{}")]).await;
    let scratch = tempfile::tempdir().unwrap();
    let tts = TextToSpeech::new_google(TIMEOUT)
        .unwrap()
        .with_endpoint(format!("{}/translate_tts", server.url()))
        .with_scratch_dir(scratch.path());

    let err = tts.synthesize("hello", "ko").await.unwrap_err();
    assert!(matches!(err, Error::Synthesis(_)));
    assert!(dir_is_empty(&scratch));
}

#[tokio::test]
async fn test_full_turn_over_http() {
    let server = MockServer::start(vec![
        Route::json("/v1/audio/transcriptions", 200, r#"{"text":"Hello"}"#),
        Route::json(
            "/v1/chat/completions",
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"Hi there"}}]}"#,
        ),
        Route::audio("/v1/audio/speech", b"ID3 speech"),
    ])
    .await;

    let mut config = Config {
        api_key: Some(key()),
        api_base: format!("{}/v1", server.url()),
        system_prompt: "S".to_string(),
        timeout: TIMEOUT,
        ..Config::default()
    };
    config.voice.tts_provider = TtsProvider::OpenAI;

    let bot = Orchestrator::from_config(&config).unwrap();
    let outcome = bot.on_new_audio(Some(&utterance(0.1))).await.unwrap();

    let report = match outcome {
        TurnOutcome::Completed(report) => report,
        other => panic!("expected a completed turn, got {other:?}"),
    };
    assert_eq!(report.user_text, "Hello");
    assert_eq!(report.reply_text, "Hi there");
    assert_eq!(report.speech.unwrap().bytes(), b"ID3 speech");

    let targets: Vec<_> = server.requests().into_iter().map(|r| r.target).collect();
    assert_eq!(
        targets,
        vec![
            "/v1/audio/transcriptions",
            "/v1/chat/completions",
            "/v1/audio/speech",
        ]
    );
}
