use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use voicebot::config::Config;
use voicebot::render::{render_html, render_terminal};
use voicebot::voice::{AudioPlayback, Recorder, SAMPLE_RATE, TtsProvider, rms};
use voicebot::{
    AudioSample, IgnoreReason, Orchestrator, Synthesizer, TextToSpeech, TurnOutcome, TurnReport,
};

/// Voicebot - talk to a language model and hear it answer
#[derive(Parser)]
#[command(name = "voicebot", version, about)]
struct Cli {
    /// Reply model ("gpt-4" or "gpt-3.5-turbo")
    #[arg(short, long)]
    model: Option<String>,

    /// Persona/instruction prompt
    #[arg(long)]
    system_prompt: Option<String>,

    /// Spoken reply language (e.g. "ko", "en")
    #[arg(short, long)]
    language: Option<String>,

    /// Write the rendered HTML transcript here after every turn
    #[arg(long)]
    html: Option<PathBuf>,

    /// Don't play synthesized replies
    #[arg(long, env = "VOICEBOT_MUTE")]
    mute: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single turn from a WAV recording
    Ask {
        /// Path to a WAV file
        file: PathBuf,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
    /// Test TTS output
    TestTts {
        /// Text to speak
        #[arg(default_value = "안녕하세요! 음성 합성 테스트입니다.")]
        text: String,
    },
    /// Interactive first-run setup
    Setup,
}

/// Where finished turns go
struct Output {
    playback: Option<AudioPlayback>,
    html: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,voicebot=info",
        1 => "info,voicebot=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(Command::Setup) = cli.command {
        return voicebot::setup::run_setup();
    }

    let mut config = Config::load()?;
    if let Some(model) = &cli.model {
        config.model = model.parse()?;
    }
    if let Some(prompt) = cli.system_prompt.clone() {
        config.system_prompt = prompt;
    }
    if let Some(language) = cli.language.clone() {
        config.voice.language = language;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Some(Command::TestMic { duration }) => return test_mic(duration).await,
        Some(Command::TestSpeaker) => return test_speaker().await,
        Some(Command::TestTts { text }) => return test_tts(&config, &text).await,
        Some(Command::Ask { file }) => {
            let output = open_output(cli.mute, cli.html);
            return ask(&config, &file, &output).await;
        }
        Some(Command::Setup) | None => {}
    }

    let output = open_output(cli.mute, cli.html);
    run_session(&config, &output).await
}

fn open_output(mute: bool, html: Option<PathBuf>) -> Output {
    let playback = if mute {
        None
    } else {
        AudioPlayback::new()
            .map_err(|e| tracing::warn!(error = %e, "no audio output, replies will be text only"))
            .ok()
    };
    Output { playback, html }
}

/// Interactive conversation on the microphone
///
/// Runs until `quit` or end of input. Recoverable failures are shown as a
/// warning and the loop keeps going; only a missing credential ends it early.
#[allow(clippy::future_not_send)]
async fn run_session(config: &Config, output: &Output) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let mut recorder: Option<Recorder> = None;
    let mut last: Option<AudioSample> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    tracing::info!(model = %config.model, language = %config.voice.language, "voicebot ready");
    println!("Press Enter to start recording, Enter again to stop.");
    println!("Commands: replay, history, reset, quit\n");

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "stdin unreadable, ending session");
                break;
            }
        };

        match line.trim() {
            "" if recorder.as_ref().is_some_and(Recorder::is_recording) => {
                last = recorder.as_mut().and_then(Recorder::stop);
                let sample = last.as_ref();
                if let Some(s) = sample {
                    println!("recorded {:.1}s", s.duration_secs());
                }
                run_turn(&orchestrator, sample, &mut lines, output).await?;
            }
            "" => match start_recording(&mut recorder) {
                Ok(()) => println!("recording... press Enter to stop"),
                Err(e) => surface(e)?,
            },
            "replay" => run_turn(&orchestrator, last.as_ref(), &mut lines, output).await?,
            "history" => print!("{}", render_terminal(&orchestrator.chat_log().await)),
            "reset" => {
                orchestrator.reset().await;
                println!("conversation cleared");
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    if let Some(recorder) = recorder.as_mut() {
        recorder.stop();
    }
    Ok(())
}

/// Open the input device on first use, then start a new utterance
///
/// A device that failed to open is retried on the next attempt.
fn start_recording(recorder: &mut Option<Recorder>) -> voicebot::Result<()> {
    if recorder.is_none() {
        *recorder = Some(Recorder::new()?);
    }
    match recorder.as_mut() {
        Some(r) => r.start(),
        None => Ok(()),
    }
}

/// Show a recoverable error as a warning; pass a fatal one up
fn surface(error: voicebot::Error) -> anyhow::Result<()> {
    if error.is_recoverable() {
        tracing::warn!(error = %error, "action failed");
        println!("warning: {error}");
        Ok(())
    } else {
        Err(error.into())
    }
}

/// One turn from a WAV file
#[allow(clippy::future_not_send)]
async fn ask(config: &Config, file: &Path, output: &Output) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::from_config(config)?;
    let sample = AudioSample::from_wav_file(file)?;
    let outcome = orchestrator.on_new_audio(Some(&sample)).await;
    present(outcome, output).await
}

/// Drive a turn while still accepting `reset` from stdin
#[allow(clippy::future_not_send)]
async fn run_turn(
    orchestrator: &Orchestrator,
    sample: Option<&AudioSample>,
    lines: &mut Lines<BufReader<Stdin>>,
    output: &Output,
) -> anyhow::Result<()> {
    let turn = orchestrator.on_new_audio(sample);
    tokio::pin!(turn);
    let mut stdin_open = true;

    let outcome = loop {
        tokio::select! {
            outcome = &mut turn => break outcome,
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(l)) if l.trim() == "reset" => {
                    orchestrator.reset().await;
                    println!("conversation cleared");
                }
                Ok(Some(_)) => println!("(working on it; type `reset` to cancel)"),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    tracing::warn!(error = %e, "stdin unreadable during turn");
                    stdin_open = false;
                }
            },
        }
    };

    present(outcome, output).await
}

/// Show the result of a turn; recoverable errors become a visible warning
#[allow(clippy::future_not_send)]
async fn present(outcome: voicebot::Result<TurnOutcome>, output: &Output) -> anyhow::Result<()> {
    match outcome {
        Ok(TurnOutcome::Completed(report)) => show_report(&report, output).await,
        Ok(TurnOutcome::Ignored(IgnoreReason::Empty)) => println!("nothing was recorded"),
        Ok(TurnOutcome::Ignored(IgnoreReason::Duplicate)) => {
            println!("that recording was already answered");
        }
        Ok(TurnOutcome::Ignored(IgnoreReason::Busy)) => println!("still working on the last one"),
        Ok(TurnOutcome::Discarded) => println!("previous turn discarded"),
        Err(e) => return surface(e),
    }
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn show_report(report: &TurnReport, output: &Output) {
    println!("\n{}", render_terminal(&report.chat_log));

    if let Some(path) = &output.html {
        let html = render_html(&report.chat_log, report.speech.as_ref());
        if let Err(e) = tokio::fs::write(path, html).await {
            tracing::warn!(path = %path.display(), error = %e, "failed to write transcript");
        }
    }

    if let (Some(playback), Some(clip)) = (&output.playback, &report.speech) {
        if let Err(e) = playback.play_clip(clip).await {
            tracing::warn!(error = %e, "playback failed");
        }
    }
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut recorder = Recorder::new()?;
    recorder.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = recorder.peek();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        recorder.clear();
    }

    recorder.stop();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    Ok(())
}

/// Test speaker output with a sine wave
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let playback = AudioPlayback::new()?;

    let sample_rate = voicebot::voice::PLAYBACK_SAMPLE_RATE;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..sample_rate * 2)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * 440.0 * t).sin() * 0.3
        })
        .collect();

    playback.play(samples, sample_rate).await?;

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    Ok(())
}

/// Test TTS output with the configured provider
#[allow(clippy::future_not_send)]
async fn test_tts(config: &Config, text: &str) -> anyhow::Result<()> {
    // Every action needs the credential, even the keyless Google provider
    let api_key = config.credential()?.clone();
    println!("Testing TTS with text: \"{text}\"\n");

    let tts: Arc<dyn Synthesizer> = match config.voice.tts_provider {
        TtsProvider::Google => Arc::new(TextToSpeech::new_google(config.timeout)?),
        TtsProvider::OpenAI => Arc::new(
            TextToSpeech::new_openai(
                api_key,
                config.voice.tts_voice.clone(),
                config.voice.tts_speed,
                config.timeout,
            )?
            .with_endpoint(&config.api_base),
        ),
    };

    println!("Synthesizing speech with {}...", tts.name());
    let clip = tts.synthesize(text, &config.voice.language).await?;
    println!("Got {} bytes of audio data", clip.bytes().len());

    println!("Playing audio...");
    AudioPlayback::new()?.play_clip(&clip).await?;

    println!("\n---");
    println!("If you heard the speech, TTS is working!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_errors_keep_session_alive() {
        assert!(surface(voicebot::Error::Audio("no input device available".to_string())).is_ok());
        assert!(surface(voicebot::Error::Synthesis("provider down".to_string())).is_ok());
    }

    #[test]
    fn test_missing_credential_ends_session() {
        let err = surface(voicebot::Error::CredentialMissing).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<voicebot::Error>(),
            Some(voicebot::Error::CredentialMissing)
        ));
    }

    #[test]
    fn test_tts_check_requires_credential() {
        let err = tokio_test::block_on(test_tts(&Config::default(), "hello")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<voicebot::Error>(),
            Some(voicebot::Error::CredentialMissing)
        ));
    }
}
