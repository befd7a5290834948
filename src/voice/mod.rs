//! Voice processing module
//!
//! Recording, speech-to-text, text-to-speech and playback. The network
//! clients sit behind the [`Transcriber`] and [`Synthesizer`] traits so the
//! conversation loop can run against any provider.

mod capture;
mod playback;
mod sample;
pub mod stt;
pub mod tts;

pub use capture::{Recorder, rms};
pub use playback::{AudioPlayback, PLAYBACK_SAMPLE_RATE, decode_mp3};
pub use sample::{AudioSample, Fingerprint, SAMPLE_RATE, samples_to_wav};
pub use stt::{SpeechToText, Transcriber};
pub use tts::{DEFAULT_LANGUAGE, SpeechClip, Synthesizer, TextToSpeech, TtsProvider};
