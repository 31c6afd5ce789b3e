//! Voice processing module
//!
//! Capture, segmentation into utterances, wake phrase matching and the
//! speech services on either side of the planner.

mod capture;
mod frame;
mod listener;
mod playback;
mod segmenter;
mod stt;
mod tts;
mod wake_phrase;

pub use capture::{ActiveSource, AudioCapture, FrameSource};
pub use frame::{AudioFrame, FrameChunker, Utterance, mean_abs, samples_to_wav};
pub use listener::listen;
pub use playback::{AudioPlayback, decode_mp3};
pub use segmenter::{AudioSegmenter, SegmenterConfig, SegmenterState};
pub use stt::{SpeechToText, SttProvider, Transcriber, non_empty};
pub use tts::{LocalSpeech, PrintSpeaker, Speaker, TextToSpeech, TtsProvider, VoiceOutput};
pub use wake_phrase::{
    DEFAULT_WAKE_FRAGMENTS, DEFAULT_WAKE_PHRASES, MatchTier, WakeMatch, WakePhraseMatcher,
};
