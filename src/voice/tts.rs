//! Text-to-speech (TTS) processing
//!
//! Cloud synthesis is preferred; when it is unavailable or fails the
//! platform speech command is used instead. Speaking never fails a session.

use std::path::PathBuf;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::playback::AudioPlayback;
use crate::{Error, Result};

/// Something that can say a line out loud
///
/// Implementations swallow their own failures; the caller never waits on an
/// error path.
#[async_trait(?Send)]
pub trait Speaker {
    async fn speak(&self, text: &str);
}

/// TTS provider backend
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TtsProvider {
    OpenAI,
    ElevenLabs,
}

impl std::str::FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_openai(
        api_key: SecretString,
        voice: String,
        speed: f32,
        model: String,
    ) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
            provider: TtsProvider::OpenAI,
        })
    }

    /// Create a new TTS instance using ElevenLabs
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_elevenlabs(api_key: SecretString, voice_id: String, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "ElevenLabs API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice: voice_id,
            speed: 1.0, // ElevenLabs doesn't use speed in the same way
            model,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAI => self.synthesize_openai(text).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text).await,
        }
    }

    async fn synthesize_openai(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }

    async fn synthesize_elevenlabs(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// Speech through a platform command (`say` on macOS, `espeak` elsewhere)
#[derive(Debug, Clone)]
pub struct LocalSpeech {
    program: PathBuf,
    voice: Option<String>,
}

impl LocalSpeech {
    /// Locate a speech command on `PATH`
    #[must_use]
    pub fn detect(voice: Option<String>) -> Option<Self> {
        ["say", "espeak-ng", "espeak"]
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(|program| {
                tracing::debug!(program = %program.display(), "local speech available");
                Self { program, voice }
            })
    }

    /// # Errors
    ///
    /// Returns error if the command cannot be run or exits non-zero
    pub async fn say(&self, text: &str) -> Result<()> {
        let mut command = tokio::process::Command::new(&self.program);
        if let Some(voice) = &self.voice {
            command.arg("-v").arg(voice);
        }
        let status = command
            .arg(text)
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::Tts(format!(
                "{} exited with {status}",
                self.program.display()
            )))
        }
    }
}

/// Cloud TTS with local fallback, played on the default output device
#[derive(Default)]
pub struct VoiceOutput {
    cloud: Option<(TextToSpeech, AudioPlayback)>,
    local: Option<LocalSpeech>,
}

impl VoiceOutput {
    #[must_use]
    pub fn new(cloud: Option<TextToSpeech>, local: Option<LocalSpeech>) -> Self {
        let cloud = cloud.and_then(|tts| match AudioPlayback::new() {
            Ok(playback) => Some((tts, playback)),
            Err(e) => {
                tracing::warn!(error = %e, "no playback device, cloud TTS disabled");
                None
            }
        });
        Self { cloud, local }
    }

    /// Whether any way of producing sound is configured
    #[must_use]
    pub const fn is_audible(&self) -> bool {
        self.cloud.is_some() || self.local.is_some()
    }

    async fn speak_cloud(&self, text: &str) -> Result<bool> {
        let Some((tts, playback)) = &self.cloud else {
            return Ok(false);
        };
        let audio = tts.synthesize(text).await?;
        playback.play_mp3(&audio)?;
        Ok(true)
    }
}

#[async_trait(?Send)]
impl Speaker for VoiceOutput {
    async fn speak(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        tracing::info!(text, "speaking");

        match self.speak_cloud(text).await {
            Ok(true) => return,
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "cloud TTS failed, falling back"),
        }

        if let Some(local) = &self.local {
            if let Err(e) = local.say(text).await {
                tracing::warn!(error = %e, "local speech failed");
            }
        }
    }
}

/// Prints lines instead of speaking them
#[derive(Debug, Clone, Copy, Default)]
pub struct PrintSpeaker;

#[async_trait(?Send)]
impl Speaker for PrintSpeaker {
    async fn speak(&self, text: &str) {
        if !text.trim().is_empty() {
            println!("{text}");
        }
    }
}
