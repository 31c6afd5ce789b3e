//! Daemon - the voice-driven robot service
//!
//! Wires capture, wake phrase matching, STT, planning, dispatch and speech
//! into one loop that runs until interrupted.

use std::future::Future;
use std::sync::Arc;

use crate::agent::{ChatPlanner, Planner, Session, Turn};
use crate::clock::{Clock, InstantClock, TokioClock};
use crate::config::{AudioConfig, Config};
use crate::voice::{
    AudioCapture, FrameSource, LocalSpeech, Speaker, SpeechToText, SttProvider, TextToSpeech,
    Transcriber, TtsProvider, VoiceOutput, WakePhraseMatcher, listen,
};
use crate::world::{CommandDispatcher, WorldModel};
use crate::{Error, Result};

/// What one pass of the voice loop amounted to
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// No speech, nothing recognized, or no wake phrase
    Idle,
    /// Woken, but no command was understood
    NoCommand,
    /// Woken and a command was handled
    Handled(Turn),
}

/// Wake listen, command listen and turn handling over any audio source
pub struct VoiceLoop<F, T, P, S> {
    source: F,
    transcriber: T,
    matcher: WakePhraseMatcher,
    audio: AudioConfig,
    language: Option<String>,
    session: Session<P, S>,
}

impl<F, T, P, S> VoiceLoop<F, T, P, S>
where
    F: FrameSource,
    T: Transcriber,
    P: Planner,
    S: Speaker,
{
    #[must_use]
    pub const fn new(
        source: F,
        transcriber: T,
        matcher: WakePhraseMatcher,
        audio: AudioConfig,
        language: Option<String>,
        session: Session<P, S>,
    ) -> Self {
        Self {
            source,
            transcriber,
            matcher,
            audio,
            language,
            session,
        }
    }

    #[must_use]
    pub const fn session(&self) -> &Session<P, S> {
        &self.session
    }

    /// Capture one utterance and transcribe it
    ///
    /// Recognition failures are logged and read as silence.
    async fn hear(&mut self, timeout: std::time::Duration) -> Result<Option<String>> {
        let Some(utterance) = listen(&mut self.source, &self.audio.segmenter, timeout).await? else {
            return Ok(None);
        };

        let wav = utterance.to_wav()?;
        match self
            .transcriber
            .transcribe(&wav, self.language.as_deref())
            .await
        {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.is_recoverable() => {
                tracing::debug!(error = %e, "nothing recognized");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Wait for the wake phrase, then take and handle one command
    ///
    /// A command spoken in the same breath as the wake phrase is used
    /// directly and no second capture happens.
    ///
    /// # Errors
    ///
    /// Returns error only when the audio source fails
    #[allow(clippy::future_not_send)]
    pub async fn cycle(&mut self) -> Result<CycleOutcome> {
        let Some(transcript) = self.hear(self.audio.wake_timeout).await? else {
            return Ok(CycleOutcome::Idle);
        };

        let wake = self.matcher.check(&transcript);
        if !wake.matched {
            return Ok(CycleOutcome::Idle);
        }

        let inline = wake.command();
        let command = if inline.is_empty() {
            self.session.acknowledge().await;
            self.hear(self.audio.command_timeout).await?
        } else {
            tracing::debug!(command = %inline, "command spoken with wake phrase");
            Some(inline)
        };

        let Some(command) = command else {
            self.session.ask_to_repeat().await;
            return Ok(CycleOutcome::NoCommand);
        };

        Ok(CycleOutcome::Handled(self.session.respond(&command).await))
    }

    /// Greet, cycle until `shutdown` resolves, then say goodbye
    ///
    /// A cycle interrupted by shutdown is dropped mid-flight; the capture
    /// guard stops the source.
    ///
    /// # Errors
    ///
    /// Returns error if the audio source fails
    #[allow(clippy::future_not_send)]
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<Session<P, S>> {
        tokio::pin!(shutdown);

        self.session.greet().await;
        tracing::info!(
            name = self.session.name(),
            phrases = ?self.matcher.phrases(),
            "standing by for wake phrase"
        );

        let result = loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break Ok(());
                }
                outcome = self.cycle() => match outcome {
                    Ok(CycleOutcome::Handled(turn)) => {
                        if let Some(report) = &turn.report {
                            tracing::info!(%report, "command handled");
                        }
                        tracing::info!("returning to standby");
                    }
                    Ok(CycleOutcome::Idle | CycleOutcome::NoCommand) => {}
                    Err(e) if e.is_recoverable() => {
                        tracing::warn!(error = %e, "voice cycle failed");
                    }
                    Err(e) => break Err(e),
                },
            }
        };

        self.session.farewell().await;
        result.map(|()| self.session)
    }
}

/// Clock for simulated actuation; instant unless real time is configured
#[must_use]
pub fn dispatch_clock(config: &Config) -> Arc<dyn Clock> {
    if config.world.realtime {
        Arc::new(TokioClock)
    } else {
        Arc::new(InstantClock::new())
    }
}

/// # Errors
///
/// Returns error if the `OpenAI` key is missing
pub fn build_planner(config: &Config) -> Result<ChatPlanner> {
    let key = config
        .api_keys
        .openai
        .clone()
        .ok_or_else(|| Error::Config("OPENAI_API_KEY not set".to_string()))?;
    let planner = ChatPlanner::new(key, config.planner.model.clone(), config.robot_name.clone())?
        .with_temperature(config.planner.temperature);
    Ok(match &config.planner.endpoint {
        Some(endpoint) => planner.with_endpoint(endpoint.clone()),
        None => planner,
    })
}

/// # Errors
///
/// Returns error if the key for the configured provider is missing
pub fn build_transcriber(config: &Config) -> Result<SpeechToText> {
    let (key, name) = match config.stt.provider {
        SttProvider::Whisper => (config.api_keys.openai.clone(), "OPENAI_API_KEY"),
        SttProvider::Deepgram => (config.api_keys.deepgram.clone(), "DEEPGRAM_API_KEY"),
    };
    let key = key.ok_or_else(|| Error::Config(format!("{name} not set")))?;
    SpeechToText::new(config.stt.provider, key, config.stt.model.clone())
}

/// Cloud TTS when enabled and keyed, local speech command as fallback
#[must_use]
pub fn build_speaker(config: &Config) -> VoiceOutput {
    let tts = &config.tts;
    let cloud = if tts.enabled {
        let result = match tts.provider {
            TtsProvider::OpenAI => config.api_keys.openai.clone().map(|key| {
                TextToSpeech::new_openai(key, tts.voice.clone(), tts.speed, tts.model.clone())
            }),
            TtsProvider::ElevenLabs => config.api_keys.elevenlabs.clone().map(|key| {
                TextToSpeech::new_elevenlabs(key, tts.voice.clone(), tts.model.clone())
            }),
        };
        match result {
            Some(Ok(tts)) => Some(tts),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "cloud TTS unavailable");
                None
            }
            None => {
                tracing::info!("no TTS key configured, using local speech");
                None
            }
        }
    } else {
        None
    };

    let local = LocalSpeech::detect(tts.local_voice.clone());
    if cloud.is_none() && local.is_none() {
        tracing::warn!("no speech output available, replies will only be logged");
    }
    VoiceOutput::new(cloud, local)
}

/// A fresh session on the seeded world
///
/// # Errors
///
/// Returns error if no planner can be built
pub fn build_session<S: Speaker>(config: &Config, speaker: S) -> Result<Session<ChatPlanner, S>> {
    Ok(Session::new(
        config.robot_name.clone(),
        build_planner(config)?,
        speaker,
        CommandDispatcher::new(dispatch_clock(config)),
        WorldModel::seeded(config.world.settings),
    ))
}

/// The voxarm daemon - owns configuration and runs the voice loop
pub struct Daemon {
    config: Config,
}

impl Daemon {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Run the voice session until Ctrl+C
    ///
    /// # Errors
    ///
    /// Returns error if a collaborator cannot be built or the microphone fails
    #[allow(clippy::future_not_send)]
    pub async fn run(self) -> Result<()> {
        let config = self.config;

        let matcher = config.wake.matcher()?;
        let transcriber = build_transcriber(&config)?;
        let session = build_session(&config, build_speaker(&config))?;
        let capture = AudioCapture::new(config.audio.segmenter.sample_rate)?;

        let voice = VoiceLoop::new(
            capture,
            transcriber,
            matcher,
            config.audio,
            config.stt.language.clone(),
            session,
        );

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        };

        let session = voice.run(shutdown).await?;
        tracing::debug!(log = ?session.world().recent_log(10), "final action log");
        Ok(())
    }
}
