//! Configuration management for voxarm
//!
//! Priority, lowest first: built-in defaults, the TOML file, environment
//! variables (API keys only), then command-line flags applied by the binary.

pub mod file;

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;

use crate::voice::{
    DEFAULT_WAKE_FRAGMENTS, DEFAULT_WAKE_PHRASES, SegmenterConfig, SttProvider, TtsProvider,
    WakePhraseMatcher,
};
use crate::world::{Vec3, Workspace, WorldSettings};
use crate::{Error, Result};

use self::file::ConfigFile;

/// Default robot name
pub const DEFAULT_ROBOT_NAME: &str = "Jarvis";

/// voxarm configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub robot_name: String,
    pub audio: AudioConfig,
    pub wake: WakeConfig,
    pub stt: SttConfig,
    pub planner: PlannerConfig,
    pub tts: TtsConfig,
    pub world: WorldConfig,
    pub api_keys: ApiKeys,
}

/// Microphone, segmentation and listen timeouts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioConfig {
    pub segmenter: SegmenterConfig,

    /// Length of one wake listen before it starts over
    pub wake_timeout: Duration,

    /// How long to wait for the command after a wake phrase
    pub command_timeout: Duration,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            segmenter: SegmenterConfig::default(),
            wake_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeConfig {
    pub phrases: Vec<String>,
    pub fragments: Vec<String>,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrases: DEFAULT_WAKE_PHRASES.iter().map(ToString::to_string).collect(),
            fragments: DEFAULT_WAKE_FRAGMENTS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl WakeConfig {
    /// # Errors
    ///
    /// Returns error if no usable phrase is configured
    pub fn matcher(&self) -> Result<WakePhraseMatcher> {
        WakePhraseMatcher::new(self.phrases.clone(), self.fragments.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SttConfig {
    pub provider: SttProvider,
    pub model: String,
    pub language: Option<String>,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: SttProvider::Whisper,
            model: "whisper-1".to_string(),
            language: Some("en".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    pub model: String,
    pub temperature: f32,
    pub endpoint: Option<String>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TtsConfig {
    /// Use cloud synthesis; the local command is always the fallback
    pub enabled: bool,
    pub provider: TtsProvider,
    pub model: String,
    pub voice: String,
    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,
    pub local_voice: Option<String>,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: TtsProvider::OpenAI,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
            local_voice: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorldConfig {
    pub settings: WorldSettings,

    /// Sleep through simulated actuation times
    pub realtime: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            settings: WorldSettings::default(),
            realtime: true,
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (planner, Whisper and TTS)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<SecretString>,

    /// `Deepgram` API key (optional STT)
    pub deepgram: Option<SecretString>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            robot_name: DEFAULT_ROBOT_NAME.to_string(),
            audio: AudioConfig::default(),
            wake: WakeConfig::default(),
            stt: SttConfig::default(),
            planner: PlannerConfig::default(),
            tts: TtsConfig::default(),
            world: WorldConfig::default(),
            api_keys: ApiKeys::default(),
        }
    }
}

impl Config {
    /// Load configuration from the TOML file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config path is unusable or the result
    /// fails validation
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let fc = file::load_config_file(path)?;
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed file and an environment lookup over the defaults
    ///
    /// # Errors
    ///
    /// Returns error for unknown provider names or invalid values
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        // API keys (env > toml > None), empty values count as unset
        let key = |var: &str, file: Option<String>| {
            env(var)
                .or(file)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from)
        };
        let api_keys = ApiKeys {
            openai: key("OPENAI_API_KEY", fc.api_keys.openai),
            elevenlabs: key("ELEVENLABS_API_KEY", fc.api_keys.elevenlabs),
            deepgram: key("DEEPGRAM_API_KEY", fc.api_keys.deepgram),
        };

        let a = fc.audio;
        let d = defaults.audio;
        let segmenter = SegmenterConfig {
            sample_rate: a.sample_rate.unwrap_or(d.segmenter.sample_rate),
            frame_duration: a
                .frame_ms
                .map_or(d.segmenter.frame_duration, Duration::from_millis),
            min_volume: a.min_volume.unwrap_or(d.segmenter.min_volume),
            max_silence: secs(a.max_silence_secs, "max_silence_secs")?
                .unwrap_or(d.segmenter.max_silence),
            max_duration: secs(a.max_duration_secs, "max_duration_secs")?
                .unwrap_or(d.segmenter.max_duration),
        };
        let audio = AudioConfig {
            segmenter,
            wake_timeout: secs(a.wake_timeout_secs, "wake_timeout_secs")?
                .unwrap_or(d.wake_timeout),
            command_timeout: secs(a.command_timeout_secs, "command_timeout_secs")?
                .unwrap_or(d.command_timeout),
        };

        let wake = WakeConfig {
            phrases: fc.wake.phrases.unwrap_or(defaults.wake.phrases),
            fragments: fc.wake.fragments.unwrap_or(defaults.wake.fragments),
        };

        let stt = SttConfig {
            provider: fc
                .stt
                .provider
                .as_deref()
                .map(str::parse::<SttProvider>)
                .transpose()?
                .unwrap_or(defaults.stt.provider),
            model: fc.stt.model.unwrap_or(defaults.stt.model),
            language: fc
                .stt
                .language
                .map_or(defaults.stt.language, |l| Some(l).filter(|l| !l.is_empty())),
        };

        let planner = PlannerConfig {
            model: fc.planner.model.unwrap_or(defaults.planner.model),
            temperature: fc
                .planner
                .temperature
                .unwrap_or(defaults.planner.temperature),
            endpoint: fc.planner.endpoint,
        };

        let tts = TtsConfig {
            enabled: fc.tts.enabled.unwrap_or(defaults.tts.enabled),
            provider: fc
                .tts
                .provider
                .as_deref()
                .map(str::parse::<TtsProvider>)
                .transpose()?
                .unwrap_or(defaults.tts.provider),
            model: fc.tts.model.unwrap_or(defaults.tts.model),
            voice: fc.tts.voice.unwrap_or(defaults.tts.voice),
            speed: fc.tts.speed.unwrap_or(defaults.tts.speed),
            local_voice: fc.tts.local_voice,
        };

        let w = defaults.world;
        let world = WorldConfig {
            settings: WorldSettings {
                pick_epsilon: fc.world.pick_epsilon.unwrap_or(w.settings.pick_epsilon),
                workspace: fc.world.workspace.map_or(w.settings.workspace, |[x, y, z]| {
                    Workspace {
                        limits: Vec3::new(x, y, z),
                    }
                }),
                home: w.settings.home,
            },
            realtime: fc.world.realtime.unwrap_or(w.realtime),
        };

        let config = Self {
            robot_name: fc.planner.robot_name.unwrap_or(defaults.robot_name),
            audio,
            wake,
            stt,
            planner,
            tts,
            world,
            api_keys,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint
    pub fn validate(&self) -> Result<()> {
        if self.robot_name.trim().is_empty() {
            return Err(Error::Config("robot name must not be empty".to_string()));
        }
        self.audio.segmenter.validate()?;
        if self.audio.wake_timeout.is_zero() || self.audio.command_timeout.is_zero() {
            return Err(Error::Config("listen timeouts must be positive".to_string()));
        }
        self.wake.matcher()?;

        let settings = &self.world.settings;
        let limits = settings.workspace.limits;
        if !(limits.is_finite() && limits.x > 0.0 && limits.y > 0.0 && limits.z > 0.0) {
            return Err(Error::Config(format!(
                "workspace limits {limits} must be positive"
            )));
        }
        if !(settings.pick_epsilon.is_finite() && settings.pick_epsilon > 0.0) {
            return Err(Error::Config("pick_epsilon must be positive".to_string()));
        }
        if !settings.workspace.contains(&settings.home) {
            return Err(Error::Config(format!(
                "home pose {} is outside the workspace",
                settings.home
            )));
        }

        if !(0.25..=4.0).contains(&self.tts.speed) {
            return Err(Error::Config(format!(
                "tts speed {} must be within 0.25 to 4.0",
                self.tts.speed
            )));
        }
        if !(0.0..=2.0).contains(&self.planner.temperature) {
            return Err(Error::Config(format!(
                "planner temperature {} must be within 0 to 2",
                self.planner.temperature
            )));
        }
        Ok(())
    }
}

/// Seconds from the file as a `Duration`, rejecting negative or NaN values
fn secs(value: Option<f64>, field: &str) -> Result<Option<Duration>> {
    value
        .map(|s| {
            Duration::try_from_secs_f64(s)
                .map_err(|e| Error::Config(format!("{field} = {s} is not a duration: {e}")))
        })
        .transpose()
}
