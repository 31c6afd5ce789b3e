//! TOML configuration file loading
//!
//! Supports `~/.config/voxarm/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{Error, Result};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub audio: AudioFileConfig,

    #[serde(default)]
    pub wake: WakeFileConfig,

    #[serde(default)]
    pub stt: SttFileConfig,

    #[serde(default)]
    pub planner: PlannerFileConfig,

    #[serde(default)]
    pub tts: TtsFileConfig,

    #[serde(default)]
    pub world: WorldFileConfig,

    /// API keys for external services (environment wins)
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Microphone and segmentation settings
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioFileConfig {
    pub sample_rate: Option<u32>,
    pub frame_ms: Option<u64>,
    /// Mean absolute amplitude in `[0, 1)` that counts as speech
    pub min_volume: Option<f32>,
    pub max_silence_secs: Option<f64>,
    pub max_duration_secs: Option<f64>,
    /// How long one wake listen waits before starting over
    pub wake_timeout_secs: Option<f64>,
    /// How long to wait for a command after the wake phrase
    pub command_timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WakeFileConfig {
    pub phrases: Option<Vec<String>>,
    pub fragments: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SttFileConfig {
    /// "whisper" or "deepgram"
    pub provider: Option<String>,
    pub model: Option<String>,
    /// ISO 639-1 hint (e.g. "en", "ko")
    pub language: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlannerFileConfig {
    pub model: Option<String>,
    pub robot_name: Option<String>,
    pub temperature: Option<f32>,
    /// OpenAI-compatible chat completions URL
    pub endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TtsFileConfig {
    pub enabled: Option<bool>,
    /// "openai" or "elevenlabs"
    pub provider: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub speed: Option<f32>,
    /// Voice passed to the local speech command
    pub local_voice: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorldFileConfig {
    pub pick_epsilon: Option<f64>,
    /// `[x, y, z]` half-extents (z is the height ceiling)
    pub workspace: Option<[f64; 3]>,
    /// Wait out simulated actuation times
    pub realtime: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the text is not a valid config file
pub fn parse_config_file(content: &str) -> Result<ConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file
///
/// An explicit path must exist and parse. The default path is optional:
/// when missing or broken, defaults are used and a warning is logged.
///
/// # Errors
///
/// Returns error only for an unreadable or invalid explicit path
pub fn load_config_file(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = parse_config_file(&content).map_err(|e| {
            Error::Config(format!("invalid config file {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(ConfigFile::default());
    };

    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(ConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(ConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/voxarm/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voxarm").join("config.toml"))
}
