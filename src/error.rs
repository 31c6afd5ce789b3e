//! Error types for voxarm

use thiserror::Error;

use crate::world::Vec3;

/// Result type alias for voxarm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur across the voice pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio input device unavailable or failed (fatal for the session)
    #[error("audio resource error: {0}")]
    Resource(String),

    /// Speech-to-text failure or timeout
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Planner response malformed or unavailable
    #[error("planning error: {0}")]
    Planning(String),

    /// Directive rejected by validation or the world model
    #[error("directive error: {0}")]
    Directive(#[from] DirectiveError),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether the session can carry on after this error
    ///
    /// Only a lost audio device or unusable configuration ends a session.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Resource(_) | Self::Config(_))
    }
}

/// Reasons a single directive fails
///
/// These never abort a batch; the dispatcher records them and moves on.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DirectiveError {
    /// Action tag outside the closed set
    #[error("unknown action type: {0}")]
    UnknownAction(String),

    /// Directive lacks the target it needs
    #[error("{action} requires {needs}")]
    MissingTarget {
        action: &'static str,
        needs: &'static str,
    },

    /// Named object is not in the registry
    #[error("object not found: {0}")]
    UnknownObject(String),

    /// Gripper must be open before picking
    #[error("gripper is already closed")]
    GripperClosed,

    /// End effector has not approached the object
    #[error("{object} is too far away ({distance:.2} m), move closer first")]
    OutOfReach { object: String, distance: f64 },

    /// Place requested with nothing in the gripper
    #[error("not holding any object")]
    NotHolding,

    /// Target lies outside the workspace or is not finite
    #[error("position {0} is outside the workspace")]
    OutOfWorkspace(Vec3),

    /// Parameter present but unusable
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}
