//! Action directives: the planner's wire format and its validated form
//!
//! The planner emits loosely typed JSON objects. Each one is turned into a
//! [`Directive`] before it touches the world; anything that does not fit the
//! closed set of actions becomes a [`DirectiveError`].

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Vec3;
use crate::error::DirectiveError;

/// Default `wait` length in seconds
const DEFAULT_WAIT_SECS: f64 = 1.0;

/// Longest accepted `wait`
const MAX_WAIT_SECS: f64 = 60.0;

/// Height used when a placement omits z
const PLACE_DEFAULT_Z: f64 = 0.05;

/// One step of a plan, as produced by the planner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDirective {
    pub action_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_object: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,

    #[serde(default)]
    pub reasoning: String,
}

impl ActionDirective {
    /// Directive with only an action tag set
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            target_object: None,
            location: None,
            parameters: None,
            reasoning: String::new(),
        }
    }

    #[must_use]
    pub fn target(mut self, object: impl Into<String>) -> Self {
        self.target_object = Some(object.into());
        self
    }

    #[must_use]
    pub fn at(mut self, x: f64, y: f64, z: f64) -> Self {
        self.location = Some(Location {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        });
        self
    }

    #[must_use]
    pub fn param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters
            .get_or_insert_with(Map::new)
            .insert(key.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn reason(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    fn number_param(&self, key: &'static str) -> Result<Option<f64>, DirectiveError> {
        let Some(value) = self.parameters.as_ref().and_then(|p| p.get(key)) else {
            return Ok(None);
        };
        match value.as_f64() {
            Some(n) if n.is_finite() => Ok(Some(n)),
            _ => Err(DirectiveError::InvalidParameter {
                name: key,
                reason: format!("expected a number, got {value}"),
            }),
        }
    }
}

/// Coordinates as sent by the planner; any axis may be missing
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

impl Location {
    /// Fill missing axes: x and y with 0, z with `default_z`
    #[must_use]
    pub fn resolve(&self, default_z: f64) -> Vec3 {
        Vec3::new(
            self.x.unwrap_or(0.0),
            self.y.unwrap_or(0.0),
            self.z.unwrap_or(default_z),
        )
    }
}

/// The closed set of actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Move,
    Pick,
    Place,
    Rotate,
    OpenGripper,
    CloseGripper,
    Home,
    Wait,
}

impl ActionKind {
    pub const ALL: [Self; 8] = [
        Self::Move,
        Self::Pick,
        Self::Place,
        Self::Rotate,
        Self::OpenGripper,
        Self::CloseGripper,
        Self::Home,
        Self::Wait,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Pick => "pick",
            Self::Place => "place",
            Self::Rotate => "rotate",
            Self::OpenGripper => "open_gripper",
            Self::CloseGripper => "close_gripper",
            Self::Home => "home",
            Self::Wait => "wait",
        }
    }
}

impl FromStr for ActionKind {
    type Err = DirectiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == tag)
            .ok_or_else(|| DirectiveError::UnknownAction(s.to_string()))
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a move or place should go
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Location(Vec3),
    Object(String),
}

/// A validated directive
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Move(Target),
    Pick(String),
    /// `None` places at the default spot
    Place(Option<Target>),
    Rotate { degrees: f64 },
    OpenGripper,
    CloseGripper,
    Home,
    Wait(Duration),
}

impl Directive {
    #[must_use]
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::Move(_) => ActionKind::Move,
            Self::Pick(_) => ActionKind::Pick,
            Self::Place(_) => ActionKind::Place,
            Self::Rotate { .. } => ActionKind::Rotate,
            Self::OpenGripper => ActionKind::OpenGripper,
            Self::CloseGripper => ActionKind::CloseGripper,
            Self::Home => ActionKind::Home,
            Self::Wait(_) => ActionKind::Wait,
        }
    }

    /// Where an unspecified placement lands
    #[must_use]
    pub const fn default_place() -> Vec3 {
        Vec3::new(0.0, 0.0, PLACE_DEFAULT_Z)
    }
}

impl TryFrom<&ActionDirective> for Directive {
    type Error = DirectiveError;

    fn try_from(raw: &ActionDirective) -> Result<Self, Self::Error> {
        let kind: ActionKind = raw.action_type.parse()?;
        let object = raw
            .target_object
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);

        let directive = match kind {
            ActionKind::Move => match (raw.location, object) {
                (Some(location), _) => Self::Move(Target::Location(location.resolve(0.0))),
                (None, Some(name)) => Self::Move(Target::Object(name)),
                (None, None) => {
                    return Err(DirectiveError::MissingTarget {
                        action: "move",
                        needs: "a location or target object",
                    });
                }
            },
            ActionKind::Pick => Self::Pick(object.ok_or(DirectiveError::MissingTarget {
                action: "pick",
                needs: "a target object",
            })?),
            ActionKind::Place => Self::Place(match (raw.location, object) {
                (Some(location), _) => Some(Target::Location(location.resolve(PLACE_DEFAULT_Z))),
                (None, Some(name)) => Some(Target::Object(name)),
                (None, None) => None,
            }),
            ActionKind::Rotate => Self::Rotate {
                degrees: raw.number_param("angle")?.unwrap_or(0.0),
            },
            ActionKind::OpenGripper => Self::OpenGripper,
            ActionKind::CloseGripper => Self::CloseGripper,
            ActionKind::Home => Self::Home,
            ActionKind::Wait => {
                let secs = raw.number_param("duration")?.unwrap_or(DEFAULT_WAIT_SECS);
                if !(0.0..=MAX_WAIT_SECS).contains(&secs) {
                    return Err(DirectiveError::InvalidParameter {
                        name: "duration",
                        reason: format!("{secs} s is outside 0..={MAX_WAIT_SECS} s"),
                    });
                }
                Self::Wait(Duration::from_secs_f64(secs))
            }
        };

        Ok(directive)
    }
}
