//! What the planner hands back for one turn

use serde::{Deserialize, Serialize};

use crate::world::ActionDirective;
use crate::{Error, Result};

const FALLBACK_SPEECH: &str = "Sorry, I didn't understand that. Could you please repeat?";
const FALLBACK_QUESTION: &str = "What can I help you with?";

/// Speech plus an ordered plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotResponse {
    pub speech: String,

    #[serde(default)]
    pub commands: Vec<ActionDirective>,

    #[serde(default)]
    pub needs_clarification: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification_question: Option<String>,
}

impl RobotResponse {
    /// Safe stand-in used whenever planning fails
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            speech: FALLBACK_SPEECH.to_string(),
            commands: Vec::new(),
            needs_clarification: true,
            clarification_question: Some(FALLBACK_QUESTION.to_string()),
        }
    }

    /// Plain spoken reply with no actions
    #[must_use]
    pub fn say(speech: impl Into<String>) -> Self {
        Self {
            speech: speech.into(),
            commands: Vec::new(),
            needs_clarification: false,
            clarification_question: None,
        }
    }

    /// Parse the JSON object a planner produced
    ///
    /// # Errors
    ///
    /// Returns `Error::Planning` if the text is not a valid response object
    pub fn parse(text: &str) -> Result<Self> {
        let response: Self = serde_json::from_str(text.trim())
            .map_err(|e| Error::Planning(format!("malformed planner response: {e}")))?;
        if response.speech.trim().is_empty() && response.commands.is_empty() {
            return Err(Error::Planning("planner response is empty".to_string()));
        }
        Ok(response)
    }

    /// Whether dispatching this response would move the arm
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        !self.needs_clarification && !self.commands.is_empty()
    }
}
