//! Planning collaborator: conversation in, response out

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::conversation::{ChatMessage, Conversation};
use super::prompt::build_system_prompt;
use super::response::RobotResponse;
use crate::{Error, Result};

const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Decides what to say and do for the latest user turn
#[async_trait]
pub trait Planner: Send + Sync {
    /// Plan a response to the last message of `conversation`
    ///
    /// # Errors
    ///
    /// Returns `Error::Planning` when no usable response is produced; the
    /// session substitutes [`RobotResponse::fallback`]
    async fn plan(&self, conversation: &Conversation, world_summary: &str)
    -> Result<RobotResponse>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Planner backed by an OpenAI-compatible chat completions endpoint
pub struct ChatPlanner {
    client: reqwest::Client,
    api_key: SecretString,
    endpoint: String,
    model: String,
    temperature: f32,
    robot_name: String,
}

impl std::fmt::Debug for ChatPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPlanner")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("robot_name", &self.robot_name)
            .finish_non_exhaustive()
    }
}

impl ChatPlanner {
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(api_key: SecretString, model: String, robot_name: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for planning".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            endpoint: OPENAI_CHAT_URL.to_string(),
            model,
            temperature: 0.7,
            robot_name,
        })
    }

    /// Point at another OpenAI-compatible server
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    #[must_use]
    pub fn robot_name(&self) -> &str {
        &self.robot_name
    }

    fn messages(&self, conversation: &Conversation, world_summary: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(conversation.recent().len() + 1);
        messages.push(ChatMessage::system(build_system_prompt(
            &self.robot_name,
            world_summary,
        )));
        messages.extend(conversation.recent().iter().cloned());
        messages
    }
}

#[async_trait]
impl Planner for ChatPlanner {
    async fn plan(
        &self,
        conversation: &Conversation,
        world_summary: &str,
    ) -> Result<RobotResponse> {
        let request = ChatRequest {
            model: &self.model,
            messages: self.messages(conversation, world_summary),
            temperature: self.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        tracing::debug!(
            model = %self.model,
            messages = request.messages.len(),
            "requesting plan"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Planning(format!("planner request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Planning(format!("planner API error {status}: {body}")));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Planning(format!("failed to parse planner reply: {e}")))?;

        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::Planning("planner returned no content".to_string()))?;

        let plan = RobotResponse::parse(&content)?;
        tracing::info!(
            commands = plan.commands.len(),
            clarify = plan.needs_clarification,
            "plan received"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::Role;

    fn planner() -> ChatPlanner {
        ChatPlanner::new(SecretString::from("sk-test"), "gpt-4o-mini".into(), "Jarvis".into())
            .unwrap()
    }

    #[test]
    fn test_missing_key_rejected() {
        let result = ChatPlanner::new(SecretString::from(""), "m".into(), "Jarvis".into());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_messages_start_with_system_prompt() {
        let mut conversation = Conversation::new();
        conversation.push_user("pick up the red block");
        let messages = planner().messages(&conversation, "Robot state");
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("You are Jarvis"));
        assert_eq!(messages[1].content, "pick up the red block");
    }

    #[test]
    fn test_request_shape() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.5,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_debug_hides_key() {
        assert!(!format!("{:?}", planner()).contains("sk-test"));
    }
}
