//! Role-tagged dialogue history

use serde::{Deserialize, Serialize};

/// Messages handed to the planner on each turn
pub const CONTEXT_MESSAGES: usize = 20;

/// Characters kept per line in [`Conversation::summary`]
const SUMMARY_CHARS: usize = 100;

/// Who said a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message in a chat exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Ordered history of one session, oldest first
///
/// The full history is kept; only the most recent [`CONTEXT_MESSAGES`]
/// reach the planner.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Conversation {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Forget everything said so far
    pub fn reset(&mut self) {
        tracing::debug!(dropped = self.messages.len(), "conversation reset");
        self.messages.clear();
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The window sent to the planner
    #[must_use]
    pub fn recent(&self) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(CONTEXT_MESSAGES);
        &self.messages[start..]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Last `limit` messages, one per line, each cut to 100 characters
    #[must_use]
    pub fn summary(&self, limit: usize) -> String {
        if self.messages.is_empty() {
            return "no conversation yet".to_string();
        }
        let start = self.messages.len().saturating_sub(limit);
        self.messages[start..]
            .iter()
            .map(|m| {
                let speaker = match m.role {
                    Role::System => "System",
                    Role::User => "User",
                    Role::Assistant => "Robot",
                };
                let content: String = m.content.chars().take(SUMMARY_CHARS).collect();
                format!("{speaker}: {content}")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
