//! One conversation with the arm: plan, speak, act

use super::conversation::Conversation;
use super::planner::Planner;
use super::response::RobotResponse;
use crate::voice::Speaker;
use crate::world::{CommandDispatcher, ExecutionReport, WorldModel};

/// Spoken after every directive in a batch succeeded
pub const DONE_LINE: &str = "Done.";

/// Spoken after a batch with at least one failed directive
pub const PARTIAL_LINE: &str = "I couldn't finish everything.";

/// Spoken when a wake was heard but no command followed
pub const REPEAT_LINE: &str = "Sorry, could you repeat that?";

/// Spoken right after a wake phrase
pub const ACK_LINE: &str = "Yes, I'm listening.";

/// Spoken on shutdown
pub const GOODBYE_LINE: &str = "Goodbye.";

/// Result of handling one user utterance
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub response: RobotResponse,
    /// Present when directives were dispatched
    pub report: Option<ExecutionReport>,
    /// Planning failed and the fallback response was used
    pub fell_back: bool,
}

impl Turn {
    /// Whether the robot is waiting on an answer from the user
    #[must_use]
    pub const fn awaiting_clarification(&self) -> bool {
        self.response.needs_clarification
    }
}

/// Owns the world and history for one running robot
pub struct Session<P, S> {
    name: String,
    planner: P,
    speaker: S,
    dispatcher: CommandDispatcher,
    world: WorldModel,
    conversation: Conversation,
}

impl<P: Planner, S: Speaker> Session<P, S> {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        planner: P,
        speaker: S,
        dispatcher: CommandDispatcher,
        world: WorldModel,
    ) -> Self {
        Self {
            name: name.into(),
            planner,
            speaker,
            dispatcher,
            world,
            conversation: Conversation::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn world(&self) -> &WorldModel {
        &self.world
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub const fn planner(&self) -> &P {
        &self.planner
    }

    #[must_use]
    pub const fn speaker(&self) -> &S {
        &self.speaker
    }

    /// Start over with an empty history; the world is left as it is
    pub fn reset_conversation(&mut self) {
        self.conversation.reset();
    }

    pub async fn greet(&self) {
        self.say(&format!(
            "Hello. I'm {}. Feel free to call me anytime.",
            self.name
        ))
        .await;
    }

    pub async fn acknowledge(&self) {
        self.say(ACK_LINE).await;
    }

    pub async fn ask_to_repeat(&self) {
        self.say(REPEAT_LINE).await;
    }

    pub async fn farewell(&self) {
        self.say(GOODBYE_LINE).await;
    }

    async fn say(&self, text: &str) {
        self.speaker.speak(text).await;
    }

    /// Handle one user utterance end to end
    ///
    /// Planning failures never escape: the fallback response is spoken
    /// instead. A response asking for clarification is spoken but nothing
    /// is dispatched.
    pub async fn respond(&mut self, text: &str) -> Turn {
        let text = text.trim();
        tracing::info!(user = %text, "user turn");
        self.conversation.push_user(text);

        let summary = self.world.to_string();
        let (response, fell_back) = match self.planner.plan(&self.conversation, &summary).await {
            Ok(response) => (response, false),
            Err(e) => {
                tracing::warn!(error = %e, "planning failed, using fallback");
                (RobotResponse::fallback(), true)
            }
        };

        self.conversation.push_assistant(response.speech.as_str());
        self.say(&response.speech).await;

        if response.needs_clarification {
            if let Some(question) = &response.clarification_question {
                tracing::info!(question = %question, "awaiting clarification");
            }
            return Turn {
                response,
                report: None,
                fell_back,
            };
        }

        if response.commands.is_empty() {
            return Turn {
                response,
                report: None,
                fell_back,
            };
        }

        let report = self
            .dispatcher
            .execute(&mut self.world, &response.commands)
            .await;
        for failure in report.failures() {
            tracing::warn!(
                index = failure.index,
                action = %failure.action,
                reason = %failure.message,
                "step failed"
            );
        }
        self.say(if report.all_succeeded() {
            DONE_LINE
        } else {
            PARTIAL_LINE
        })
        .await;

        Turn {
            response,
            report: Some(report),
            fell_back,
        }
    }
}
