//! Dialogue side of the robot: history, planning and the turn loop

mod conversation;
mod planner;
mod prompt;
mod response;
mod session;

pub use conversation::{CONTEXT_MESSAGES, ChatMessage, Conversation, Role};
pub use planner::{ChatPlanner, Planner};
pub use prompt::build_system_prompt;
pub use response::RobotResponse;
pub use session::{
    ACK_LINE, DONE_LINE, GOODBYE_LINE, PARTIAL_LINE, REPEAT_LINE, Session, Turn,
};
