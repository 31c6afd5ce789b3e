//! System prompt for the planner

use crate::world::ActionKind;

/// Short description of each action for the prompt
const fn describe(kind: ActionKind) -> &'static str {
    match kind {
        ActionKind::Pick => "grasp an object (target_object required)",
        ActionKind::Place => {
            "put the held object down at a location, or on top of another object"
        }
        ActionKind::Move => "move the gripper to a location or above an object",
        ActionKind::Rotate => "rotate the wrist (parameters.angle in degrees)",
        ActionKind::OpenGripper => "open the gripper, releasing anything held",
        ActionKind::CloseGripper => "close the gripper",
        ActionKind::Home => "return to the home position",
        ActionKind::Wait => "pause (parameters.duration in seconds, at most 60)",
    }
}

const RULES: &str = "\
# Behavior
1. Safety first: refuse dangerous or impossible actions and say why
2. Ask a question when a command is ambiguous instead of guessing
3. Say briefly what you are about to do
4. Only use objects listed in the world state, by their exact names
5. Coordinates are metres; the workspace is |x| <= 0.5, |y| <= 0.5, 0 <= z <= 0.5
6. Use earlier turns to resolve words like \"it\" or \"there\"";

const RESPONSES: &str = "\
# Responses
- When you finish a task say \"Done\" or similar
- When you don't understand, ask the user to repeat
- Reply with one JSON object with the fields speech, commands, needs_clarification \
and clarification_question. Each command has action_type, and optionally \
target_object, location {x, y, z}, parameters and reasoning.";

const EXAMPLE: &str = r#"# Example
User: "Put the red block on the blue cup"
{
  "speech": "Okay, stacking the red block on the blue cup.",
  "commands": [
    {"action_type": "pick", "target_object": "red_block", "reasoning": "grasp the block"},
    {"action_type": "place", "target_object": "blue_cup", "reasoning": "set it on the cup"}
  ],
  "needs_clarification": false
}

User: "Put it down"  (nothing is held)
{
  "speech": "I'm not holding anything. What should I pick up?",
  "commands": [],
  "needs_clarification": true,
  "clarification_question": "What should I pick up?"
}"#;

/// Build the planner's system prompt
///
/// The world summary is embedded verbatim so every turn plans against the
/// current state.
#[must_use]
pub fn build_system_prompt(robot_name: &str, world_summary: &str) -> String {
    let mut sections = Vec::with_capacity(6);

    sections.push(format!(
        "You are {robot_name}, an AI assistant controlling a simulated robotic arm.\n\
         You are friendly, careful and concise. Speak natural English in one or two sentences."
    ));

    let actions = ActionKind::ALL
        .iter()
        .map(|kind| format!("- {}: {}", kind.as_str(), describe(*kind)))
        .collect::<Vec<_>>()
        .join("\n");
    sections.push(format!("# Available actions\n{actions}"));

    sections.push(RULES.to_string());

    sections.push(RESPONSES.to_string());
    sections.push(EXAMPLE.to_string());

    sections.push(format!("# Current world state\n{world_summary}"));

    sections.join("\n\n")
}
