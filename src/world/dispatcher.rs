//! Sequential execution of planned directives against the world model
//!
//! Directives run one at a time, in order. A failing directive is recorded
//! and the batch carries on with the next one.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use super::directive::{ActionDirective, Directive, Target};
use super::{Vec3, WorldModel};
use crate::clock::Clock;
use crate::error::DirectiveError;

/// Height above an object the gripper hovers at before descending
const APPROACH_CLEARANCE: f64 = 0.1;

/// What happened to one directive
#[derive(Debug, Clone, PartialEq)]
pub struct DirectiveOutcome {
    /// Position in the batch, starting at 1
    pub index: usize,
    /// Action tag as received
    pub action: String,
    pub success: bool,
    pub message: String,
}

/// Aggregate result of a batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
    pub succeeded: usize,
    pub total: usize,
    pub outcomes: Vec<DirectiveOutcome>,
}

impl ExecutionReport {
    #[must_use]
    pub const fn all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }

    /// Outcomes that failed
    pub fn failures(&self) -> impl Iterator<Item = &DirectiveOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    fn push(&mut self, action: &str, result: Result<String, DirectiveError>) {
        self.total += 1;
        let (success, message) = match result {
            Ok(message) => {
                self.succeeded += 1;
                (true, message)
            }
            Err(err) => (false, err.to_string()),
        };
        self.outcomes.push(DirectiveOutcome {
            index: self.total,
            action: action.to_string(),
            success,
            message,
        });
    }
}

impl fmt::Display for ExecutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} directives succeeded", self.succeeded, self.total)
    }
}

/// Applies directives to a [`WorldModel`]
#[derive(Clone)]
pub struct CommandDispatcher {
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CommandDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDispatcher").finish_non_exhaustive()
    }
}

impl CommandDispatcher {
    /// Dispatcher that waits out simulated actuation on `clock`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Run every directive in order and report per-directive outcomes
    ///
    /// Never fails as a whole; an empty batch yields `0/0` and leaves the
    /// world untouched.
    pub async fn execute(
        &self,
        world: &mut WorldModel,
        directives: &[ActionDirective],
    ) -> ExecutionReport {
        let mut report = ExecutionReport::default();
        if directives.is_empty() {
            tracing::debug!("no directives to execute");
            return report;
        }

        tracing::info!(count = directives.len(), "executing directives");

        for raw in directives {
            tracing::info!(
                index = report.total + 1,
                action = %raw.action_type,
                target = raw.target_object.as_deref().unwrap_or("-"),
                reasoning = %raw.reasoning,
                "executing directive"
            );

            let result = match Directive::try_from(raw) {
                Ok(directive) => self.apply(world, &directive).await,
                Err(err) => Err(err),
            };

            if let Err(err) = &result {
                tracing::warn!(action = %raw.action_type, error = %err, "directive failed");
                world.note(format!("{} failed: {err}", raw.action_type));
            }
            report.push(&raw.action_type, result);
            debug_assert!(world.invariants_hold());
        }

        tracing::info!(
            succeeded = report.succeeded,
            total = report.total,
            "execution complete"
        );
        report
    }

    /// Apply one validated directive, returning a short description
    ///
    /// # Errors
    ///
    /// Returns the precondition that blocked the directive
    pub async fn apply(
        &self,
        world: &mut WorldModel,
        directive: &Directive,
    ) -> Result<String, DirectiveError> {
        match directive {
            Directive::Move(Target::Location(pos)) => {
                let took = world.move_to(*pos, None)?;
                self.settle(took).await;
                Ok(format!("moved to {pos}"))
            }
            Directive::Move(Target::Object(name)) => {
                let took = world.move_to(Vec3::default(), Some(name))?;
                self.settle(took).await;
                Ok(format!("moved to {name}"))
            }
            Directive::Pick(name) => self.pick(world, name).await,
            Directive::Place(target) => {
                let pos = place_position(world, target.as_ref())?;
                let took = world.place(pos)?;
                self.settle(took).await;
                Ok(format!("placed at {pos}"))
            }
            Directive::Rotate { degrees } => {
                world.note(format!("rotated {degrees} degrees"));
                Ok(format!("rotated {degrees} degrees"))
            }
            Directive::OpenGripper => {
                let took = world.open_gripper()?;
                self.settle(took).await;
                Ok("gripper open".to_string())
            }
            Directive::CloseGripper => {
                let took = world.close_gripper()?;
                self.settle(took).await;
                Ok("gripper closed".to_string())
            }
            Directive::Home => {
                let took = world.home()?;
                self.settle(took).await;
                Ok("returned home".to_string())
            }
            Directive::Wait(duration) => {
                world.note(format!("waiting {:.1} s", duration.as_secs_f64()));
                self.clock.sleep(*duration).await;
                Ok(format!("waited {:.1} s", duration.as_secs_f64()))
            }
        }
    }

    /// Hover above the object, descend onto it, then close the gripper
    async fn pick(&self, world: &mut WorldModel, name: &str) -> Result<String, DirectiveError> {
        let object_pos = world
            .get_position(name)
            .ok_or_else(|| DirectiveError::UnknownObject(name.to_string()))?;
        if !world.robot().gripper_open {
            return Err(DirectiveError::GripperClosed);
        }

        if world.robot().end_effector_pos.distance(&object_pos) > world.settings().pick_epsilon {
            let ceiling = world.settings().workspace.limits.z;
            let hover = Vec3 {
                z: (object_pos.z + APPROACH_CLEARANCE).min(ceiling),
                ..object_pos
            };
            let took = world.move_to(hover, None)?;
            self.settle(took).await;
            let took = world.move_to(object_pos, None)?;
            self.settle(took).await;
        }

        let took = world.pick(name)?;
        self.settle(took).await;
        Ok(format!("picked {name}"))
    }

    async fn settle(&self, took: Duration) {
        self.clock.sleep(took).await;
    }
}

/// Resolve where a placement lands
///
/// An explicit location wins. Another object means "on top of it"; naming
/// the held object itself, or nothing at all, means the default spot.
fn place_position(world: &WorldModel, target: Option<&Target>) -> Result<Vec3, DirectiveError> {
    match target {
        Some(Target::Location(pos)) => Ok(*pos),
        Some(Target::Object(name))
            if world.robot().holding_object.as_deref() != Some(name.as_str()) =>
        {
            let object = world
                .object(name)
                .ok_or_else(|| DirectiveError::UnknownObject(name.clone()))?;
            Ok(object.position.above(object.size.z))
        }
        _ => Ok(Directive::default_place()),
    }
}
