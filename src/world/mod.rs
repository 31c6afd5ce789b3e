//! Simulated arm: world state, directives and their execution
//!
//! No physics and no perception. Objects sit where they were last put and
//! the arm reaches any point inside the workspace.

mod directive;
mod dispatcher;
mod geometry;
mod model;

pub use directive::{ActionDirective, ActionKind, Directive, Location, Target};
pub use dispatcher::{CommandDispatcher, DirectiveOutcome, ExecutionReport};
pub use geometry::{Vec3, Workspace};
pub use model::{RobotState, WorldModel, WorldObject, WorldSettings, seed_objects};
