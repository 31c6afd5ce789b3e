//! In-memory robot and world state
//!
//! Every mutating operation checks its preconditions first and either
//! applies the whole change or leaves the state untouched. On success it
//! returns the simulated actuation time; the caller decides whether to wait
//! it out.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Vec3, Workspace};
use crate::error::DirectiveError;
use crate::{Error, Result};

/// Entries kept in the action log
const ACTION_LOG_CAPACITY: usize = 50;

/// Upper bound on a single simulated move
const MAX_MOVE_TIME: Duration = Duration::from_secs(2);

/// Seconds of simulated travel per metre
const MOVE_SECS_PER_METRE: f64 = 2.0;

const GRASP_TIME: Duration = Duration::from_millis(500);
const GRIPPER_TIME: Duration = Duration::from_millis(300);
const HOME_TIME: Duration = Duration::from_secs(1);

/// Tunables for the simulated arm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    /// Max end-effector distance from an object for a pick to succeed
    pub pick_epsilon: f64,

    /// Reachable region
    pub workspace: Workspace,

    /// Canonical origin pose restored by `home`
    pub home: Vec3,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            pick_epsilon: 0.1,
            workspace: Workspace::default(),
            home: Vec3::new(0.0, 0.0, 0.3),
        }
    }
}

/// End-effector and gripper state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RobotState {
    pub end_effector_pos: Vec3,
    pub gripper_open: bool,
    pub holding_object: Option<String>,
}

/// A named thing on the table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldObject {
    pub name: String,
    pub position: Vec3,
    pub color: String,
    pub size: Vec3,
}

impl WorldObject {
    /// Object with the default 5 cm cube extent
    pub fn new(name: impl Into<String>, position: Vec3, color: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            position,
            color: color.into(),
            size: Vec3::new(0.05, 0.05, 0.05),
        }
    }

    #[must_use]
    pub fn with_size(mut self, size: Vec3) -> Self {
        self.size = size;
        self
    }
}

/// The default table: a red block, a blue cup and a green block
#[must_use]
pub fn seed_objects() -> Vec<WorldObject> {
    vec![
        WorldObject::new("red_block", Vec3::new(0.3, 0.2, 0.05), "red"),
        WorldObject::new("blue_cup", Vec3::new(0.2, -0.2, 0.05), "blue")
            .with_size(Vec3::new(0.06, 0.06, 0.1)),
        WorldObject::new("green_block", Vec3::new(-0.2, 0.1, 0.05), "green"),
    ]
}

/// Robot state plus the object registry
#[derive(Debug, Clone)]
pub struct WorldModel {
    settings: WorldSettings,
    robot: RobotState,
    objects: BTreeMap<String, WorldObject>,
    log: VecDeque<String>,
    log_seq: u64,
}

impl WorldModel {
    /// World populated with [`seed_objects`]
    #[must_use]
    pub fn seeded(settings: WorldSettings) -> Self {
        let objects = seed_objects()
            .into_iter()
            .map(|o| (o.name.clone(), o))
            .collect();
        Self::from_parts(settings, objects)
    }

    /// World with a caller-provided object set
    ///
    /// # Errors
    ///
    /// Returns error if two objects share a name or an object lies outside
    /// the workspace
    pub fn with_objects(settings: WorldSettings, objects: Vec<WorldObject>) -> Result<Self> {
        let mut registry = BTreeMap::new();
        for object in objects {
            if !settings.workspace.contains(&object.position) {
                return Err(Error::Config(format!(
                    "object {} at {} is outside the workspace",
                    object.name, object.position
                )));
            }
            if registry.contains_key(&object.name) {
                return Err(Error::Config(format!(
                    "duplicate object name: {}",
                    object.name
                )));
            }
            registry.insert(object.name.clone(), object);
        }
        Ok(Self::from_parts(settings, registry))
    }

    fn from_parts(settings: WorldSettings, objects: BTreeMap<String, WorldObject>) -> Self {
        let mut world = Self {
            robot: RobotState {
                end_effector_pos: settings.home,
                gripper_open: true,
                holding_object: None,
            },
            settings,
            objects,
            log: VecDeque::with_capacity(ACTION_LOG_CAPACITY),
            log_seq: 0,
        };
        world.record(format!("world initialized with {} objects", world.objects.len()));
        world
    }

    #[must_use]
    pub const fn robot(&self) -> &RobotState {
        &self.robot
    }

    #[must_use]
    pub const fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// Objects in name order
    pub fn objects(&self) -> impl Iterator<Item = &WorldObject> {
        self.objects.values()
    }

    #[must_use]
    pub fn object(&self, name: &str) -> Option<&WorldObject> {
        self.objects.get(name)
    }

    /// Current position of a named object
    #[must_use]
    pub fn get_position(&self, name: &str) -> Option<Vec3> {
        self.objects.get(name).map(|o| o.position)
    }

    /// Move the end effector to `pos`, or onto `target` when given
    ///
    /// # Errors
    ///
    /// Fails without moving if `target` is unknown or the resolved position
    /// is outside the workspace
    pub fn move_to(
        &mut self,
        pos: Vec3,
        target: Option<&str>,
    ) -> std::result::Result<Duration, DirectiveError> {
        let destination = match target {
            Some(name) => self.get_position(name).ok_or_else(|| {
                tracing::warn!(object = name, "move target not found");
                DirectiveError::UnknownObject(name.to_string())
            })?,
            None => pos,
        };
        self.ensure_reachable(destination)?;

        let distance = self.robot.end_effector_pos.distance(&destination);
        let travel = Duration::from_secs_f64(distance * MOVE_SECS_PER_METRE).min(MAX_MOVE_TIME);

        self.robot.end_effector_pos = destination;
        match target {
            Some(name) => self.record(format!("moved to {name} at {destination}")),
            None => self.record(format!("moved to {destination}")),
        }
        tracing::debug!(%destination, distance, "end effector moved");
        Ok(travel)
    }

    /// Close the gripper on a named object
    ///
    /// # Errors
    ///
    /// Fails without any change if the object is unknown, the gripper is
    /// already closed, or the end effector is farther than `pick_epsilon`
    pub fn pick(&mut self, name: &str) -> std::result::Result<Duration, DirectiveError> {
        let object_pos = self
            .get_position(name)
            .ok_or_else(|| DirectiveError::UnknownObject(name.to_string()))?;

        if !self.robot.gripper_open {
            return Err(DirectiveError::GripperClosed);
        }

        let distance = self.robot.end_effector_pos.distance(&object_pos);
        if distance > self.settings.pick_epsilon {
            return Err(DirectiveError::OutOfReach {
                object: name.to_string(),
                distance,
            });
        }

        self.robot.gripper_open = false;
        self.robot.holding_object = Some(name.to_string());
        self.record(format!("picked {name}"));
        tracing::debug!(object = name, "object picked");
        Ok(GRASP_TIME)
    }

    /// Put the held object down at `pos` and open the gripper
    ///
    /// # Errors
    ///
    /// Fails if nothing is held or `pos` is outside the workspace
    pub fn place(&mut self, pos: Vec3) -> std::result::Result<Duration, DirectiveError> {
        let Some(name) = self.robot.holding_object.clone() else {
            return Err(DirectiveError::NotHolding);
        };
        self.ensure_reachable(pos)?;

        if let Some(object) = self.objects.get_mut(&name) {
            object.position = pos;
        }
        self.robot.gripper_open = true;
        self.robot.holding_object = None;
        self.record(format!("placed {name} at {pos}"));
        tracing::debug!(object = %name, position = %pos, "object placed");
        Ok(GRASP_TIME)
    }

    /// Open the gripper; a held object is dropped where the end effector is
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other operations
    pub fn open_gripper(&mut self) -> std::result::Result<Duration, DirectiveError> {
        if self.robot.gripper_open {
            self.record("gripper already open".to_string());
            return Ok(Duration::ZERO);
        }
        if let Some(name) = self.robot.holding_object.take() {
            let drop_at = self.robot.end_effector_pos;
            if let Some(object) = self.objects.get_mut(&name) {
                object.position = drop_at;
            }
            self.record(format!("released {name} at {drop_at}"));
        }
        self.robot.gripper_open = true;
        self.record("gripper opened".to_string());
        Ok(GRIPPER_TIME)
    }

    /// Close the gripper
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other operations
    pub fn close_gripper(&mut self) -> std::result::Result<Duration, DirectiveError> {
        if !self.robot.gripper_open {
            self.record("gripper already closed".to_string());
            return Ok(Duration::ZERO);
        }
        self.robot.gripper_open = false;
        self.record("gripper closed".to_string());
        Ok(GRIPPER_TIME)
    }

    /// Return to the home pose, letting go of anything held
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other operations
    pub fn home(&mut self) -> std::result::Result<Duration, DirectiveError> {
        if let Some(name) = self.robot.holding_object.take() {
            // Dropped where it was carried, before the arm leaves
            let drop_at = self.robot.end_effector_pos;
            if let Some(object) = self.objects.get_mut(&name) {
                object.position = drop_at;
            }
            self.robot.gripper_open = true;
            self.record(format!("released {name} at {drop_at}"));
        }
        self.robot.end_effector_pos = self.settings.home;
        self.record("returned home".to_string());
        Ok(HOME_TIME)
    }

    /// Append a free-form entry to the action log
    pub fn note(&mut self, message: impl Into<String>) {
        self.record(message.into());
    }

    /// Up to `limit` most recent log entries, oldest first
    #[must_use]
    pub fn recent_log(&self, limit: usize) -> Vec<&str> {
        let skip = self.log.len().saturating_sub(limit);
        self.log.iter().skip(skip).map(String::as_str).collect()
    }

    /// Whether the gripper/held-object/pose invariants hold
    #[must_use]
    pub fn invariants_hold(&self) -> bool {
        let robot = &self.robot;
        let held_ok = robot
            .holding_object
            .as_ref()
            .is_none_or(|name| !robot.gripper_open && self.objects.contains_key(name));
        let open_ok = !robot.gripper_open || robot.holding_object.is_none();
        held_ok && open_ok && robot.end_effector_pos.is_finite()
    }

    fn ensure_reachable(&self, pos: Vec3) -> std::result::Result<(), DirectiveError> {
        if self.settings.workspace.contains(&pos) {
            Ok(())
        } else {
            Err(DirectiveError::OutOfWorkspace(pos))
        }
    }

    fn record(&mut self, message: String) {
        self.log_seq += 1;
        if self.log.len() == ACTION_LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(format!("[{:04}] {message}", self.log_seq));
    }
}

impl fmt::Display for WorldModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Robot state")?;
        writeln!(f, "  position: {}", self.robot.end_effector_pos)?;
        writeln!(
            f,
            "  gripper: {}",
            if self.robot.gripper_open { "open" } else { "closed" }
        )?;
        writeln!(
            f,
            "  holding: {}",
            self.robot.holding_object.as_deref().unwrap_or("nothing")
        )?;
        writeln!(f, "Objects")?;
        for object in self.objects.values() {
            writeln!(f, "  - {} ({}): {}", object.name, object.color, object.position)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn world() -> WorldModel {
        WorldModel::seeded(WorldSettings::default())
    }

    #[test]
    fn test_seeded_world() {
        let world = world();
        assert_eq!(world.objects().count(), 3);
        assert_eq!(world.get_position("red_block"), Some(Vec3::new(0.3, 0.2, 0.05)));
        assert_eq!(world.get_position("purple_thing"), None);
        assert_eq!(world.robot().end_effector_pos, Vec3::new(0.0, 0.0, 0.3));
        assert!(world.robot().gripper_open);
        assert!(world.invariants_hold());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let objects = vec![
            WorldObject::new("cube", Vec3::new(0.1, 0.1, 0.05), "red"),
            WorldObject::new("cube", Vec3::new(0.2, 0.1, 0.05), "blue"),
        ];
        assert!(WorldModel::with_objects(WorldSettings::default(), objects).is_err());
    }

    #[test]
    fn test_move_to_unknown_target_leaves_state() {
        let mut world = world();
        let before = world.robot().clone();
        let err = world
            .move_to(Vec3::default(), Some("ghost"))
            .unwrap_err();
        assert_eq!(err, DirectiveError::UnknownObject("ghost".into()));
        assert_eq!(world.robot(), &before);
    }

    #[test]
    fn test_move_time_is_capped() {
        let mut world = world();
        let short = world.move_to(Vec3::new(0.0, 0.0, 0.2), None).unwrap();
        assert!((short.as_secs_f64() - 0.2).abs() < 1e-6);

        let mut settings = WorldSettings::default();
        settings.workspace.limits = Vec3::new(5.0, 5.0, 5.0);
        let mut big = WorldModel::seeded(settings);
        let long = big.move_to(Vec3::new(4.0, 4.0, 0.0), None).unwrap();
        assert_eq!(long, MAX_MOVE_TIME);
    }

    #[test]
    fn test_move_outside_workspace_fails() {
        let mut world = world();
        let err = world.move_to(Vec3::new(0.9, 0.0, 0.1), None).unwrap_err();
        assert!(matches!(err, DirectiveError::OutOfWorkspace(_)));
        assert_eq!(world.robot().end_effector_pos, Vec3::new(0.0, 0.0, 0.3));
    }

    #[test]
    fn test_pick_requires_approach() {
        let mut world = world();
        let before = world.robot().clone();
        let err = world.pick("red_block").unwrap_err();
        assert!(matches!(err, DirectiveError::OutOfReach { .. }));
        assert_eq!(world.robot(), &before);
    }

    #[test]
    fn test_pick_with_closed_gripper_leaves_state() {
        let mut world = world();
        world.move_to(Vec3::default(), Some("red_block")).unwrap();
        world.close_gripper().unwrap();
        let before = world.robot().clone();

        assert_eq!(world.pick("red_block"), Err(DirectiveError::GripperClosed));
        assert_eq!(world.robot(), &before);
        assert!(world.invariants_hold());
    }

    #[test]
    fn test_pick_place_home_round_trip() {
        let mut world = world();
        world.move_to(Vec3::default(), Some("red_block")).unwrap();
        world.pick("red_block").unwrap();
        world.place(Vec3::new(0.1, 0.1, 0.05)).unwrap();
        assert_eq!(world.get_position("red_block"), Some(Vec3::new(0.1, 0.1, 0.05)));

        world.move_to(Vec3::new(0.1, 0.1, 0.05), None).unwrap();
        world.pick("red_block").unwrap();
        assert_eq!(world.robot().holding_object.as_deref(), Some("red_block"));
        assert!(!world.robot().gripper_open);
        assert!(world.invariants_hold());

        world.home().unwrap();
        assert_eq!(world.get_position("red_block"), Some(Vec3::new(0.1, 0.1, 0.05)));
        assert_eq!(world.robot().holding_object, None);
        assert!(world.robot().gripper_open);
        assert_eq!(world.robot().end_effector_pos, world.settings().home);
        assert!(world.invariants_hold());
    }

    #[test]
    fn test_place_without_holding_fails() {
        let mut world = world();
        assert_eq!(
            world.place(Vec3::new(0.0, 0.0, 0.05)),
            Err(DirectiveError::NotHolding)
        );
    }

    #[test]
    fn test_gripper_ops_are_idempotent() {
        let mut world = world();
        assert_eq!(world.open_gripper(), Ok(Duration::ZERO));
        assert_eq!(world.close_gripper(), Ok(GRIPPER_TIME));
        assert_eq!(world.close_gripper(), Ok(Duration::ZERO));
        assert!(!world.robot().gripper_open);
        assert!(world.invariants_hold());
    }

    #[test]
    fn test_open_gripper_drops_held_object() {
        let mut world = world();
        world.move_to(Vec3::default(), Some("green_block")).unwrap();
        world.pick("green_block").unwrap();
        world.move_to(Vec3::new(0.0, 0.1, 0.2), None).unwrap();
        world.open_gripper().unwrap();

        assert_eq!(world.robot().holding_object, None);
        assert_eq!(world.get_position("green_block"), Some(Vec3::new(0.0, 0.1, 0.2)));
        assert!(world.invariants_hold());
    }

    #[test]
    fn test_action_log_is_bounded() {
        let mut world = world();
        for i in 0..(ACTION_LOG_CAPACITY + 10) {
            world.note(format!("entry {i}"));
        }
        let recent = world.recent_log(ACTION_LOG_CAPACITY + 100);
        assert_eq!(recent.len(), ACTION_LOG_CAPACITY);
        assert!(recent.last().unwrap().ends_with("entry 59"));
        assert_eq!(world.recent_log(2).len(), 2);
    }

    #[test]
    fn test_summary_lists_objects() {
        let summary = world().to_string();
        assert!(summary.contains("gripper: open"));
        assert!(summary.contains("red_block (red): (0.30, 0.20, 0.05)"));
    }
}
