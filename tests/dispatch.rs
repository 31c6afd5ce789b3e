//! Directive execution against the seeded world

use std::sync::Arc;
use std::time::Duration;

use voxarm::agent::RobotResponse;
use voxarm::world::{
    ActionDirective, CommandDispatcher, Vec3, WorldModel, WorldObject, WorldSettings,
};
use voxarm::{InstantClock, TokioClock};

fn setup() -> (CommandDispatcher, Arc<InstantClock>, WorldModel) {
    let clock = Arc::new(InstantClock::new());
    (
        CommandDispatcher::new(clock.clone()),
        clock,
        WorldModel::seeded(WorldSettings::default()),
    )
}

fn snapshot(world: &WorldModel) -> (voxarm::world::RobotState, Vec<WorldObject>) {
    (world.robot().clone(), world.objects().cloned().collect())
}

#[tokio::test]
async fn test_fetch_and_place_scenario() {
    let (dispatcher, _, mut world) = setup();
    assert_eq!(world.get_position("red_block"), Some(Vec3::new(0.3, 0.2, 0.05)));

    let report = dispatcher
        .execute(
            &mut world,
            &[
                ActionDirective::new("move").target("red_block"),
                ActionDirective::new("pick").target("red_block"),
                ActionDirective::new("move").at(0.0, 0.0, 0.3),
                ActionDirective::new("place").at(0.0, 0.0, 0.05),
            ],
        )
        .await;

    assert_eq!((report.succeeded, report.total), (4, 4));
    assert!(report.all_succeeded());
    assert_eq!(world.get_position("red_block"), Some(Vec3::new(0.0, 0.0, 0.05)));
    assert!(world.robot().gripper_open);
    assert_eq!(world.robot().holding_object, None);
    assert!(world.invariants_hold());
}

#[tokio::test]
async fn test_unknown_object_does_not_abort_batch() {
    let (dispatcher, _, mut world) = setup();

    let report = dispatcher
        .execute(
            &mut world,
            &[
                ActionDirective::new("move").target("green_block"),
                ActionDirective::new("pick").target("purple_cube"),
                ActionDirective::new("home"),
            ],
        )
        .await;

    assert_eq!((report.succeeded, report.total), (2, 3));
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].index, 2);
    assert_eq!(failures[0].action, "pick");
    assert!(failures[0].message.contains("purple_cube"));

    // the directives around the failure still ran
    assert_eq!(world.robot().end_effector_pos, world.settings().home);
    assert!(world.recent_log(10).iter().any(|l| l.contains("moved to green_block")));
    assert_eq!(report.to_string(), "2/3 directives succeeded");
}

#[tokio::test]
async fn test_empty_batch_leaves_world_untouched() {
    let (dispatcher, clock, mut world) = setup();
    let before = snapshot(&world);

    let report = dispatcher.execute(&mut world, &[]).await;

    assert_eq!((report.succeeded, report.total), (0, 0));
    assert!(report.all_succeeded());
    assert_eq!(snapshot(&world), before);
    assert_eq!(clock.total_slept(), Duration::ZERO);
}

#[tokio::test]
async fn test_failed_preconditions_leave_state_unchanged() {
    let (dispatcher, _, mut world) = setup();
    dispatcher
        .execute(&mut world, &[ActionDirective::new("close_gripper")])
        .await;
    let before = snapshot(&world);

    let report = dispatcher
        .execute(
            &mut world,
            &[
                ActionDirective::new("pick").target("red_block"),
                ActionDirective::new("place"),
                ActionDirective::new("move").at(2.0, 0.0, 0.1),
                ActionDirective::new("dance"),
                ActionDirective::new("move"),
            ],
        )
        .await;

    assert_eq!((report.succeeded, report.total), (0, 5));
    assert_eq!(snapshot(&world), before);
    assert!(world.invariants_hold());
}

#[tokio::test]
async fn test_planner_json_stacks_objects() {
    let (dispatcher, _, mut world) = setup();
    let response = RobotResponse::parse(
        r#"{
            "speech": "Stacking the red block on the blue cup.",
            "commands": [
                {"action_type": "pick", "target_object": "red_block", "reasoning": "grasp"},
                {"action_type": "place", "target_object": "blue_cup", "reasoning": "stack"},
                {"action_type": "rotate", "parameters": {"angle": 90}},
                {"action_type": "HOME"}
            ],
            "needs_clarification": false
        }"#,
    )
    .unwrap();

    let report = dispatcher.execute(&mut world, &response.commands).await;

    assert!(report.all_succeeded(), "{report:?}");
    let red = world.get_position("red_block").unwrap();
    let cup = world.get_position("blue_cup").unwrap();
    assert!((red.x - cup.x).abs() < 1e-9 && (red.y - cup.y).abs() < 1e-9);
    assert!((red.z - 0.15).abs() < 1e-9);
}

#[tokio::test]
async fn test_partial_place_location_defaults() {
    let (dispatcher, _, mut world) = setup();
    let place: ActionDirective =
        serde_json::from_str(r#"{"action_type": "place", "location": {"x": 0.1}}"#).unwrap();

    let report = dispatcher
        .execute(
            &mut world,
            &[ActionDirective::new("pick").target("green_block"), place],
        )
        .await;

    assert_eq!(report.succeeded, 2);
    assert_eq!(world.get_position("green_block"), Some(Vec3::new(0.1, 0.0, 0.05)));
}

#[tokio::test(start_paused = true)]
async fn test_actuation_time_is_waited_out() {
    let dispatcher = CommandDispatcher::new(Arc::new(TokioClock));
    let mut world = WorldModel::seeded(WorldSettings::default());

    let started = tokio::time::Instant::now();
    let report = dispatcher
        .execute(
            &mut world,
            &[
                // 0.2 m at 2 s/m
                ActionDirective::new("move").at(0.0, 0.0, 0.1),
                ActionDirective::new("wait").param("duration", 1.5),
                ActionDirective::new("close_gripper"),
                ActionDirective::new("home"),
            ],
        )
        .await;
    let elapsed = started.elapsed().as_secs_f64();

    assert!(report.all_succeeded());
    assert!((3.19..3.21).contains(&elapsed), "elapsed {elapsed}");
}

#[tokio::test]
async fn test_wait_default_and_limit() {
    let (dispatcher, clock, mut world) = setup();

    let report = dispatcher
        .execute(
            &mut world,
            &[
                ActionDirective::new("wait"),
                ActionDirective::new("wait").param("duration", 600),
                ActionDirective::new("wait").param("duration", "soon"),
            ],
        )
        .await;

    assert_eq!((report.succeeded, report.total), (1, 3));
    assert_eq!(clock.total_slept(), Duration::from_secs(1));
}

#[tokio::test]
async fn test_pick_near_workspace_ceiling() {
    let (dispatcher, _, mut world) = setup();

    let report = dispatcher
        .execute(
            &mut world,
            &[
                ActionDirective::new("pick").target("red_block"),
                ActionDirective::new("place").at(0.1, 0.1, 0.45),
                ActionDirective::new("pick").target("red_block"),
            ],
        )
        .await;

    assert!(report.all_succeeded(), "{report:?}");
    assert_eq!(world.robot().holding_object.as_deref(), Some("red_block"));
    assert_eq!(world.robot().end_effector_pos, Vec3::new(0.1, 0.1, 0.45));
    assert!(world.invariants_hold());
}
