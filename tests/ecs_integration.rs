use avian2d::prelude::*;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::scene::ScenePlugin;
use bevy::state::app::StatesPlugin;
use flipside::ai::action::Action;
use flipside::ai::simulation::Simulation;
use flipside::ai::state_machine::EnemyState;
use flipside::ai::world::MotionIntent;
use flipside::app_state::AppState;
use flipside::components::{Enemy, EnemyKind, Facing, Stuck, Target};
use flipside::plugins::enemies::AiStatus;
use flipside::plugins::level::{LevelEntity, LevelSource, TileLayer};
use flipside::plugins::telemetry::AiEventCounts;
use flipside::resources::AiTuning;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn wait_for_state<S: States>(app: &mut App, target: S, max_updates: usize) {
    for i in 0..max_updates {
        app.update();
        if *app.world().resource::<State<S>>().get() == target {
            return;
        }
        assert!(
            i < max_updates - 1,
            "State never reached {:?} after {max_updates} updates",
            target,
        );
    }
}

/// Headless app with physics and the full AI plugin, loading `level`.
fn setup_app(level: &str) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    // Plugins required by avian2d but not in MinimalPlugins
    app.add_plugins(TransformPlugin);
    app.add_plugins(AssetPlugin::default());
    app.add_plugins(ScenePlugin);
    app.add_plugins(StatesPlugin);
    app.add_plugins(PhysicsPlugins::default());
    app.insert_resource(Gravity(Vec2::ZERO));
    app.insert_resource(AiTuning {
        spawn_ticks: 2,
        ..default()
    });
    app.insert_resource(LevelSource(level.to_string()));
    app.add_plugins(flipside::FlipsidePlugin);
    // finish() must be called before update(); avian registers its
    // diagnostics resources in Plugin::finish().
    app.finish();
    app.cleanup();
    app
}

fn spawn_target(app: &mut App, at: Vec2) -> Entity {
    app.world_mut()
        .spawn((
            Target,
            RigidBody::Dynamic,
            Collider::circle(0.4),
            Transform::from_xyz(at.x, at.y, 0.0),
        ))
        .id()
}

fn spawn_enemy(app: &mut App, kind: EnemyKind, at: Vec2) -> Entity {
    app.world_mut()
        .spawn((
            Enemy,
            kind,
            Facing::Right,
            RigidBody::Dynamic,
            Collider::circle(0.4),
            Transform::from_xyz(at.x, at.y, 0.0),
        ))
        .id()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn level_source_loads_into_game() {
    let mut app = setup_app("#....#\n#....#");
    wait_for_state(&mut app, AppState::InGame, 10);

    let layer = app.world().resource::<TileLayer>();
    assert_eq!(layer.solid_tiles().count(), 4);
    assert!(app.world().get_resource::<LevelSource>().is_none());

    let mut level = app.world_mut().query_filtered::<Entity, With<LevelEntity>>();
    assert_eq!(level.iter(app.world()).count(), 4);
    assert!(app.world().get_resource::<Simulation>().is_some());
}

#[test]
fn bad_level_stays_loading() {
    let mut app = setup_app("..x..");
    for _ in 0..5 {
        app.update();
    }
    assert_eq!(
        *app.world().resource::<State<AppState>>().get(),
        AppState::Loading
    );
    assert!(app.world().get_resource::<TileLayer>().is_none());
}

#[test]
fn enemies_get_motion_intents_and_events() {
    let mut app = setup_app("..........");
    spawn_target(&mut app, Vec2::new(100.0, 100.0));
    let walker = spawn_enemy(&mut app, EnemyKind::Walker, Vec2::ZERO);
    wait_for_state(&mut app, AppState::InGame, 10);

    for _ in 0..10 {
        app.update();
    }

    let status = *app.world().get::<AiStatus>(walker).unwrap();
    assert_eq!(status.state, EnemyState::Wander);
    assert!(status.can_flip);
    let intent = *app.world().get::<MotionIntent>(walker).unwrap();
    assert_eq!(intent.action, Action::RIGHT);

    let counts = app.world().resource::<AiEventCounts>();
    assert!(counts.state_changes >= 1);
}

#[test]
fn stuck_marker_pins_enemy() {
    let mut app = setup_app("..........");
    spawn_target(&mut app, Vec2::new(100.0, 100.0));
    let walker = spawn_enemy(&mut app, EnemyKind::Walker, Vec2::ZERO);
    wait_for_state(&mut app, AppState::InGame, 10);
    for _ in 0..5 {
        app.update();
    }

    app.world_mut().entity_mut(walker).insert(Stuck);
    app.update();
    app.update();
    let status = *app.world().get::<AiStatus>(walker).unwrap();
    assert_eq!(status.state, EnemyState::Stuck);
    assert!(app.world().get::<MotionIntent>(walker).unwrap().action.is_empty());

    app.world_mut().entity_mut(walker).remove::<Stuck>();
    app.update();
    app.update();
    let status = *app.world().get::<AiStatus>(walker).unwrap();
    assert_eq!(status.state, EnemyState::Wander);
}

#[test]
fn despawned_enemy_leaves_the_simulation() {
    let mut app = setup_app("..........");
    spawn_target(&mut app, Vec2::new(100.0, 100.0));
    let walker = spawn_enemy(&mut app, EnemyKind::Walker, Vec2::ZERO);
    spawn_enemy(&mut app, EnemyKind::Guard, Vec2::new(5.0, 0.0));
    wait_for_state(&mut app, AppState::InGame, 10);
    app.update();
    assert_eq!(app.world().resource::<Simulation>().len(), 2);

    app.world_mut().despawn(walker);
    app.update();
    assert_eq!(app.world().resource::<Simulation>().len(), 1);
}

#[test]
fn leaving_the_game_resets_the_session() {
    let mut app = setup_app("..........");
    spawn_target(&mut app, Vec2::new(100.0, 100.0));
    spawn_enemy(&mut app, EnemyKind::Walker, Vec2::ZERO);
    wait_for_state(&mut app, AppState::InGame, 10);
    for _ in 0..10 {
        app.update();
    }
    assert!(app.world().resource::<AiEventCounts>().state_changes >= 1);

    app.world_mut()
        .resource_mut::<NextState<AppState>>()
        .set(AppState::Loading);
    app.update();

    assert_eq!(
        *app.world().resource::<State<AppState>>().get(),
        AppState::Loading
    );
    let counts = app.world().resource::<AiEventCounts>();
    assert_eq!(counts.state_changes, 0);
    assert_eq!(counts.backup_requests, 0);
    assert!(app.world().get_resource::<TileLayer>().is_none());
    assert!(app.world().get_resource::<Simulation>().is_none());
}
