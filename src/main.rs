use std::time::Duration;

use avian2d::prelude::*;
use bevy::app::ScheduleRunnerPlugin;
use bevy::asset::AssetPlugin;
use bevy::prelude::*;
use bevy::scene::ScenePlugin;
use bevy::state::app::StatesPlugin;
use bevy::tasks::{ComputeTaskPool, TaskPoolBuilder};
use flipside::ai::action::Action;
use flipside::ai::world::MotionIntent;
use flipside::app_state::AppState;
use flipside::components::{Enemy, EnemyKind, Facing, Target};
use flipside::plugins::enemies::AiStatus;
use flipside::plugins::level::LevelSource;
use flipside::resources::AiTuning;
use micromegas_telemetry_sink::TelemetryGuardBuilder;
use micromegas_telemetry_sink::tracing_interop::TracingCaptureLayer;
use micromegas_tracing::dispatch::init_thread_stream;
use micromegas_tracing::levels::LevelFilter;
use micromegas_tracing::prelude::{error, info};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;

const DEMO_LEVEL: &str = "\
##################
#................#
#..####....^.....#
#................#
#+++++++++++++++++
";

/// Frames the demo runs before exiting.
const DEMO_FRAMES: u32 = 600;
/// World units per second for a one-tile move.
const MOVE_SPEED: f32 = 3.0;
const DASH_SPEED: f32 = 8.0;

fn main() {
    // 1. Initialize telemetry (creates LocalEventSink for stdout)
    //    Note: spans require MICROMEGAS_ENABLE_CPU_TRACING=true (env var).
    let _telemetry_guard = TelemetryGuardBuilder::default()
        .with_install_tracing_capture(false)
        .build()
        .expect("failed to initialize telemetry");

    info!("flipside headless AI demo starting");

    // 2. Route `tracing` events (Bevy's own logs) into Micromegas.
    let log_layer = TracingCaptureLayer {
        max_level: LevelFilter::Info,
    };
    let subscriber = Registry::default().with(log_layer);
    tracing::subscriber::set_global_default(subscriber).expect("failed to set tracing subscriber");

    // 3. Pre-init ComputeTaskPool with Micromegas thread callbacks, before
    //    App::new() so TaskPoolPlugin skips its own init.
    ComputeTaskPool::get_or_init(|| {
        TaskPoolBuilder::new()
            .on_thread_spawn(|| {
                init_thread_stream();
            })
            .on_thread_destroy(|| {
                micromegas_tracing::dispatch::flush_thread_buffer();
                micromegas_tracing::dispatch::unregister_thread_stream();
            })
            .build()
    });

    let tuning = match std::env::args().nth(1) {
        Some(path) => match std::fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|text| AiTuning::from_json(&text).map_err(|e| e.to_string()))
        {
            Ok(tuning) => tuning,
            Err(e) => {
                error!("failed to load AI tuning {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => AiTuning::default(),
    };

    // 4. Run the headless app
    App::new()
        .add_plugins(MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_millis(16))))
        .add_plugins((TransformPlugin, AssetPlugin::default(), ScenePlugin, StatesPlugin))
        .add_plugins(PhysicsPlugins::default())
        .insert_resource(Gravity(Vec2::ZERO))
        .insert_resource(tuning)
        .insert_resource(LevelSource(DEMO_LEVEL.to_string()))
        .add_plugins(flipside::FlipsidePlugin)
        .add_systems(OnEnter(AppState::InGame), spawn_actors)
        .add_systems(
            Update,
            (move_target, apply_intents, stop_after_demo).run_if(in_state(AppState::InGame)),
        )
        .run();
}

fn spawn_actors(mut commands: Commands) {
    commands.spawn((
        Target,
        RigidBody::Dynamic,
        Collider::circle(0.4),
        LockedAxes::ROTATION_LOCKED,
        Transform::from_xyz(14.0, 3.0, 0.0),
    ));
    let enemies = [
        (EnemyKind::Walker, Vec2::new(2.0, 3.0), Facing::Right),
        (EnemyKind::ShieldedRoller, Vec2::new(5.0, 1.0), Facing::Right),
        (EnemyKind::Laser, Vec2::new(9.0, 3.0), Facing::Left),
        (EnemyKind::Guard, Vec2::new(16.0, 1.0), Facing::Left),
    ];
    for (kind, at, facing) in enemies {
        commands.spawn((
            Enemy,
            kind,
            facing,
            RigidBody::Dynamic,
            Collider::circle(0.4),
            LockedAxes::ROTATION_LOCKED,
            Transform::from_xyz(at.x, at.y, 0.0),
        ));
    }
}

/// The target paces back and forth along the top corridor.
fn move_target(time: Res<Time>, mut query: Query<&mut LinearVelocity, With<Target>>) {
    let direction = if (time.elapsed_secs() / 4.0) as u32 % 2 == 0 {
        -1.0
    } else {
        1.0
    };
    for mut velocity in &mut query {
        velocity.0 = Vec2::new(direction * MOVE_SPEED * 0.5, 0.0);
    }
}

/// Stand-in movement layer: motion intents become velocities.
fn apply_intents(mut query: Query<(&MotionIntent, &mut LinearVelocity, &AiStatus), With<Enemy>>) {
    for (intent, mut velocity, status) in &mut query {
        let speed = if intent.action.contains(Action::DASH) {
            DASH_SPEED
        } else {
            MOVE_SPEED
        };
        let mut v = Vec2::ZERO;
        if intent.action.contains(Action::LEFT) {
            v.x -= 1.0;
        }
        if intent.action.contains(Action::RIGHT) {
            v.x += 1.0;
        }
        if intent.action.contains(Action::UP) {
            v.y += 1.0;
        }
        if intent.action.contains(Action::DOWN) {
            v.y -= 1.0;
        }
        velocity.0 = v * speed;
        if let Some(hit) = intent.beam_hit {
            info!("beam hit {:?} for {} ({:?})", hit.body, hit.damage, status.state);
        }
    }
}

fn stop_after_demo(mut frames: Local<u32>, mut exit: MessageWriter<AppExit>) {
    *frames += 1;
    if *frames >= DEMO_FRAMES {
        info!("demo finished after {} frames", *frames);
        exit.write(AppExit::Success);
    }
}
