pub mod ai;
pub mod app_state;
pub mod components;
pub mod error;
pub mod events;
pub mod plugins;
pub mod resources;

use bevy::prelude::*;
use micromegas_tracing::prelude::*;
use micromegas_tracing::prelude::info;

use app_state::AppState;
use plugins::enemies::EnemyAiPlugin;
use plugins::level::LevelPlugin;
use plugins::telemetry::{AiEventCounts, TelemetryPlugin};

/// Enemy AI for a gravity-flipping platformer: level loading, the AI tick
/// and its telemetry. Physics (`avian2d::PhysicsPlugins`) is added by the
/// host app.
pub struct FlipsidePlugin;

impl Plugin for FlipsidePlugin {
    fn build(&self, app: &mut App) {
        // State machine (StatesPlugin comes from the host's plugin group)
        app.init_state::<AppState>();

        app.add_plugins(LevelPlugin);
        app.add_plugins(EnemyAiPlugin);
        app.add_plugins(TelemetryPlugin);

        app.add_systems(OnExit(AppState::InGame), cleanup_session);
    }
}

/// Report the level's AI event totals and start the next one from zero.
#[span_fn]
fn cleanup_session(mut counts: ResMut<AiEventCounts>) {
    info!(
        "session ended: {} state changes, {} backup calls",
        counts.state_changes, counts.backup_requests
    );
    *counts = AiEventCounts::default();
}
