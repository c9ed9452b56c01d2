//! Frame-level telemetry plus counters for AI events.

use bevy::prelude::*;
use micromegas_tracing::prelude::{debug, fmetric, imetric, info, span_scope};

use crate::events::{BackupRequested, EnemyStateChanged};

pub struct TelemetryPlugin;

impl Plugin for TelemetryPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<AiEventCounts>();
        app.add_systems(Last, frame_telemetry);
        app.add_observer(on_enemy_state_changed);
        app.add_observer(on_backup_requested);
    }
}

/// Running totals of observed AI events.
#[derive(Resource, Debug, Default)]
pub struct AiEventCounts {
    pub state_changes: u64,
    pub backup_requests: u64,
}

fn frame_telemetry(time: Res<Time>) {
    span_scope!("frame");
    let dt_ms = time.delta_secs_f64() * 1000.0;
    fmetric!("frame_time_ms", "ms", dt_ms);
}

fn on_enemy_state_changed(trigger: On<EnemyStateChanged>, mut counts: ResMut<AiEventCounts>) {
    counts.state_changes += 1;
    debug!(
        "enemy {:?} state {:?} -> {:?}",
        trigger.enemy, trigger.from, trigger.to
    );
    imetric!("ai_state_changes_total", "count", counts.state_changes);
}

fn on_backup_requested(trigger: On<BackupRequested>, mut counts: ResMut<AiEventCounts>) {
    counts.backup_requests += 1;
    info!(
        "enemy {:?} called for backup at ({:.1}, {:.1})",
        trigger.enemy, trigger.position.x, trigger.position.y
    );
    imetric!("ai_backup_requests_total", "count", counts.backup_requests);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::state_machine::EnemyState;

    #[test]
    fn observers_count_ai_events() {
        let mut app = App::new();
        app.add_plugins(MinimalPlugins);
        app.add_plugins(TelemetryPlugin);
        let enemy = app.world_mut().spawn_empty().id();

        app.world_mut().trigger(EnemyStateChanged {
            enemy,
            from: EnemyState::Spawn,
            to: EnemyState::Wander,
        });
        app.world_mut().trigger(BackupRequested {
            enemy,
            position: Vec2::new(2.0, 3.0),
        });
        app.update();

        let counts = app.world().resource::<AiEventCounts>();
        assert_eq!(counts.state_changes, 1);
        assert_eq!(counts.backup_requests, 1);
    }
}
