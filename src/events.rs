//! AI events triggered by the enemy systems and observed by telemetry.

use bevy::prelude::*;

use crate::ai::state_machine::EnemyState;

/// An enemy switched its current state.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct EnemyStateChanged {
    pub enemy: Entity,
    pub from: EnemyState,
    pub to: EnemyState,
}

/// A pinned enemy broadcast a call for backup from `position`.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct BackupRequested {
    pub enemy: Entity,
    pub position: Vec2,
}

/// Something asks to toggle an enemy's gravity. Refused while its laser is
/// charging or firing.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct FlipRequested {
    pub enemy: Entity,
}
