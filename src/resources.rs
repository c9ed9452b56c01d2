use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::ai::perception::PerceptionConfig;
use crate::error::TuningError;

// ---------------------------------------------------------------------------
// AI tuning
// ---------------------------------------------------------------------------

/// Gameplay constants for enemy behavior. Durations are in AI ticks.
///
/// Any field missing from a JSON document keeps its default, so a tuning
/// file only needs to name what it changes.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiTuning {
    /// Ticks an enemy idles in SPAWN before it starts wandering.
    pub spawn_ticks: u32,
    /// A stuck enemy calls for backup every this many ticks.
    pub backup_interval: u32,
    /// Ticks between two shots.
    pub fire_cooldown: u32,
    pub roll_ticks: u32,
    pub roll_recovery_ticks: u32,
    pub laser_charge_ticks: u32,
    pub laser_fire_ticks: u32,
    pub laser_damage: u32,
    /// Beam length in world units.
    pub laser_range: f32,
    /// Ranged enemies back away while the target is closer than this many
    /// tiles and their weapon is cooling down.
    pub retreat_distance: u32,
    pub perception: PerceptionConfig,
}

impl Default for AiTuning {
    fn default() -> Self {
        Self {
            spawn_ticks: 120,
            backup_interval: 200,
            fire_cooldown: 45,
            roll_ticks: 40,
            roll_recovery_ticks: 60,
            laser_charge_ticks: 60,
            laser_fire_ticks: 30,
            laser_damage: 1,
            laser_range: 10.0,
            retreat_distance: 2,
            perception: PerceptionConfig::default(),
        }
    }
}

impl AiTuning {
    /// Parse a tuning document and check it.
    pub fn from_json(text: &str) -> Result<Self, TuningError> {
        let tuning: AiTuning = serde_json::from_str(text)?;
        tuning.validate()?;
        Ok(tuning)
    }

    pub fn validate(&self) -> Result<(), TuningError> {
        let counts = [
            ("backup_interval", self.backup_interval),
            ("roll_ticks", self.roll_ticks),
            ("laser_charge_ticks", self.laser_charge_ticks),
            ("laser_fire_ticks", self.laser_fire_ticks),
        ];
        if let Some((field, _)) = counts.iter().find(|(_, v)| *v == 0) {
            return Err(TuningError::NonPositive { field });
        }

        let cones = &self.perception;
        let lengths = [
            ("laser_range", self.laser_range),
            ("perception.vision.radius", cones.vision.radius),
            ("perception.sensing.radius", cones.sensing.radius),
            ("perception.attack.radius", cones.attack.radius),
            ("perception.environment.radius", cones.environment.radius),
        ];
        if let Some((field, _)) = lengths.iter().find(|(_, v)| *v <= 0.0) {
            return Err(TuningError::NonPositive { field });
        }

        let rays = [
            ("perception.vision.ray_count", cones.vision.ray_count),
            ("perception.sensing.ray_count", cones.sensing.ray_count),
            ("perception.attack.ray_count", cones.attack.ray_count),
            ("perception.environment.ray_count", cones.environment.ray_count),
        ];
        if let Some((field, _)) = rays.iter().find(|(_, v)| *v == 0) {
            return Err(TuningError::NonPositive { field });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let tuning = AiTuning::default();
        assert_eq!(tuning.spawn_ticks, 120);
        assert_eq!(tuning.backup_interval, 200);
        assert!(tuning.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let tuning = AiTuning::from_json(r#"{ "fire_cooldown": 10, "perception": { "vision": { "radius": 4.0, "range_degrees": 60.0, "ray_count": 5 } } }"#)
            .unwrap();
        assert_eq!(tuning.fire_cooldown, 10);
        assert_eq!(tuning.spawn_ticks, 120);
        assert!((tuning.perception.vision.radius - 4.0).abs() < f32::EPSILON);
        assert_eq!(tuning.perception.sensing, PerceptionConfig::default().sensing);
    }

    #[test]
    fn rejects_zero_interval() {
        let err = AiTuning::from_json(r#"{ "backup_interval": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            TuningError::NonPositive {
                field: "backup_interval"
            }
        ));
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(
            AiTuning::from_json("{ not json"),
            Err(TuningError::Malformed(_))
        ));
    }
}
