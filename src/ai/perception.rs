//! Ray-fan perception units ("vision cones").
//!
//! Every unit casts `ray_count` rays spread evenly over its angular range.
//! A first pass along each ray finds the first blocking fixture and truncates
//! the ray there. A second pass collects the bodies crossed before that point.
//! Which fixtures block and which are collected depends on the unit's
//! [`PerceptionKind`]; the algorithm is shared.
//!
//! Results are only as fresh as the last `update`. Querying before updating
//! in a tick returns the previous tick's answer.

use std::collections::BTreeSet;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::world::{BodyId, BodyType, Fixture, RAY_CONTINUE, RAY_IGNORE, RayCastWorld, RayHit};

/// Functional role of a perception unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerceptionKind {
    /// Line of sight; terrain occludes.
    Vision,
    /// Proximity "hearing"; passes through terrain.
    Sensing,
    /// Short-range detection deciding whether an attack can land.
    Attack,
    /// Looks ahead for hazards and crushers.
    Environment,
}

impl PerceptionKind {
    /// Whether a fixture truncates rays for this kind.
    fn blocks(&self, fixture: &Fixture) -> bool {
        match self {
            PerceptionKind::Sensing => false,
            PerceptionKind::Vision | PerceptionKind::Attack => fixture.is_static(),
            PerceptionKind::Environment => fixture.is_static() && !fixture.tag.is_environmental(),
        }
    }

    /// Whether a fixture ends up in the visible set.
    fn collects(&self, fixture: &Fixture) -> bool {
        match fixture.body_type {
            BodyType::Dynamic => true,
            BodyType::Static => {
                *self == PerceptionKind::Environment && fixture.tag.is_environmental()
            }
            BodyType::Kinematic => false,
        }
    }
}

/// Tunable shape of a perception unit. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConeConfig {
    pub radius: f32,
    pub range_degrees: f32,
    pub ray_count: usize,
    /// Added to the owner's facing angle when the direction is synced.
    #[serde(default)]
    pub direction_offset: f32,
}

impl ConeConfig {
    pub const fn new(radius: f32, range_degrees: f32, ray_count: usize) -> Self {
        Self {
            radius,
            range_degrees,
            ray_count,
            direction_offset: 0.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PerceptionUnit {
    kind: PerceptionKind,
    config: ConeConfig,
    direction: f32,
    /// The body carrying this unit; never blocks and is never collected.
    owner: Option<BodyId>,
    /// Ray endpoints relative to the owner, truncated at the first blocker.
    rays: Vec<Vec2>,
    visible: BTreeSet<BodyId>,
    hazards: BTreeSet<BodyId>,
}

impl PerceptionUnit {
    pub fn new(kind: PerceptionKind, config: ConeConfig) -> Self {
        Self {
            kind,
            config,
            direction: config.direction_offset,
            owner: None,
            rays: Vec::with_capacity(config.ray_count),
            visible: BTreeSet::new(),
            hazards: BTreeSet::new(),
        }
    }

    pub fn owned_by(mut self, owner: BodyId) -> Self {
        self.owner = Some(owner);
        self
    }

    pub fn kind(&self) -> PerceptionKind {
        self.kind
    }

    pub fn config(&self) -> &ConeConfig {
        &self.config
    }

    pub fn direction(&self) -> f32 {
        self.direction
    }

    pub fn set_direction(&mut self, degrees: f32) {
        self.direction = degrees;
    }

    /// Point the cone along the owner's facing plus the configured offset.
    pub fn sync_direction(&mut self, facing_degrees: f32) {
        self.direction = facing_degrees + self.config.direction_offset;
    }

    /// Ray angles in degrees, evenly spaced over the range.
    ///
    /// A full circle spaces rays by `range / count`, centered on the
    /// direction, so the first and last rays never coincide.
    fn ray_angles(&self) -> impl Iterator<Item = f32> + '_ {
        let count = self.config.ray_count;
        let range = self.config.range_degrees;
        let (start, spacing) = if count <= 1 {
            (self.direction, 0.0)
        } else if range >= 360.0 {
            let spacing = range / count as f32;
            (self.direction - range / 2.0 + spacing / 2.0, spacing)
        } else {
            (self.direction - range / 2.0, range / (count - 1) as f32)
        };
        (0..count).map(move |i| start + spacing * i as f32)
    }

    /// Recast the fan from `origin` and rebuild the visible set.
    pub fn update(&mut self, world: &dyn RayCastWorld, origin: Vec2) {
        let kind = self.kind;
        let owner = self.owner;
        let radius = self.config.radius;
        let angles: Vec<f32> = self.ray_angles().collect();

        self.rays.clear();
        self.visible.clear();
        self.hazards.clear();

        for angle in angles {
            let offset = Vec2::from_angle(angle.to_radians()) * radius;
            let end = origin + offset;

            let mut blocked_at = 1.0f32;
            world.ray_cast(origin, end, &mut |fixture: &Fixture, hit: &RayHit| {
                if Some(fixture.body) == owner {
                    RAY_IGNORE
                } else if kind.blocks(fixture) {
                    blocked_at = blocked_at.min(hit.fraction);
                    hit.fraction
                } else {
                    RAY_IGNORE
                }
            });
            self.rays.push(offset * blocked_at);

            if blocked_at <= 0.0 {
                continue;
            }

            let (visible, hazards) = (&mut self.visible, &mut self.hazards);
            world.ray_cast(origin, end, &mut |fixture: &Fixture, hit: &RayHit| {
                if Some(fixture.body) != owner
                    && hit.fraction < blocked_at
                    && kind.collects(fixture)
                {
                    visible.insert(fixture.body);
                    if fixture.is_static() {
                        hazards.insert(fixture.body);
                    }
                }
                RAY_CONTINUE
            });
        }
    }

    /// Whether `body` was in the set computed by the last `update`.
    pub fn can_see(&self, body: BodyId) -> bool {
        self.visible.contains(&body)
    }

    pub fn visible(&self) -> &BTreeSet<BodyId> {
        &self.visible
    }

    /// Hazard and crusher bodies in the last visible set.
    pub fn hazards(&self) -> &BTreeSet<BodyId> {
        &self.hazards
    }

    pub fn rays(&self) -> &[Vec2] {
        &self.rays
    }
}

/// The four units every enemy carries.
#[derive(Debug, Clone)]
pub struct Perception {
    pub vision: PerceptionUnit,
    pub sensing: PerceptionUnit,
    pub attack: PerceptionUnit,
    pub environment: PerceptionUnit,
}

impl Perception {
    pub fn new(cones: &PerceptionConfig, owner: BodyId) -> Self {
        let unit = |kind, config| PerceptionUnit::new(kind, config).owned_by(owner);
        Self {
            vision: unit(PerceptionKind::Vision, cones.vision),
            sensing: unit(PerceptionKind::Sensing, cones.sensing),
            attack: unit(PerceptionKind::Attack, cones.attack),
            environment: unit(PerceptionKind::Environment, cones.environment),
        }
    }

    pub fn units(&self) -> [&PerceptionUnit; 4] {
        [&self.vision, &self.sensing, &self.attack, &self.environment]
    }

    fn units_mut(&mut self) -> [&mut PerceptionUnit; 4] {
        [
            &mut self.vision,
            &mut self.sensing,
            &mut self.attack,
            &mut self.environment,
        ]
    }

    /// Sync every unit with the owner's facing, then recast all of them.
    pub fn refresh(&mut self, world: &dyn RayCastWorld, origin: Vec2, facing_degrees: f32) {
        for unit in self.units_mut() {
            unit.sync_direction(facing_degrees);
            unit.update(world, origin);
        }
    }

    /// Whether any hazard or crusher lies in the environment cone.
    pub fn hazard_ahead(&self) -> bool {
        !self.environment.hazards().is_empty()
    }
}

/// Cone shapes for the four perception kinds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionConfig {
    pub vision: ConeConfig,
    pub sensing: ConeConfig,
    pub attack: ConeConfig,
    pub environment: ConeConfig,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            vision: ConeConfig::new(7.0, 90.0, 9),
            sensing: ConeConfig::new(8.0, 360.0, 25),
            attack: ConeConfig::new(3.0, 30.0, 5),
            environment: ConeConfig::new(1.5, 20.0, 3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::shape_world::ShapeWorld;
    use crate::ai::world::ObstacleTag;

    const TARGET: BodyId = BodyId(1);

    fn vision(radius: f32, range: f32, rays: usize) -> PerceptionUnit {
        PerceptionUnit::new(PerceptionKind::Vision, ConeConfig::new(radius, range, rays))
    }

    #[test]
    fn sees_dynamic_body_in_cone() {
        let mut world = ShapeWorld::default();
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(5.0, 0.0), 0.4);

        let mut cone = vision(7.0, 90.0, 9);
        cone.update(&world, Vec2::ZERO);
        assert!(cone.can_see(TARGET));

        // Facing away
        cone.set_direction(180.0);
        cone.update(&world, Vec2::ZERO);
        assert!(!cone.can_see(TARGET));
    }

    #[test]
    fn out_of_radius_is_invisible() {
        let mut world = ShapeWorld::default();
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(9.0, 0.0), 0.4);
        let mut cone = vision(7.0, 90.0, 9);
        cone.update(&world, Vec2::ZERO);
        assert!(!cone.can_see(TARGET));
    }

    #[test]
    fn wall_occludes_vision_but_not_sensing() {
        let mut world = ShapeWorld::default();
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(5.0, 0.0), 0.4);
        world.add_box(BodyId(9), BodyType::Static, Vec2::new(2.5, 0.0), Vec2::new(0.5, 3.0));

        let mut cone = vision(7.0, 90.0, 9);
        cone.update(&world, Vec2::ZERO);
        assert!(!cone.can_see(TARGET));
        // Center ray truncated at the wall's near face (x = 2.0)
        let center = cone.rays()[4];
        assert!((center.x - 2.0).abs() < 1e-3, "ray end {center:?}");

        let mut ears = PerceptionUnit::new(PerceptionKind::Sensing, ConeConfig::new(7.0, 360.0, 17));
        ears.update(&world, Vec2::ZERO);
        assert!(ears.can_see(TARGET));
    }

    #[test]
    fn zero_distance_obstruction_reports_nothing() {
        let mut world = ShapeWorld::default();
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(3.0, 0.0), 0.4);
        // Origin sits inside a static box
        world.add_box(BodyId(9), BodyType::Static, Vec2::ZERO, Vec2::splat(0.5));

        let mut cone = vision(7.0, 10.0, 1);
        cone.update(&world, Vec2::ZERO);
        assert!(!cone.can_see(TARGET));
        assert_eq!(cone.rays()[0], Vec2::ZERO);
    }

    #[test]
    fn update_is_deterministic() {
        let mut world = ShapeWorld::default();
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(4.0, 1.0), 0.5);
        world.add_circle(BodyId(2), BodyType::Dynamic, Vec2::new(3.0, -2.0), 0.5);
        world.add_box(BodyId(9), BodyType::Static, Vec2::new(2.0, 3.0), Vec2::splat(0.5));

        let mut cone = vision(7.0, 90.0, 9);
        cone.update(&world, Vec2::ZERO);
        let first = cone.visible().clone();
        let first_rays = cone.rays().to_vec();
        cone.update(&world, Vec2::ZERO);
        assert_eq!(&first, cone.visible());
        assert_eq!(first_rays, cone.rays());
        assert!(!first.is_empty());
    }

    #[test]
    fn environment_reports_hazards_and_passes_through_them() {
        let mut world = ShapeWorld::default();
        let spikes = BodyId(20);
        world.add_tagged_box(
            spikes,
            BodyType::Static,
            ObstacleTag::Hazard,
            Vec2::new(1.0, 0.0),
            Vec2::splat(0.3),
        );
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(1.4, 0.0), 0.05);

        let mut env = PerceptionUnit::new(PerceptionKind::Environment, ConeConfig::new(1.5, 20.0, 3));
        env.update(&world, Vec2::ZERO);
        assert!(env.can_see(spikes));
        assert!(env.hazards().contains(&spikes));
        assert!(!env.hazards().contains(&TARGET));
        assert!(env.can_see(TARGET), "hazards do not occlude the environment cone");

        // Vision treats the same hazard as a wall
        let mut eyes = vision(1.5, 20.0, 3);
        eyes.update(&world, Vec2::ZERO);
        assert!(!eyes.can_see(spikes));
        assert!(!eyes.can_see(TARGET));
    }

    #[test]
    fn stale_until_updated() {
        let mut world = ShapeWorld::default();
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(5.0, 0.0), 0.4);
        let mut cone = vision(7.0, 90.0, 9);
        cone.update(&world, Vec2::ZERO);
        assert!(cone.can_see(TARGET));

        world.move_body(TARGET, Vec2::new(50.0, 0.0));
        assert!(cone.can_see(TARGET), "previous answer until the next update");
        cone.update(&world, Vec2::ZERO);
        assert!(!cone.can_see(TARGET));
    }

    #[test]
    fn owner_body_is_transparent() {
        let mut world = ShapeWorld::default();
        let me = BodyId(5);
        world.add_circle(me, BodyType::Dynamic, Vec2::ZERO, 0.5);
        world.add_circle(TARGET, BodyType::Dynamic, Vec2::new(4.0, 0.0), 0.4);

        let mut cone = vision(7.0, 90.0, 9).owned_by(me);
        cone.update(&world, Vec2::ZERO);
        assert!(!cone.can_see(me));
        assert!(cone.can_see(TARGET));
    }

    #[test]
    fn full_circle_rays_are_distinct() {
        let ears = PerceptionUnit::new(PerceptionKind::Sensing, ConeConfig::new(8.0, 360.0, 25));
        let angles: Vec<f32> = ears.ray_angles().collect();
        assert_eq!(angles.len(), 25);
        for (i, a) in angles.iter().enumerate() {
            for b in &angles[i + 1..] {
                let apart = (a - b).rem_euclid(360.0);
                assert!(apart > 1.0 && apart < 359.0, "{a} and {b} coincide");
            }
        }
        assert!(angles.iter().any(|a| a.abs() < 1e-3), "no ray along the facing");

        let eyes = vision(7.0, 90.0, 9);
        let angles: Vec<f32> = eyes.ray_angles().collect();
        assert!((angles[0] + 45.0).abs() < 1e-4);
        assert!((angles[8] - 45.0).abs() < 1e-4);
    }

    #[test]
    fn direction_follows_facing_with_offset() {
        let mut config = ConeConfig::new(1.0, 10.0, 1);
        config.direction_offset = -30.0;
        let mut unit = PerceptionUnit::new(PerceptionKind::Environment, config);
        unit.sync_direction(180.0);
        assert_eq!(unit.direction(), 150.0);
    }
}
