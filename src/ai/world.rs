//! Contracts the AI layer consumes from its collaborators: the physics world's
//! ray casts, body snapshots, tile lookups and the motion-intent sink.

use bevy::prelude::*;

use super::action::Action;
use super::tile_graph::{Gravity, TileType};

/// Identity key of a physics body. Perception sets and controllers are keyed
/// by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub u64);

impl From<Entity> for BodyId {
    fn from(entity: Entity) -> Self {
        BodyId(entity.to_bits())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

/// Classification of an obstruction. Environment perception reports tagged
/// static bodies instead of treating them as walls.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObstacleTag {
    #[default]
    None,
    Hazard,
    Crusher,
}

impl ObstacleTag {
    pub fn is_environmental(&self) -> bool {
        matches!(self, ObstacleTag::Hazard | ObstacleTag::Crusher)
    }
}

/// What a ray crossed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fixture {
    pub body: BodyId,
    pub body_type: BodyType,
    pub tag: ObstacleTag,
}

impl Fixture {
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec2,
    pub normal: Vec2,
    /// Position along the cast segment, 0 at `from` and 1 at `to`.
    pub fraction: f32,
}

/// Callback return: skip this fixture and keep the current clip.
pub const RAY_IGNORE: f32 = -1.0;
/// Callback return: stop the cast immediately.
pub const RAY_TERMINATE: f32 = 0.0;
/// Callback return: keep going without clipping.
pub const RAY_CONTINUE: f32 = 1.0;

/// Physics world ray queries.
///
/// The callback sees every fixture intersection whose fraction is within the
/// current clip. Returning a fraction clips the ray there, [`RAY_IGNORE`]
/// skips the fixture, [`RAY_CONTINUE`] leaves the clip untouched and
/// [`RAY_TERMINATE`] ends the cast.
pub trait RayCastWorld {
    fn ray_cast(&self, from: Vec2, to: Vec2, callback: &mut dyn FnMut(&Fixture, &RayHit) -> f32);
}

/// Level tile data source.
pub trait TileLookup {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    /// Tile class at a cell. Cells outside the grid are `NotWalkable`.
    fn tile_type(&self, x: i32, y: i32) -> TileType;
}

/// Snapshot of an enemy body taken at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnemyBody {
    pub id: BodyId,
    pub position: Vec2,
    pub gravity: Gravity,
    pub stuck: bool,
}

impl EnemyBody {
    pub fn new(id: BodyId, position: Vec2) -> Self {
        Self {
            id,
            position,
            gravity: Gravity::Normal,
            stuck: false,
        }
    }
}

/// Snapshot of the body enemies hunt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetBody {
    pub id: BodyId,
    pub position: Vec2,
    pub global_alert: bool,
}

/// Damage dealt by a firing laser beam this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeamHit {
    pub body: BodyId,
    pub damage: u32,
}

/// Per-tick output for one enemy, consumed by physics and animation.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MotionIntent {
    pub action: Action,
    pub beam_hit: Option<BeamHit>,
}

/// Receiver of motion intents. The AI never sets velocities itself.
pub trait MotionIntentSink {
    fn submit(&mut self, enemy: BodyId, intent: MotionIntent);
}

impl MotionIntentSink for Vec<(BodyId, MotionIntent)> {
    fn submit(&mut self, enemy: BodyId, intent: MotionIntent) {
        self.push((enemy, intent));
    }
}
