use bevy::prelude::*;

use crate::ai::behavior::EnemySpec;

// ---------------------------------------------------------------------------
// Grid and spatial
// ---------------------------------------------------------------------------

/// Integer tile coordinate. `y` grows upward, matching world space.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TilePos {
    pub x: i32,
    pub y: i32,
}

impl TilePos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Tile containing a world-space point (tile centers sit on integers).
    pub fn from_world(point: Vec2) -> Self {
        Self {
            x: point.x.round() as i32,
            y: point.y.round() as i32,
        }
    }

    pub fn to_world(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy) = direction.delta();
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Cardinal direction on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Grid offset for this direction.
    pub fn delta(&self) -> (i32, i32) {
        match self {
            Direction::Up => (0, 1),
            Direction::Down => (0, -1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Direction from one tile to an adjacent one.
    pub fn between(from: TilePos, to: TilePos) -> Option<Direction> {
        match (to.x - from.x, to.y - from.y) {
            (1, 0) => Some(Direction::Right),
            (-1, 0) => Some(Direction::Left),
            (0, 1) => Some(Direction::Up),
            (0, -1) => Some(Direction::Down),
            _ => None,
        }
    }
}

/// Horizontal facing of an enemy. Perception cones rotate with it.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Facing {
    Left,
    #[default]
    Right,
}

impl Facing {
    /// Cone direction in degrees, 0 pointing along +x.
    pub fn angle_degrees(&self) -> f32 {
        match self {
            Facing::Right => 0.0,
            Facing::Left => 180.0,
        }
    }

    pub fn opposite(&self) -> Facing {
        match self {
            Facing::Left => Facing::Right,
            Facing::Right => Facing::Left,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Facing::Left => Direction::Left,
            Facing::Right => Direction::Right,
        }
    }

    /// Facing that looks from `from` toward `to`, or `None` when aligned.
    pub fn toward(from: f32, to: f32) -> Option<Facing> {
        if to > from {
            Some(Facing::Right)
        } else if to < from {
            Some(Facing::Left)
        } else {
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Entity markers
// ---------------------------------------------------------------------------

/// The player (or any body enemies hunt).
#[derive(Component, Debug)]
pub struct Target;

#[derive(Component, Debug)]
pub struct Enemy;

/// The kind of enemy, mapped to a capability set when the controller spawns.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnemyKind {
    Walker,
    Roller,
    ShieldedRoller,
    Laser,
    ShieldedLaser,
    Guard,
}

impl EnemyKind {
    pub fn spec(&self) -> EnemySpec {
        EnemySpec::for_kind(*self)
    }
}

/// Marker: the enemy is pinned in place (e.g. by the player's gum).
#[derive(Component, Debug)]
pub struct Stuck;

/// Marker on the target: a level-wide alarm has been raised.
#[derive(Component, Debug)]
pub struct GlobalAlert;

/// Marker: this body currently lives under flipped gravity.
#[derive(Component, Debug)]
pub struct GravityFlipped;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_points_round_to_nearest_tile() {
        assert_eq!(TilePos::from_world(Vec2::new(2.4, -0.6)), TilePos::new(2, -1));
        assert_eq!(TilePos::new(3, 1).to_world(), Vec2::new(3.0, 1.0));
    }

    #[test]
    fn direction_between_adjacent_tiles_only() {
        let origin = TilePos::new(1, 1);
        for dir in [Direction::Up, Direction::Down, Direction::Left, Direction::Right] {
            assert_eq!(Direction::between(origin, origin.offset(dir)), Some(dir));
            assert_eq!(dir.opposite().opposite(), dir);
        }
        assert_eq!(Direction::between(origin, TilePos::new(2, 2)), None);
        assert_eq!(Direction::between(origin, origin), None);
    }

    #[test]
    fn facing_toward_target() {
        assert_eq!(Facing::toward(0.0, 3.0), Some(Facing::Right));
        assert_eq!(Facing::toward(0.0, -1.0), Some(Facing::Left));
        assert_eq!(Facing::toward(2.0, 2.0), None);
        assert_eq!(Facing::Left.opposite().angle_degrees(), 0.0);
    }
}
