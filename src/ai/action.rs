//! Movement bitmask written to the motion-intent sink every tick.

use bitflags::bitflags;

use crate::components::{Direction, Facing};

bitflags! {
    /// Movement and attack flags for one tick. Empty means stand still.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Action: u8 {
        const LEFT  = 1 << 0;
        const RIGHT = 1 << 1;
        const UP    = 1 << 2;
        const DOWN  = 1 << 3;
        const FIRE  = 1 << 4;
        /// High-speed roll in the flagged horizontal direction.
        const DASH  = 1 << 5;
    }
}

impl Default for Action {
    fn default() -> Self {
        Action::empty()
    }
}

impl Action {
    const MOVEMENT: Action = Action::LEFT
        .union(Action::RIGHT)
        .union(Action::UP)
        .union(Action::DOWN);

    /// True when any of the four movement bits is set.
    pub fn moves(self) -> bool {
        self.intersects(Self::MOVEMENT)
    }

    pub fn fires(self) -> bool {
        self.contains(Self::FIRE)
    }

    pub fn step(direction: Direction) -> Action {
        match direction {
            Direction::Left => Self::LEFT,
            Direction::Right => Self::RIGHT,
            Direction::Up => Self::UP,
            Direction::Down => Self::DOWN,
        }
    }

    /// Horizontal component as a facing, if exactly one side is flagged.
    pub fn horizontal(self) -> Option<Facing> {
        match (self.contains(Self::LEFT), self.contains(Self::RIGHT)) {
            (true, false) => Some(Facing::Left),
            (false, true) => Some(Facing::Right),
            _ => None,
        }
    }
}

impl From<Facing> for Action {
    fn from(facing: Facing) -> Self {
        Action::step(facing.direction())
    }
}
