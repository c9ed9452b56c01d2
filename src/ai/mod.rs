//! Enemy AI core: tile graphs, pathfinding, perception cones, the per-enemy
//! state machine and the message bus that lets enemies call for help.
//!
//! Nothing in here touches the ECS directly. The physics world, tile data and
//! motion output are reached through the contracts in [`world`], which keeps
//! the whole layer testable with [`shape_world::ShapeWorld`].

pub mod action;
pub mod behavior;
pub mod controller;
pub mod messages;
pub mod pathfinder;
pub mod perception;
pub mod shape_world;
pub mod simulation;
pub mod state_machine;
mod states;
pub mod tile_graph;
pub mod world;
