//! A* over a tile graph. Paths are computed fresh on every request and the
//! caller keeps only the first step.

use micromegas_tracing::prelude::*;

use super::action::Action;
use super::tile_graph::{Edge, TileGraph};
use crate::components::{Direction, TilePos};

/// Node sequence from start to goal, both included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    nodes: Vec<TilePos>,
    cost: u32,
}

impl Path {
    pub fn nodes(&self) -> &[TilePos] {
        &self.nodes
    }

    pub fn edge_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }

    /// The first node after the start.
    pub fn first_step(&self) -> Option<TilePos> {
        self.nodes.get(1).copied()
    }

    pub fn first_direction(&self) -> Option<Direction> {
        let from = *self.nodes.first()?;
        Direction::between(from, self.first_step()?)
    }
}

/// Manhattan distance heuristic. Admissible on a 4-connected unit-cost grid.
pub fn manhattan(a: &TilePos, b: &TilePos) -> u32 {
    (a.x - b.x).unsigned_abs() + (a.y - b.y).unsigned_abs()
}

/// Shortest path from `start` to `goal`, or `None` when either lies outside
/// the grid, the goal is unreachable, or both are the same tile.
pub fn find_path(graph: &TileGraph, start: TilePos, goal: TilePos) -> Option<Path> {
    if start == goal || !graph.contains(start) || !graph.contains(goal) {
        return None;
    }

    // Expansion follows edge order, so equal-priority ties resolve the same
    // way on every run.
    let (nodes, cost) = pathfinding::prelude::astar(
        &start,
        |pos| graph.neighbors(*pos).map(|n| (n, Edge::COST)),
        |pos| manhattan(pos, &goal),
        |pos| *pos == goal,
    )?;

    Some(Path { nodes, cost })
}

/// Movement toward `goal` along the first edge of a fresh path.
/// `None` means "no movement this tick".
#[span_fn]
pub fn next_step_toward(graph: &TileGraph, from: TilePos, goal: TilePos) -> Option<Action> {
    find_path(graph, from, goal)
        .and_then(|path| path.first_direction())
        .map(Action::step)
}

/// Step to the neighbor farthest from `threat`, or `None` when boxed in.
pub fn step_away_from(graph: &TileGraph, from: TilePos, threat: TilePos) -> Option<Action> {
    let current = manhattan(&from, &threat);
    graph
        .neighbors(from)
        .map(|n| (n, manhattan(&n, &threat)))
        .filter(|(_, d)| *d > current)
        // First maximum in edge order wins ties
        .fold(None, |best: Option<(TilePos, u32)>, item| match best {
            Some(b) if b.1 >= item.1 => Some(b),
            _ => Some(item),
        })
        .and_then(|(n, _)| Direction::between(from, n))
        .map(Action::step)
}
