//! Walkability graphs built once per level from the tile layer.
//!
//! Gravity can flip, so a level carries two graphs: one where "floor" means
//! normal-gravity tiles and one for flipped gravity. Each graph has a node
//! for every cell and a directed edge into each axis neighbor whose tile
//! permits the graph's orientation.

use micromegas_tracing::prelude::*;

use super::world::TileLookup;
use crate::components::{Direction, TilePos};

/// Walkability class of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TileType {
    #[default]
    NotWalkable,
    Normal,
    Flipped,
    Both,
}

impl TileType {
    /// Whether an enemy living under `gravity` may stand in this tile.
    pub fn permits(&self, gravity: Gravity) -> bool {
        match gravity {
            Gravity::Normal => matches!(self, TileType::Normal | TileType::Both),
            Gravity::Flipped => matches!(self, TileType::Flipped | TileType::Both),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Gravity {
    #[default]
    Normal,
    Flipped,
}

impl Gravity {
    pub fn flipped(&self) -> Gravity {
        match self {
            Gravity::Normal => Gravity::Flipped,
            Gravity::Flipped => Gravity::Normal,
        }
    }
}

/// Unit-cost directed edge, owned by its `from` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: TilePos,
    pub to: TilePos,
}

impl Edge {
    pub const COST: u32 = 1;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileNode {
    pub pos: TilePos,
    pub tile_type: TileType,
    edges: Vec<Edge>,
}

impl TileNode {
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Neighbor order used when wiring edges; also the A* expansion order.
const NEIGHBOR_ORDER: [Direction; 4] = [
    Direction::Left,
    Direction::Right,
    Direction::Down,
    Direction::Up,
];

#[derive(Debug, Clone)]
pub struct TileGraph {
    width: usize,
    height: usize,
    gravity: Gravity,
    nodes: Vec<TileNode>,
}

impl TileGraph {
    /// Build the graph for one gravity orientation.
    #[span_fn]
    pub fn build(tiles: &impl TileLookup, gravity: Gravity) -> Self {
        let (width, height) = (tiles.width(), tiles.height());
        let mut nodes = Vec::with_capacity(width * height);

        for y in 0..height as i32 {
            for x in 0..width as i32 {
                let pos = TilePos::new(x, y);
                let edges = NEIGHBOR_ORDER
                    .iter()
                    .map(|dir| pos.offset(*dir))
                    .filter(|to| in_bounds(*to, width, height))
                    .filter(|to| tiles.tile_type(to.x, to.y).permits(gravity))
                    .map(|to| Edge { from: pos, to })
                    .collect();
                nodes.push(TileNode {
                    pos,
                    tile_type: tiles.tile_type(x, y),
                    edges,
                });
            }
        }

        let edge_count: usize = nodes.iter().map(|n| n.edges.len()).sum();
        debug!(
            "tile graph built: {}x{} gravity={:?} edges={}",
            width, height, gravity, edge_count
        );

        Self {
            width,
            height,
            gravity,
            nodes,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        in_bounds(pos, self.width, self.height)
    }

    /// Node at a cell, or `None` outside the grid.
    pub fn node_at(&self, x: i32, y: i32) -> Option<&TileNode> {
        let pos = TilePos::new(x, y);
        if !self.contains(pos) {
            return None;
        }
        self.nodes.get(y as usize * self.width + x as usize)
    }

    /// Tile class at a cell; outside the grid this is `NotWalkable`.
    pub fn tile_type_at(&self, x: i32, y: i32) -> TileType {
        self.node_at(x, y)
            .map(|n| n.tile_type)
            .unwrap_or(TileType::NotWalkable)
    }

    /// Outgoing edges in neighbor order; empty outside the grid.
    pub fn edges_from(&self, pos: TilePos) -> &[Edge] {
        self.node_at(pos.x, pos.y)
            .map(TileNode::edges)
            .unwrap_or(&[])
    }

    /// Whether one step from `pos` toward `direction` follows an edge.
    pub fn can_step(&self, pos: TilePos, direction: Direction) -> bool {
        let to = pos.offset(direction);
        self.edges_from(pos).iter().any(|e| e.to == to)
    }

    /// Destinations reachable in one step, in edge order.
    pub fn neighbors(&self, pos: TilePos) -> impl Iterator<Item = TilePos> + '_ {
        self.edges_from(pos).iter().map(|e| e.to)
    }
}

fn in_bounds(pos: TilePos, width: usize, height: usize) -> bool {
    pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < width && (pos.y as usize) < height
}

/// The pair of graphs a level carries, one per gravity orientation.
#[derive(Debug, Clone)]
pub struct GravityGraphs {
    normal: TileGraph,
    flipped: TileGraph,
}

impl GravityGraphs {
    pub fn build(tiles: &impl TileLookup) -> Self {
        Self {
            normal: TileGraph::build(tiles, Gravity::Normal),
            flipped: TileGraph::build(tiles, Gravity::Flipped),
        }
    }

    pub fn for_gravity(&self, gravity: Gravity) -> &TileGraph {
        match gravity {
            Gravity::Normal => &self.normal,
            Gravity::Flipped => &self.flipped,
        }
    }
}
