//! Level tile layer loading and static level geometry.
//!
//! Parses ASCII tile layers into a [`TileLayer`] resource, spawns one static
//! collider per solid or hazardous cell, and moves the app into
//! [`AppState::InGame`] once the layer is ready.

use avian2d::prelude::*;
use bevy::prelude::*;
use micromegas_tracing::prelude::{error, info, span_scope};

use crate::ai::tile_graph::TileType;
use crate::ai::world::{ObstacleTag, TileLookup};
use crate::app_state::AppState;
use crate::components::TilePos;
use crate::error::LevelError;

pub struct LevelPlugin;

impl Plugin for LevelPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, load_level.run_if(in_state(AppState::Loading)));
        app.add_systems(OnExit(AppState::InGame), despawn_level);
    }
}

// ---------------------------------------------------------------------------
// Tile layer resource
// ---------------------------------------------------------------------------

/// ASCII source of the level to load.
#[derive(Resource, Debug, Clone)]
pub struct LevelSource(pub String);

/// Parsed tile grid. Row 0 is the bottom row so `y` grows upward like world
/// space.
#[derive(Resource, Debug, Clone, PartialEq)]
pub struct TileLayer {
    width: usize,
    height: usize,
    tiles: Vec<TileType>,
    hazards: Vec<TilePos>,
}

fn glyph(c: char) -> Option<(TileType, bool)> {
    match c {
        '#' => Some((TileType::NotWalkable, false)),
        '^' => Some((TileType::NotWalkable, true)),
        '.' => Some((TileType::Normal, false)),
        'f' => Some((TileType::Flipped, false)),
        '+' => Some((TileType::Both, false)),
        _ => None,
    }
}

impl TileLayer {
    /// Parse an ASCII layer. The first line is the top row. Short rows are
    /// padded with solid cells.
    pub fn parse(text: &str) -> Result<Self, LevelError> {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return Err(LevelError::Empty);
        }

        let height = lines.len();
        let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        if width == 0 {
            return Err(LevelError::ZeroWidth);
        }

        let mut tiles = vec![TileType::NotWalkable; width * height];
        let mut hazards = Vec::new();
        for (line_no, line) in lines.iter().enumerate() {
            let y = (height - 1 - line_no) as i32;
            for (column, ch) in line.chars().enumerate() {
                let (tile, hazard) = glyph(ch).ok_or(LevelError::UnknownGlyph {
                    glyph: ch,
                    column,
                    line: line_no,
                })?;
                tiles[y as usize * width + column] = tile;
                if hazard {
                    hazards.push(TilePos::new(column as i32, y));
                }
            }
        }

        Ok(TileLayer {
            width,
            height,
            tiles,
            hazards,
        })
    }

    /// Hazard cells in reading order.
    pub fn hazards(&self) -> &[TilePos] {
        &self.hazards
    }

    /// Solid cells that are not hazards, bottom row first.
    pub fn solid_tiles(&self) -> impl Iterator<Item = TilePos> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| TilePos::new(x, y)))
            .filter(|p| {
                self.tile_type(p.x, p.y) == TileType::NotWalkable && !self.hazards.contains(p)
            })
    }
}

impl TileLookup for TileLayer {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn tile_type(&self, x: i32, y: i32) -> TileType {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return TileType::NotWalkable;
        }
        self.tiles[y as usize * self.width + x as usize]
    }
}

// ---------------------------------------------------------------------------
// Marker components
// ---------------------------------------------------------------------------

/// Marker for entities that belong to the loaded level.
#[derive(Component, Debug)]
pub struct LevelEntity;

// ---------------------------------------------------------------------------
// Systems
// ---------------------------------------------------------------------------

/// Parse the pending level source (if any), spawn its colliders and enter
/// the game.
fn load_level(
    mut commands: Commands,
    source: Option<Res<LevelSource>>,
    mut next_state: ResMut<NextState<AppState>>,
) {
    span_scope!("level_load");
    let Some(source) = source else {
        return;
    };
    let layer = match TileLayer::parse(&source.0) {
        Ok(layer) => layer,
        Err(e) => {
            error!("failed to parse level: {}", e);
            commands.remove_resource::<LevelSource>();
            return;
        }
    };

    spawn_level_geometry(&mut commands, &layer);
    info!("level loaded ({}x{})", layer.width(), layer.height());
    commands.remove_resource::<LevelSource>();
    commands.insert_resource(layer);
    next_state.set(AppState::InGame);
}

/// One unit-square static collider per solid cell and per hazard.
pub fn spawn_level_geometry(commands: &mut Commands, layer: &TileLayer) {
    let hazards = layer.hazards().iter().map(|p| (*p, ObstacleTag::Hazard));
    let solids = layer.solid_tiles().map(|p| (p, ObstacleTag::None));
    for (pos, tag) in solids.chain(hazards) {
        let world = pos.to_world();
        commands.spawn((
            LevelEntity,
            pos,
            tag,
            RigidBody::Static,
            Collider::rectangle(1.0, 1.0),
            Transform::from_xyz(world.x, world.y, 0.0),
        ));
    }
}

fn despawn_level(mut commands: Commands, query: Query<Entity, With<LevelEntity>>) {
    for entity in &query {
        commands.entity(entity).despawn();
    }
    commands.remove_resource::<TileLayer>();
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_line_is_top_row() {
        let layer = TileLayer::parse("#.\n.f").unwrap();
        assert_eq!(layer.width(), 2);
        assert_eq!(layer.height(), 2);
        assert_eq!(layer.tile_type(0, 1), TileType::NotWalkable);
        assert_eq!(layer.tile_type(1, 1), TileType::Normal);
        assert_eq!(layer.tile_type(0, 0), TileType::Normal);
        assert_eq!(layer.tile_type(1, 0), TileType::Flipped);
    }

    #[test]
    fn outside_grid_is_not_walkable() {
        let layer = TileLayer::parse("++").unwrap();
        assert_eq!(layer.tile_type(-1, 0), TileType::NotWalkable);
        assert_eq!(layer.tile_type(2, 0), TileType::NotWalkable);
        assert_eq!(layer.tile_type(0, 1), TileType::NotWalkable);
    }

    #[test]
    fn short_rows_padded_with_solid() {
        let layer = TileLayer::parse("...\n.").unwrap();
        assert_eq!(layer.width(), 3);
        assert_eq!(layer.tile_type(0, 0), TileType::Normal);
        assert_eq!(layer.tile_type(2, 0), TileType::NotWalkable);
        assert_eq!(layer.solid_tiles().count(), 2);
    }

    #[test]
    fn hazards_are_solid_but_tracked_apart() {
        let layer = TileLayer::parse("..^#").unwrap();
        assert_eq!(layer.hazards(), &[TilePos::new(2, 0)]);
        assert_eq!(layer.tile_type(2, 0), TileType::NotWalkable);
        let solids: Vec<TilePos> = layer.solid_tiles().collect();
        assert_eq!(solids, vec![TilePos::new(3, 0)]);
    }

    #[test]
    fn parse_errors() {
        assert_eq!(TileLayer::parse(""), Err(LevelError::Empty));
        assert_eq!(TileLayer::parse("\n\n"), Err(LevelError::ZeroWidth));
        assert_eq!(
            TileLayer::parse("..\n.x"),
            Err(LevelError::UnknownGlyph {
                glyph: 'x',
                column: 1,
                line: 1
            })
        );
    }
}
