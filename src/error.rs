use thiserror::Error;

use crate::ai::state_machine::{EnemyState, StateRole};

/// Tile layer could not be read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LevelError {
    #[error("tile layer is empty")]
    Empty,
    #[error("tile layer has zero width")]
    ZeroWidth,
    #[error("unknown tile glyph '{glyph}' at column {column}, line {line}")]
    UnknownGlyph {
        glyph: char,
        column: usize,
        line: usize,
    },
}

/// A state reached a dispatch slot it has no behavior for. This is a
/// programming defect, never an input condition.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AiError {
    #[error("state {state:?} cannot run as the {role:?} state")]
    InvalidState { state: EnemyState, role: StateRole },
}

#[derive(Debug, Error)]
pub enum TuningError {
    #[error("malformed AI tuning: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("AI tuning field {field} must be positive")]
    NonPositive { field: &'static str },
}
