use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, States)]
pub enum AppState {
    /// Waiting for a level source to be parsed.
    #[default]
    Loading,
    InGame,
}
