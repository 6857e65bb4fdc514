//! Messages exchanged with the tile workers.

use terravista_core::{Generation, TileIndex};

use crate::layers::TileLayers;

/// Request to resolve one tile.
#[derive(Clone, Debug)]
pub struct TileLoadJob {
    pub tile: TileIndex,
    /// World generation the job was issued for.
    pub generation: Generation,
    pub candidates: Vec<String>,
}

/// Outcome of a [`TileLoadJob`].
#[derive(Clone, Debug)]
pub struct TileLoadResult {
    pub tile: TileIndex,
    pub generation: Generation,
    pub layers: TileLayers,
    /// No source could be resolved; `layers` holds the checkerboard.
    pub missing: bool,
    /// `layers` came from a layered material bundle.
    pub layered: bool,
}

impl TileLoadResult {
    /// Placeholder result for a tile that failed to resolve.
    pub fn missing(tile: TileIndex, generation: Generation) -> Self {
        Self {
            tile,
            generation,
            layers: TileLayers::missing(),
            missing: true,
            layered: false,
        }
    }
}
