//! Per-tile texture source candidates.

use serde::{Deserialize, Serialize};
use terravista_core::TileIndex;

/// Candidate source paths for every tile, indexed by tile index.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TextureCatalog {
    tiles: Vec<Vec<String>>,
}

impl TextureCatalog {
    pub fn new(tiles: Vec<Vec<String>>) -> Self {
        Self { tiles }
    }

    /// Catalog where every tile in `0..tile_count` uses `pattern` with `{tile}`
    /// replaced by the tile index.
    pub fn from_pattern(tile_count: usize, pattern: &str) -> Self {
        Self {
            tiles: (0..tile_count)
                .map(|i| vec![pattern.replace("{tile}", &i.to_string())])
                .collect(),
        }
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Candidates for a tile; empty when the tile has none or is out of range.
    pub fn candidates(&self, tile: TileIndex) -> &[String] {
        self.tiles.get(tile.as_usize()).map_or(&[][..], Vec::as_slice)
    }

    pub fn set_candidates(&mut self, tile: TileIndex, candidates: Vec<String>) {
        let index = tile.as_usize();
        if index >= self.tiles.len() {
            self.tiles.resize(index + 1, Vec::new());
        }
        self.tiles[index] = candidates;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_and_lookup() {
        let mut catalog = TextureCatalog::from_pattern(3, "tiles/{tile}.png");
        assert_eq!(catalog.candidates(TileIndex(2)), ["tiles/2.png".to_string()]);
        assert!(catalog.candidates(TileIndex(9)).is_empty());

        catalog.set_candidates(TileIndex(5), vec!["x".into()]);
        assert_eq!(catalog.tile_count(), 6);
        assert!(catalog.candidates(TileIndex(4)).is_empty());
    }
}
