//! World data handed to the render core.

use terravista_objects::ObjectRecord;
use terravista_streaming::TextureCatalog;
use terravista_terrain::{Heightmap, HeightmapConfig, HeightmapGenerator, TileLayout};
use tracing::info;

/// Everything the render core needs to show one world.
#[derive(Debug, Clone)]
pub struct WorldData {
    /// `None` renders no terrain.
    pub heightmap: Option<Heightmap>,
    /// Material class per heightmap sample.
    pub material_indices: Vec<u16>,
    /// World units between heightmap samples.
    pub cell_size: f32,
    /// Heightmap cells per material tile side.
    pub cells_per_tile: u32,
    /// Texture candidates per tile.
    pub catalog: TextureCatalog,
    pub objects: Vec<ObjectRecord>,
}

impl Default for WorldData {
    fn default() -> Self {
        Self {
            heightmap: None,
            material_indices: Vec::new(),
            cell_size: 1.0,
            cells_per_tile: 64,
            catalog: TextureCatalog::default(),
            objects: Vec::new(),
        }
    }
}

impl WorldData {
    /// A world with only a heightmap.
    pub fn from_heightmap(heightmap: Heightmap, cell_size: f32) -> Self {
        Self {
            heightmap: Some(heightmap),
            cell_size,
            ..Self::default()
        }
    }

    /// Noise terrain with material classes and an empty texture catalog, so
    /// every tile shows the placeholder.
    pub fn procedural(config: HeightmapConfig, cell_size: f32, cells_per_tile: u32) -> Self {
        let generator = HeightmapGenerator::new(config);
        let heightmap = generator.generate();
        let material_indices = generator.materials(&heightmap);
        let layout = TileLayout::new(heightmap.width(), heightmap.height(), cells_per_tile);
        info!(
            "Generated {}x{} heightmap with {} tiles",
            heightmap.width(),
            heightmap.height(),
            layout.tile_count()
        );
        Self {
            heightmap: Some(heightmap),
            material_indices,
            cell_size,
            cells_per_tile,
            catalog: TextureCatalog::new(vec![Vec::new(); layout.tile_count()]),
            objects: Vec::new(),
        }
    }

    /// Tile layout over the heightmap, if there is one.
    pub fn tile_layout(&self) -> Option<TileLayout> {
        self.heightmap
            .as_ref()
            .map(|h| TileLayout::new(h.width(), h.height(), self.cells_per_tile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn procedural_world_covers_every_tile() {
        let config = HeightmapConfig {
            width: 129,
            height: 65,
            ..HeightmapConfig::default()
        };
        let world = WorldData::procedural(config, 2.0, 32);
        let layout = world.tile_layout().unwrap();
        assert_eq!((layout.tiles_x, layout.tiles_z), (4, 2));
        assert_eq!(world.catalog.tile_count(), 8);
        assert_eq!(world.material_indices.len(), 129 * 65);
    }

    #[test]
    fn empty_world_has_no_layout() {
        assert!(WorldData::default().tile_layout().is_none());
    }
}
