//! Mapping from terrain patches to material tiles.

use glam::Vec3;
use terravista_core::TileIndex;

use crate::patch_grid::PatchGrid;

/// Material tiles laid over the heightmap, `cells_per_tile` quads per side.
///
/// Tiles are usually coarser than patches, so one tile is shared by several patches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLayout {
    pub tiles_x: u32,
    pub tiles_z: u32,
    pub cells_per_tile: u32,
}

impl TileLayout {
    /// Layout covering a `width` x `height` sample heightmap.
    pub fn new(width: usize, height: usize, cells_per_tile: u32) -> Self {
        let cells_per_tile = cells_per_tile.max(1);
        let quads = |samples: usize| (samples.saturating_sub(1) as u32).max(1);
        Self {
            tiles_x: quads(width).div_ceil(cells_per_tile),
            tiles_z: quads(height).div_ceil(cells_per_tile),
            cells_per_tile,
        }
    }

    pub fn tile_count(&self) -> usize {
        (self.tiles_x * self.tiles_z) as usize
    }

    /// Tile containing a heightmap cell, clamped to the layout.
    pub fn tile_at(&self, cell_x: u32, cell_z: u32) -> TileIndex {
        let tx = (cell_x / self.cells_per_tile).min(self.tiles_x.saturating_sub(1));
        let tz = (cell_z / self.cells_per_tile).min(self.tiles_z.saturating_sub(1));
        TileIndex(tz * self.tiles_x + tx)
    }

    /// Tiles overlapped by the given patches, sorted and deduplicated.
    pub fn visible_tiles(&self, grid: &PatchGrid, visible_patches: &[usize]) -> Vec<TileIndex> {
        if self.tile_count() == 0 {
            return Vec::new();
        }
        let mut tiles = Vec::new();
        for patch in visible_patches.iter().filter_map(|&i| grid.patch(i)) {
            let (x0, z0) = patch.origin;
            let (qx, qz) = patch.covered_quads;
            // Covered quads span cells x0..x0+qx; the last cell index is one less.
            let x1 = x0 + qx.saturating_sub(1);
            let z1 = z0 + qz.saturating_sub(1);
            let first = self.tile_at(x0, z0);
            let last = self.tile_at(x1, z1);
            let (tx0, tz0) = (first.0 % self.tiles_x, first.0 / self.tiles_x);
            let (tx1, tz1) = (last.0 % self.tiles_x, last.0 / self.tiles_x);
            for tz in tz0..=tz1 {
                for tx in tx0..=tx1 {
                    tiles.push(TileIndex(tz * self.tiles_x + tx));
                }
            }
        }
        tiles.sort_unstable();
        tiles.dedup();
        tiles
    }

    /// World-space XZ center of a tile.
    pub fn tile_center(&self, tile: TileIndex, cell_size: f32) -> (f32, f32) {
        let tiles_x = self.tiles_x.max(1);
        let span = self.cells_per_tile as f32 * cell_size;
        let (tx, tz) = (tile.0 % tiles_x, tile.0 / tiles_x);
        ((tx as f32 + 0.5) * span, (tz as f32 + 0.5) * span)
    }

    /// Order tiles by horizontal distance from `eye`, nearest first.
    pub fn sort_nearest(&self, tiles: &mut [TileIndex], cell_size: f32, eye: Vec3) {
        tiles.sort_by(|&a, &b| {
            let dist = |tile| {
                let (x, z) = self.tile_center(tile, cell_size);
                (x - eye.x).powi(2) + (z - eye.z).powi(2)
            };
            dist(a).total_cmp(&dist(b)).then(a.cmp(&b))
        });
    }
}
