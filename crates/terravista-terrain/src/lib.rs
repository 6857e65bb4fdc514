//! Heightmap terrain for the Terravista renderer.
//!
//! The heightmap is split into fixed-size patches. Every patch owns one vertex
//! buffer; index buffers are shared per LOD level. Each frame the visibility
//! pass culls patches against the camera and picks a LOD with hysteresis.

pub mod generation;
pub mod heightmap;
pub mod lod_indices;
pub mod patch;
pub mod patch_grid;
pub mod tiles;
pub mod visibility;

pub use generation::{HeightmapConfig, HeightmapGenerator};
pub use heightmap::Heightmap;
pub use lod_indices::{LodIndexBuffer, LodIndexSet};
pub use patch::{PatchVertex, TerrainPatch};
pub use patch_grid::{PatchEdge, PatchGrid, PatchGridConfig};
pub use tiles::TileLayout;
pub use visibility::{LodThresholds, PatchVisibility, VisibilityConfig};
