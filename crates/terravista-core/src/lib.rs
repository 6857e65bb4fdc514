//! Core types, math, and diagnostics for the Terravista terrain renderer.
//!
//! This crate provides the foundational types shared by every subsystem:
//! - Bounding volumes and frustum culling
//! - Tile, model and generation identifiers
//! - Placed-object categories and toggle masks
//! - The engine error type and a once-per-key log throttle

pub mod diagnostics;
pub mod error;
pub mod math;
pub mod types;

pub use diagnostics::LogThrottle;
pub use error::{Error, Result};
pub use math::{Aabb, BoundingSphere, Frustum};
pub use types::{CategoryMask, Generation, ModelId, ObjectCategory, TileIndex};

/// Engine-wide constants
pub mod constants {
    /// Number of discrete terrain LOD levels.
    pub const TERRAIN_LOD_LEVELS: usize = 5;
    /// Number of distance breakpoints separating the terrain LOD levels.
    pub const TERRAIN_LOD_BREAKPOINTS: usize = TERRAIN_LOD_LEVELS - 1;
    /// Patch size (in quads) used for small heightmaps.
    pub const PATCH_QUADS_SMALL: u32 = 32;
    /// Patch size (in quads) used once the heightmap reaches `LARGE_HEIGHTMAP_EXTENT`.
    pub const PATCH_QUADS_LARGE: u32 = 64;
    /// Heightmap extent (samples per axis) from which large patches are used.
    pub const LARGE_HEIGHTMAP_EXTENT: usize = 1024;
    /// Maximum number of surface triples in a layered material.
    pub const MAX_SURFACES: usize = 4;
}
