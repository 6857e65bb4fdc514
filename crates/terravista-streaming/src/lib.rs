//! Terrain material streaming for the Terravista renderer.
//!
//! Visible tiles are resolved by a fixed pool of worker threads; the render
//! thread drains a bounded number of results per frame into an LRU cache and
//! packs the cached layers into per-role atlases.

pub mod atlas;
pub mod cache;
pub mod catalog;
pub mod job;
pub mod layers;
pub mod resolver;
pub mod streamer;
pub mod worker;

pub use atlas::{
    AtlasConfig, AtlasPacker, AtlasRebuildScheduler, AtlasRole, AtlasSet, PackedRect, RoleAtlas,
    ShelfPacker, SurfaceLayer, TileLookupTable, ATLAS_ROLE_COUNT, LOOKUP_ROWS,
};
pub use cache::{CachedTileTexture, TileCache};
pub use catalog::TextureCatalog;
pub use job::{TileLoadJob, TileLoadResult};
pub use layers::{checkerboard, SurfaceLayers, TileLayers};
pub use resolver::{FsTextureResolver, ResolveError, ResolvedTexture, TextureResolver};
pub use streamer::{StreamerStats, StreamingConfig, TileTextureStreamer};
pub use worker::{default_worker_count, TileWorkerPool};
