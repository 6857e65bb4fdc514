//! Placed objects for the Terravista renderer.
//!
//! Instances are bucketed in a uniform grid at world load. Every frame the
//! batcher gathers candidates near the camera, loads their models under a
//! per-frame budget, culls by distance and frustum, picks a LOD and groups the
//! survivors into instanced draws.

pub mod asset;
pub mod batcher;
pub mod config;
pub mod error;
pub mod instance;
pub mod lod;
pub mod model;
pub mod spatial;

pub use asset::{AssetState, AssetStats, GpuMeshGroup, ModelAssetCache, ObjectModelAsset};
pub use batcher::{marker_color, DrawBatch, ObjectBatcher, ObjectFrameStats, ObjectView};
pub use config::ObjectConfig;
pub use error::{ModelLoadError, Result};
pub use instance::{ObjectInstance, ObjectRecord, ObjectSet};
pub use lod::{DistanceLod, ScreenSpaceLod};
pub use model::{MeshGroup, ModelData, ModelLod, ModelResolver, ModelVertex};
pub use spatial::SpatialGrid;
