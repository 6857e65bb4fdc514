//! Render core configuration.

use serde::{Deserialize, Serialize};
use terravista_objects::ObjectConfig;
use terravista_render::CameraConfig;
use terravista_streaming::{AtlasConfig, StreamingConfig};
use terravista_terrain::{PatchGridConfig, VisibilityConfig};

/// Terrain geometry and culling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainRenderConfig {
    /// Patches further than this from the eye are culled.
    pub far_distance: f32,
    /// Quads per patch side; `None` picks from the heightmap size.
    pub patch_quads: Option<u32>,
    pub skirt_drop: f32,
}

impl Default for TerrainRenderConfig {
    fn default() -> Self {
        let grid = PatchGridConfig::default();
        Self {
            far_distance: VisibilityConfig::default().far_distance,
            patch_quads: grid.patch_quads,
            skirt_drop: grid.skirt_drop,
        }
    }
}

impl TerrainRenderConfig {
    pub fn patch_grid(&self) -> PatchGridConfig {
        PatchGridConfig {
            patch_quads: self.patch_quads,
            skirt_drop: self.skirt_drop,
        }
    }

    pub fn visibility(&self) -> VisibilityConfig {
        VisibilityConfig {
            far_distance: self.far_distance,
        }
    }
}

/// Everything the render core can be configured with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub terrain: TerrainRenderConfig,
    pub streaming: StreamingConfig,
    pub atlas: AtlasConfig,
    pub objects: ObjectConfig,
    pub camera: CameraConfig,
    /// Frames a dropped GPU resource stays alive for.
    pub frames_in_flight: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainRenderConfig::default(),
            streaming: StreamingConfig::default(),
            atlas: AtlasConfig::default(),
            objects: ObjectConfig::default(),
            camera: CameraConfig::default(),
            frames_in_flight: 2,
        }
    }
}

impl RenderConfig {
    /// Set the terrain culling distance.
    #[must_use]
    pub fn with_terrain_far_distance(mut self, far_distance: f32) -> Self {
        self.terrain.far_distance = far_distance;
        self
    }

    /// Force the patch size.
    #[must_use]
    pub fn with_patch_quads(mut self, patch_quads: u32) -> Self {
        self.terrain.patch_quads = Some(patch_quads);
        self
    }

    /// Set the number of tile loader threads.
    #[must_use]
    pub fn with_worker_count(mut self, workers: usize) -> Self {
        self.streaming.worker_count = Some(workers);
        self
    }

    /// Set the tile cache budget.
    #[must_use]
    pub fn with_tile_cache_budget(mut self, budget: usize) -> Self {
        self.streaming.cache_budget = budget;
        self
    }

    /// Set the object culling distance.
    #[must_use]
    pub fn with_object_far_distance(mut self, far_distance: f32) -> Self {
        self.objects.far_distance = far_distance;
        self
    }

    /// Set the model loads attempted per frame.
    #[must_use]
    pub fn with_model_loads_per_frame(mut self, loads: usize) -> Self {
        self.objects.max_loads_per_frame = loads;
        self
    }

    /// Set how many frames may be in flight on the GPU.
    #[must_use]
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn builders_reach_subsystems() {
        let config = RenderConfig::default()
            .with_terrain_far_distance(1000.0)
            .with_patch_quads(64)
            .with_worker_count(2)
            .with_tile_cache_budget(48)
            .with_object_far_distance(300.0)
            .with_model_loads_per_frame(3)
            .with_frames_in_flight(0);
        assert_relative_eq!(config.terrain.visibility().far_distance, 1000.0);
        assert_eq!(config.terrain.patch_grid().patch_quads, Some(64));
        assert_eq!(config.streaming.resolved_worker_count(), 2);
        assert_eq!(config.streaming.cache_budget, 48);
        assert_relative_eq!(config.objects.far_distance, 300.0);
        assert_eq!(config.objects.max_loads_per_frame, 3);
        assert_eq!(config.frames_in_flight, 1);
    }

    #[test]
    fn defaults_match_subsystems() {
        let config = RenderConfig::default();
        assert_relative_eq!(config.terrain.far_distance, 25_000.0);
        assert_eq!(config.terrain.patch_quads, None);
    }
}
