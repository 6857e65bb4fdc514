//! Per-frame statistics for status displays.

use std::fmt::Write as _;
use std::sync::Arc;

use parking_lot::RwLock;
use terravista_core::constants::TERRAIN_LOD_LEVELS;
use terravista_objects::{AssetStats, ObjectFrameStats};

/// What the last frame did.
///
/// Tile counters (`cache_hits` and on) are cumulative for the current world.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub frame: u64,
    pub frame_time_ms: f32,

    pub total_patches: usize,
    pub visible_patches: usize,
    pub patches_culled_distance: usize,
    pub patches_culled_frustum: usize,
    pub lod_histogram: [usize; TERRAIN_LOD_LEVELS],
    pub lod_changes: usize,

    pub visible_tiles: usize,
    pub tile_cache_size: usize,
    pub tile_cache_budget: usize,
    pub tiles_in_flight: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub jobs_enqueued: u64,
    pub results_accepted: u64,
    pub stale_results: u64,
    pub missing_tiles: u64,
    pub tile_evictions: u64,
    pub suppressed_logs: u64,
    pub atlas_rebuilds: u64,
    pub atlases_bound: usize,

    pub objects: ObjectFrameStats,
    pub assets: AssetStats,

    pub terrain_draw_calls: usize,
    pub instanced_draw_calls: usize,
    pub draw_calls: usize,
}

impl FrameStats {
    /// Multi-line summary for debug overlays.
    pub fn debug_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "frame {} ({:.2} ms), {} draw calls ({} terrain, {} instanced)",
            self.frame,
            self.frame_time_ms,
            self.draw_calls,
            self.terrain_draw_calls,
            self.instanced_draw_calls
        );
        let _ = writeln!(
            out,
            "terrain: {}/{} patches (culled {} distance, {} frustum), lod {:?}, {} lod changes",
            self.visible_patches,
            self.total_patches,
            self.patches_culled_distance,
            self.patches_culled_frustum,
            self.lod_histogram,
            self.lod_changes
        );
        let _ = writeln!(
            out,
            "tiles: {} visible, cache {}/{}, {} in flight, hits {} misses {}, {} jobs, {} stale, {} missing, {} evicted",
            self.visible_tiles,
            self.tile_cache_size,
            self.tile_cache_budget,
            self.tiles_in_flight,
            self.cache_hits,
            self.cache_misses,
            self.jobs_enqueued,
            self.stale_results,
            self.missing_tiles,
            self.tile_evictions
        );
        let _ = writeln!(
            out,
            "atlas: {} rebuilds, {} bound",
            self.atlas_rebuilds, self.atlases_bound
        );
        let o = &self.objects;
        let _ = write!(
            out,
            "objects: {} candidates, {} visible, {} markers, {} batches ({} instances), culled {}/{}/{} category/distance/frustum; models {} ready, {} failed, {} evicted",
            o.candidates,
            o.visible,
            o.markers,
            o.batches,
            o.instances,
            o.culled_category,
            o.culled_distance,
            o.culled_frustum,
            self.assets.ready,
            self.assets.failed,
            self.assets.evicted
        );
        out
    }
}

/// Shared, read-mostly view of the latest [`FrameStats`].
///
/// Cloned handles can be read from any thread while the render thread publishes.
#[derive(Clone, Debug, Default)]
pub struct StatsHandle(Arc<RwLock<FrameStats>>);

impl StatsHandle {
    pub fn snapshot(&self) -> FrameStats {
        self.0.read().clone()
    }

    pub(crate) fn publish(&self, stats: &FrameStats) {
        self.0.write().clone_from(stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_mentions_every_subsystem() {
        let stats = FrameStats {
            frame: 7,
            visible_patches: 12,
            total_patches: 16,
            ..FrameStats::default()
        };
        let summary = stats.debug_summary();
        assert!(summary.starts_with("frame 7"));
        assert!(summary.contains("12/16 patches"));
        for section in ["terrain:", "tiles:", "atlas:", "objects:"] {
            assert!(summary.contains(section), "missing {section}");
        }
    }

    #[test]
    fn handles_share_published_stats() {
        let handle = StatsHandle::default();
        let reader = handle.clone();
        let stats = FrameStats {
            frame: 3,
            ..FrameStats::default()
        };
        handle.publish(&stats);
        let seen = std::thread::spawn(move || reader.snapshot().frame)
            .join()
            .unwrap();
        assert_eq!(seen, 3);
    }
}
