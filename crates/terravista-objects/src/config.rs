//! Object rendering settings.

use serde::{Deserialize, Serialize};
use terravista_core::{CategoryMask, ObjectCategory};

/// Object culling, LOD and streaming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    /// Base culling distance, scaled per category.
    pub far_distance: f32,
    /// Distance multiplier per category, indexed by [`ObjectCategory::index`].
    pub category_multipliers: [f32; 4],
    /// Categories that render at all.
    pub enabled: CategoryMask,
    /// Model loads attempted per frame.
    pub max_loads_per_frame: usize,
    /// Ready models kept before LRU eviction.
    pub asset_budget: usize,
    /// Projected radius in pixels below which each coarser LOD is used.
    pub screen_lod_thresholds: [f32; 4],
    /// Fraction of `far_distance` at which each coarser LOD is used when the
    /// model radius is unknown.
    pub distance_lod_fractions: [f32; 4],
    /// Relative width of the LOD hysteresis band.
    pub lod_hysteresis: f32,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            far_distance: 2_000.0,
            category_multipliers: [1.0, 0.6, 0.8, 0.5],
            enabled: CategoryMask::all(),
            max_loads_per_frame: 2,
            asset_budget: 128,
            screen_lod_thresholds: [120.0, 48.0, 20.0, 8.0],
            distance_lod_fractions: [0.15, 0.3, 0.5, 0.75],
            lod_hysteresis: 0.1,
        }
    }
}

impl ObjectConfig {
    /// Culling distance for a category.
    pub fn max_distance(&self, category: ObjectCategory) -> f32 {
        self.far_distance * self.category_multipliers[category.index()]
    }

    /// Largest culling distance over the enabled categories.
    pub fn max_query_distance(&self) -> f32 {
        ObjectCategory::ALL
            .iter()
            .filter(|c| self.enabled.allows(**c))
            .map(|c| self.max_distance(*c))
            .fold(0.0, f32::max)
    }

    pub fn set_category_enabled(&mut self, category: ObjectCategory, enabled: bool) {
        self.enabled.set(category.mask(), enabled);
    }
}
