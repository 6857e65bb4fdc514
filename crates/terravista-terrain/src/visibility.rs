//! Per-frame patch culling and LOD selection.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use terravista_core::constants::{TERRAIN_LOD_BREAKPOINTS, TERRAIN_LOD_LEVELS};
use terravista_core::Frustum;

use crate::patch_grid::PatchGrid;

/// Terrain visibility settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisibilityConfig {
    /// Patches whose center is further than this from the eye are culled.
    pub far_distance: f32,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            far_distance: 25_000.0,
        }
    }
}

/// Distance breakpoints between consecutive LOD levels, plus the hysteresis band.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodThresholds {
    pub breakpoints: [f32; TERRAIN_LOD_BREAKPOINTS],
    pub hysteresis: f32,
}

impl LodThresholds {
    /// Thresholds scaled from the world-space span of a patch.
    ///
    /// The first breakpoint is `max(220, span * 1.25)` and each further one
    /// doubles; the hysteresis band is `max(30, span * 0.2)`.
    pub fn for_patch_span(span: f32) -> Self {
        let base = (span * 1.25).max(220.0);
        let mut breakpoints = [0.0; TERRAIN_LOD_BREAKPOINTS];
        let mut value = base;
        for breakpoint in &mut breakpoints {
            *breakpoint = value;
            value *= 2.0;
        }
        Self {
            breakpoints,
            hysteresis: (span * 0.2).max(30.0),
        }
    }

    /// LOD for a patch at `distance`, given the LOD it currently renders at.
    ///
    /// Escalates past `breakpoint + hysteresis` and de-escalates below
    /// `breakpoint - hysteresis`; inside the band the current level is kept.
    pub fn select(&self, current: u8, distance: f32) -> u8 {
        let mut lod = usize::from(current).min(TERRAIN_LOD_LEVELS - 1);
        while lod < TERRAIN_LOD_BREAKPOINTS && distance > self.breakpoints[lod] + self.hysteresis {
            lod += 1;
        }
        while lod > 0 && distance < self.breakpoints[lod - 1] - self.hysteresis {
            lod -= 1;
        }
        lod as u8
    }
}

/// Counters from the last visibility update.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VisibilityStats {
    pub tested: usize,
    pub visible: usize,
    pub culled_distance: usize,
    pub culled_frustum: usize,
    pub lod_changes: usize,
    pub lod_histogram: [usize; TERRAIN_LOD_LEVELS],
}

/// Decides each frame which patches render and at what LOD.
#[derive(Debug)]
pub struct PatchVisibility {
    config: VisibilityConfig,
    thresholds: LodThresholds,
    visible: Vec<usize>,
    stats: VisibilityStats,
}

impl PatchVisibility {
    pub fn new(config: VisibilityConfig, patch_span: f32) -> Self {
        Self {
            config,
            thresholds: LodThresholds::for_patch_span(patch_span),
            visible: Vec::new(),
            stats: VisibilityStats::default(),
        }
    }

    /// Visibility with thresholds matching a built grid.
    pub fn for_grid(config: VisibilityConfig, grid: &PatchGrid) -> Self {
        Self::new(config, grid.patch_span())
    }

    pub fn thresholds(&self) -> &LodThresholds {
        &self.thresholds
    }

    pub fn far_distance(&self) -> f32 {
        self.config.far_distance
    }

    pub fn set_far_distance(&mut self, far_distance: f32) {
        self.config.far_distance = far_distance.max(0.0);
    }

    /// Indices of the patches that passed the last update, in grid order.
    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    pub fn stats(&self) -> &VisibilityStats {
        &self.stats
    }

    /// Cull every patch against the camera and update the LOD of visible ones.
    pub fn update(&mut self, grid: &mut PatchGrid, view_projection: Mat4, eye: Vec3) -> &[usize] {
        let frustum = Frustum::from_view_projection(view_projection);
        let far_sq = self.config.far_distance * self.config.far_distance;
        let mut stats = VisibilityStats {
            tested: grid.len(),
            ..Default::default()
        };
        self.visible.clear();

        for (index, patch) in grid.patches_mut().iter_mut().enumerate() {
            let distance_sq = patch.center.distance_squared(eye);
            if distance_sq > far_sq {
                stats.culled_distance += 1;
                continue;
            }
            if !frustum.test_aabb(&patch.aabb) {
                stats.culled_frustum += 1;
                continue;
            }

            let lod = self.thresholds.select(patch.current_lod, distance_sq.sqrt());
            if lod != patch.current_lod {
                stats.lod_changes += 1;
                patch.current_lod = lod;
            }
            stats.lod_histogram[usize::from(lod)] += 1;
            self.visible.push(index);
        }

        stats.visible = self.visible.len();
        self.stats = stats;
        &self.visible
    }

    /// One-line summary for debug overlays.
    pub fn summary(&self) -> String {
        let s = &self.stats;
        format!(
            "terrain: {}/{} patches visible (dist-culled {}, frustum-culled {}), lod {:?}",
            s.visible, s.tested, s.culled_distance, s.culled_frustum, s.lod_histogram
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heightmap::Heightmap;
    use crate::patch_grid::PatchGridConfig;
    use approx::assert_relative_eq;

    fn top_down(eye: Vec3, target: Vec3) -> Mat4 {
        let view = Mat4::look_at_rh(eye, target, Vec3::NEG_Z);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 1.0, 10_000.0);
        proj * view
    }

    #[test]
    fn thresholds_scale_with_span() {
        let small = LodThresholds::for_patch_span(32.0);
        assert_relative_eq!(small.breakpoints[0], 220.0);
        assert_relative_eq!(small.breakpoints[3], 1760.0);
        assert_relative_eq!(small.hysteresis, 30.0);

        let large = LodThresholds::for_patch_span(512.0);
        assert_relative_eq!(large.breakpoints[0], 640.0);
        assert_relative_eq!(large.breakpoints[1], 1280.0);
        assert_relative_eq!(large.hysteresis, 102.4, epsilon = 1e-3);
    }

    #[test]
    fn lod_holds_inside_hysteresis_band() {
        let t = LodThresholds::for_patch_span(32.0);
        // Breakpoint 220, band 190..250.
        assert_eq!(t.select(0, 249.0), 0);
        assert_eq!(t.select(0, 251.0), 1);
        assert_eq!(t.select(1, 191.0), 1);
        assert_eq!(t.select(1, 189.0), 0);

        // Jitter around the breakpoint never flips the level.
        let mut lod = 0;
        for i in 0..100 {
            let distance = 220.0 + if i % 2 == 0 { 25.0 } else { -25.0 };
            lod = t.select(lod, distance);
            assert_eq!(lod, 0);
        }
    }

    #[test]
    fn lod_is_monotonic_with_distance() {
        let t = LodThresholds::for_patch_span(64.0);
        let mut lod = 0;
        let mut previous = 0;
        for step in 0..400 {
            lod = t.select(lod, step as f32 * 10.0);
            assert!(lod >= previous);
            previous = lod;
        }
        assert_eq!(lod, 4);
        // Far beyond every breakpoint a jump lands on the coarsest level at once.
        assert_eq!(t.select(0, 1.0e6), 4);
        assert_eq!(t.select(4, 0.0), 0);
    }

    #[test]
    fn whole_terrain_visible_from_above() {
        let map = Heightmap::flat(1024, 1024, 0.0);
        let config = PatchGridConfig {
            patch_quads: Some(64),
            ..Default::default()
        };
        let mut grid = PatchGrid::build(&map, &[], 1.0, &config);
        assert_eq!(grid.len(), 256);

        let mut visibility = PatchVisibility::for_grid(VisibilityConfig::default(), &grid);
        let center = Vec3::new(511.5, 0.0, 511.5);
        let eye = center + Vec3::Y * 3000.0;
        let visible = visibility.update(&mut grid, top_down(eye, center), eye).len();
        assert_eq!(visible, 256);
        assert_eq!(visibility.stats().culled_distance, 0);
        assert_eq!(visibility.stats().culled_frustum, 0);
    }

    #[test]
    fn far_distance_and_frustum_cull() {
        let map = Heightmap::flat(257, 257, 0.0);
        let config = PatchGridConfig {
            patch_quads: Some(32),
            ..Default::default()
        };
        let mut grid = PatchGrid::build(&map, &[], 1.0, &config);
        let mut visibility = PatchVisibility::for_grid(VisibilityConfig { far_distance: 100.0 }, &grid);

        // Looking down on the corner from low altitude: distance limits the set.
        let eye = Vec3::new(16.0, 50.0, 16.0);
        visibility.update(&mut grid, top_down(eye, Vec3::new(16.0, 0.0, 16.0)), eye);
        assert!(visibility.visible().contains(&0));
        assert!(visibility.stats().culled_distance > 0);
        assert_eq!(
            visibility.stats().visible
                + visibility.stats().culled_distance
                + visibility.stats().culled_frustum,
            64
        );

        // Looking away from the terrain: everything fails the frustum test.
        visibility.set_far_distance(25_000.0);
        let eye = Vec3::new(128.0, 500.0, 128.0);
        let view = Mat4::look_at_rh(eye, eye + Vec3::Y, Vec3::Z);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 1.0, 10_000.0);
        visibility.update(&mut grid, proj * view, eye);
        assert!(visibility.visible().is_empty());
        assert_eq!(visibility.stats().culled_frustum, 64);
    }

    #[test]
    fn update_writes_lod_back() {
        let map = Heightmap::flat(257, 257, 0.0);
        let mut grid = PatchGrid::build(&map, &[], 8.0, &PatchGridConfig::default());
        let mut visibility = PatchVisibility::for_grid(VisibilityConfig::default(), &grid);
        let center = grid.bounds().center();
        let eye = center + Vec3::Y * 4000.0;
        visibility.update(&mut grid, top_down(eye, center), eye);
        assert!(visibility.stats().lod_changes > 0);
        assert!(grid.patches().iter().all(|p| p.current_lod > 0));
    }
}
