//! Object LOD selection.
//!
//! Both selectors keep the current level while the measure sits inside a
//! hysteresis band around a threshold.

/// LOD from the projected screen radius of the bounding sphere.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenSpaceLod {
    /// Descending pixel radii; below `thresholds[i]` the instance uses LOD `i + 1`.
    pub thresholds: [f32; 4],
    /// Relative band width around each threshold.
    pub hysteresis: f32,
}

impl ScreenSpaceLod {
    /// Projected radius in pixels of a sphere at `distance`.
    pub fn projected_radius(radius: f32, distance: f32, fov_y: f32, viewport_height: f32) -> f32 {
        let distance = distance.max(1.0e-3);
        radius / (distance * (fov_y * 0.5).tan()) * (viewport_height * 0.5)
    }

    /// New LOD for an instance covering `pixels`, limited to `lod_count` levels.
    pub fn select(&self, current: u8, pixels: f32, lod_count: usize) -> u8 {
        let max = lod_count.clamp(1, self.thresholds.len() + 1) - 1;
        let mut lod = usize::from(current).min(max);
        while lod < max && pixels < self.thresholds[lod] * (1.0 - self.hysteresis) {
            lod += 1;
        }
        while lod > 0 && pixels > self.thresholds[lod - 1] * (1.0 + self.hysteresis) {
            lod -= 1;
        }
        lod as u8
    }
}

/// LOD from camera distance, used while a model's true radius is unknown.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceLod {
    /// Ascending distances; beyond `breakpoints[i]` the instance uses LOD `i + 1`.
    pub breakpoints: [f32; 4],
    pub hysteresis: f32,
}

impl DistanceLod {
    /// Breakpoints at fractions of the culling distance.
    pub fn from_fractions(max_distance: f32, fractions: [f32; 4], hysteresis: f32) -> Self {
        Self {
            breakpoints: fractions.map(|f| f * max_distance),
            hysteresis: hysteresis * max_distance * fractions[0],
        }
    }

    pub fn select(&self, current: u8, distance: f32, lod_count: usize) -> u8 {
        let max = lod_count.clamp(1, self.breakpoints.len() + 1) - 1;
        let mut lod = usize::from(current).min(max);
        while lod < max && distance > self.breakpoints[lod] + self.hysteresis {
            lod += 1;
        }
        while lod > 0 && distance < self.breakpoints[lod - 1] - self.hysteresis {
            lod -= 1;
        }
        lod as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn projected_radius_shrinks_with_distance() {
        let fov = 90f32.to_radians();
        assert_relative_eq!(ScreenSpaceLod::projected_radius(10.0, 10.0, fov, 1000.0), 500.0, epsilon = 1e-3);
        assert_relative_eq!(ScreenSpaceLod::projected_radius(10.0, 100.0, fov, 1000.0), 50.0, epsilon = 1e-3);
    }

    #[test]
    fn screen_lod_has_hysteresis() {
        let lod = ScreenSpaceLod {
            thresholds: [100.0, 40.0, 16.0, 6.0],
            hysteresis: 0.1,
        };
        assert_eq!(lod.select(0, 95.0, 5), 0);
        assert_eq!(lod.select(0, 89.0, 5), 1);
        assert_eq!(lod.select(1, 105.0, 5), 1);
        assert_eq!(lod.select(1, 111.0, 5), 0);
        assert_eq!(lod.select(0, 1.0, 5), 4);
        // A model with two LODs never goes past LOD 1.
        assert_eq!(lod.select(0, 1.0, 2), 1);
        assert_eq!(lod.select(3, 1.0, 1), 0);
    }

    #[test]
    fn distance_lod_has_hysteresis() {
        let lod = DistanceLod::from_fractions(1000.0, [0.15, 0.3, 0.5, 0.75], 0.1);
        assert_relative_eq!(lod.breakpoints[0], 150.0);
        assert_relative_eq!(lod.hysteresis, 15.0);
        assert_eq!(lod.select(0, 160.0, 5), 0);
        assert_eq!(lod.select(0, 170.0, 5), 1);
        assert_eq!(lod.select(1, 140.0, 5), 1);
        assert_eq!(lod.select(1, 130.0, 5), 0);
        assert_eq!(lod.select(0, 900.0, 5), 4);
    }
}
