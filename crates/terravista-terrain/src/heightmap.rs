//! Heightmap input.

use terravista_core::{Error, Result};

/// Row-major grid of height samples, `width` samples along X and `height` along Z.
#[derive(Debug, Clone, Default)]
pub struct Heightmap {
    width: usize,
    height: usize,
    heights: Vec<f32>,
}

impl Heightmap {
    /// Wrap height samples, checking the sample count.
    pub fn new(width: usize, height: usize, heights: Vec<f32>) -> Result<Self> {
        if heights.len() != width * height {
            return Err(Error::InvalidData(format!(
                "heightmap {width}x{height} needs {} samples, got {}",
                width * height,
                heights.len()
            )));
        }
        Ok(Self {
            width,
            height,
            heights,
        })
    }

    pub(crate) fn from_parts(width: usize, height: usize, heights: Vec<f32>) -> Self {
        debug_assert_eq!(heights.len(), width * height);
        Self {
            width,
            height,
            heights,
        }
    }

    /// A heightmap where every sample is `value`.
    pub fn flat(width: usize, height: usize, value: f32) -> Self {
        Self {
            width,
            height,
            heights: vec![value; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples(&self) -> &[f32] {
        &self.heights
    }

    /// A heightmap needs at least 2x2 samples to form a single quad.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 1 || self.height <= 1
    }

    /// Height at a sample, with coordinates clamped to the grid.
    #[inline]
    pub fn sample_clamped(&self, x: i64, z: i64) -> f32 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let z = z.clamp(0, self.height as i64 - 1) as usize;
        self.heights[z * self.width + x]
    }

    /// Lowest and highest sample.
    pub fn range(&self) -> (f32, f32) {
        self.heights
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }
}
