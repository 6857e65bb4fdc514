//! Procedural heightmap generation.
//!
//! Real worlds come from the host's file loaders; this generator backs the
//! benchmarks, the fixtures and the demo world.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::heightmap::Heightmap;

/// Heightmap generator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightmapConfig {
    /// Seed for noise generation.
    pub seed: u32,
    /// Samples along X.
    pub width: usize,
    /// Samples along Z.
    pub height: usize,
    /// Horizontal scale of terrain features, in samples.
    pub terrain_scale: f64,
    /// Maximum terrain height variation.
    pub terrain_height: f64,
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Number of material classes, assigned by height band.
    pub material_classes: u16,
}

impl Default for HeightmapConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            width: 257,
            height: 257,
            terrain_scale: 100.0,
            terrain_height: 64.0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            material_classes: 4,
        }
    }
}

/// Fractal-noise heightmap generator.
pub struct HeightmapGenerator {
    config: HeightmapConfig,
    height_noise: Fbm<Perlin>,
}

impl HeightmapGenerator {
    pub fn new(config: HeightmapConfig) -> Self {
        let height_noise = Fbm::<Perlin>::new(config.seed)
            .set_octaves(config.octaves)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);

        Self {
            config,
            height_noise,
        }
    }

    /// Generator with default settings for a `width` x `height` map.
    pub fn with_size(seed: u32, width: usize, height: usize) -> Self {
        Self::new(HeightmapConfig {
            seed,
            width,
            height,
            ..Default::default()
        })
    }

    pub fn config(&self) -> &HeightmapConfig {
        &self.config
    }

    /// Terrain height at a sample coordinate.
    pub fn height_at(&self, x: usize, z: usize) -> f32 {
        let nx = x as f64 / self.config.terrain_scale;
        let nz = z as f64 / self.config.terrain_scale;

        // Noise returns [-1, 1], map to [0, terrain_height].
        let value = self.height_noise.get([nx, nz]).clamp(-1.0, 1.0);
        ((value + 1.0) * 0.5 * self.config.terrain_height) as f32
    }

    /// Generate the heightmap, one row per rayon task.
    pub fn generate(&self) -> Heightmap {
        let width = self.config.width;
        let mut heights = vec![0.0f32; width * self.config.height];
        if width > 0 {
            heights
                .par_chunks_mut(width)
                .enumerate()
                .for_each(|(z, row)| {
                    for (x, h) in row.iter_mut().enumerate() {
                        *h = self.height_at(x, z);
                    }
                });
        }
        Heightmap::from_parts(width, self.config.height, heights)
    }

    /// Material class per sample, banded by relative height.
    pub fn materials(&self, heightmap: &Heightmap) -> Vec<u16> {
        let classes = self.config.material_classes.max(1);
        let scale = self.config.terrain_height.max(f64::EPSILON) as f32;
        heightmap
            .samples()
            .iter()
            .map(|&h| {
                let t = (h / scale).clamp(0.0, 0.999_9);
                (t * f32::from(classes)) as u16
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic() {
        let a = HeightmapGenerator::with_size(7, 33, 17).generate();
        let b = HeightmapGenerator::with_size(7, 33, 17).generate();
        assert_eq!(a.width(), 33);
        assert_eq!(a.height(), 17);
        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn heights_stay_in_range() {
        let generator = HeightmapGenerator::with_size(3, 64, 64);
        let map = generator.generate();
        let (lo, hi) = map.range();
        assert!(lo >= 0.0);
        assert!(hi <= generator.config().terrain_height as f32);
    }

    #[test]
    fn materials_cover_every_sample() {
        let generator = HeightmapGenerator::with_size(11, 20, 10);
        let map = generator.generate();
        let materials = generator.materials(&map);
        assert_eq!(materials.len(), 200);
        assert!(materials.iter().all(|&m| m < 4));
    }
}
