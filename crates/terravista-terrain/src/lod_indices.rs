//! Index buffers shared by every patch, one per LOD level.
//!
//! Vertex layout of a patch with `q` quads per side (`n = q + 1`):
//! - main grid: `n * n` vertices, row-major with X fastest
//! - skirts: four runs of `n` vertices for the north (z = 0), south (z = q),
//!   west (x = 0) and east (x = q) edges, in that order
//!
//! LOD `l` samples every `1 << l`-th vertex, so `q` must be divisible by
//! `1 << (TERRAIN_LOD_LEVELS - 1)`.

use terravista_core::constants::TERRAIN_LOD_LEVELS;
use terravista_gpu::{BufferUsage, GpuDevice, GpuResources, OwnedBuffer, RawBuffer};

/// Coarsest LOD step; patch sizes must be a multiple of it.
pub const MAX_LOD_STEP: u32 = 1 << (TERRAIN_LOD_LEVELS - 1);

const NORTH: u32 = 0;
const SOUTH: u32 = 1;
const WEST: u32 = 2;
const EAST: u32 = 3;

/// Edge vertex `k` of skirt run `edge`, paired with its lowered skirt copy.
fn skirt_pair(q: u32, edge: u32, k: u32) -> (u32, u32) {
    let n = q + 1;
    let main = match edge {
        NORTH => k,
        SOUTH => q * n + k,
        WEST => k * n,
        _ => k * n + q,
    };
    (main, n * n + edge * n + k)
}

/// Index list for one LOD level.
#[derive(Debug)]
pub struct LodIndexBuffer {
    pub lod: u8,
    /// Vertex stride in grid samples.
    pub step: u32,
    indices: Vec<u32>,
    buffer: Option<OwnedBuffer>,
}

impl LodIndexBuffer {
    fn build(patch_quads: u32, lod: u8) -> Self {
        let step = 1u32 << lod;
        let q = patch_quads;
        let n = q + 1;
        let cells = q / step;
        let mut indices = Vec::with_capacity((cells * cells * 6 + cells * 24) as usize);

        let main = |x: u32, z: u32| z * n + x;
        for z in (0..q).step_by(step as usize) {
            for x in (0..q).step_by(step as usize) {
                let a = main(x, z);
                let b = main(x + step, z);
                let c = main(x, z + step);
                let d = main(x + step, z + step);
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }

        // Wound so each skirt faces away from the patch.
        for k in (0..q).step_by(step as usize) {
            for edge in 0..4 {
                let (m0, s0) = skirt_pair(q, edge, k);
                let (m1, s1) = skirt_pair(q, edge, k + step);
                if edge == NORTH || edge == EAST {
                    indices.extend_from_slice(&[m0, m1, s0, m1, s1, s0]);
                } else {
                    indices.extend_from_slice(&[m0, s0, m1, m1, s0, s1]);
                }
            }
        }

        Self {
            lod,
            step,
            indices,
            buffer: None,
        }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Backend buffer, once uploaded.
    pub fn raw_buffer(&self) -> Option<RawBuffer> {
        self.buffer.as_ref().map(OwnedBuffer::raw)
    }
}

/// All LOD index buffers for one patch size. Built once per world and never mutated.
#[derive(Debug)]
pub struct LodIndexSet {
    patch_quads: u32,
    levels: Vec<LodIndexBuffer>,
}

impl LodIndexSet {
    pub fn new(patch_quads: u32) -> Self {
        debug_assert_eq!(patch_quads % MAX_LOD_STEP, 0);
        let levels = (0..TERRAIN_LOD_LEVELS as u8)
            .map(|lod| LodIndexBuffer::build(patch_quads, lod))
            .collect();
        Self {
            patch_quads,
            levels,
        }
    }

    pub fn patch_quads(&self) -> u32 {
        self.patch_quads
    }

    /// Vertices per patch, skirts included.
    pub fn vertices_per_patch(&self) -> usize {
        let n = self.patch_quads as usize + 1;
        n * n + 4 * n
    }

    pub fn level(&self, lod: u8) -> &LodIndexBuffer {
        &self.levels[usize::from(lod).min(self.levels.len() - 1)]
    }

    pub fn levels(&self) -> &[LodIndexBuffer] {
        &self.levels
    }

    pub fn is_uploaded(&self) -> bool {
        self.levels.iter().all(|level| level.buffer.is_some())
    }

    pub fn upload<D: GpuDevice>(&mut self, gpu: &mut GpuResources<D>) -> terravista_gpu::Result<()> {
        for level in &mut self.levels {
            let label = format!("terrain:lod{}", level.lod);
            let buffer = gpu.create_buffer(
                &label,
                BufferUsage::Index,
                bytemuck::cast_slice(&level.indices),
            )?;
            level.buffer = Some(buffer);
        }
        Ok(())
    }

    /// Drop the GPU copies; the arena releases them after in-flight frames retire.
    pub fn release(&mut self) {
        for level in &mut self.levels {
            level.buffer = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terravista_gpu::HeadlessDevice;

    #[test]
    fn index_counts_per_level() {
        let set = LodIndexSet::new(32);
        for level in set.levels() {
            let cells = 32 / level.step;
            assert_eq!(level.index_count(), cells * cells * 6 + cells * 4 * 6);
        }
        assert_eq!(set.level(0).step, 1);
        assert_eq!(set.level(4).step, 16);
    }

    #[test]
    fn indices_stay_inside_patch() {
        let set = LodIndexSet::new(64);
        let limit = set.vertices_per_patch() as u32;
        for level in set.levels() {
            assert!(level.indices().iter().all(|&i| i < limit));
            assert_eq!(level.indices().len() % 3, 0);
        }
    }

    #[test]
    fn coarse_levels_only_touch_coarse_vertices() {
        let set = LodIndexSet::new(32);
        let n = 33;
        let level = set.level(2);
        for &i in level.indices() {
            if i < n * n {
                assert_eq!((i % n) % 4, 0);
                assert_eq!((i / n) % 4, 0);
            }
        }
    }

    #[test]
    fn out_of_range_lod_clamps_to_coarsest() {
        let set = LodIndexSet::new(16);
        assert_eq!(set.level(9).lod, 4);
    }

    #[test]
    fn upload_and_release() {
        let mut gpu = GpuResources::new(HeadlessDevice::new(), 1);
        let mut set = LodIndexSet::new(32);
        set.upload(&mut gpu).unwrap();
        assert!(set.is_uploaded());
        assert_eq!(gpu.live_buffers(), TERRAIN_LOD_LEVELS);
        set.release();
        assert_eq!(gpu.flush(), TERRAIN_LOD_LEVELS);
    }
}
