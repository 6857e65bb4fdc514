//! Partitioning of the heightmap into drawable patches.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use terravista_core::constants::{LARGE_HEIGHTMAP_EXTENT, PATCH_QUADS_LARGE, PATCH_QUADS_SMALL};
use terravista_core::Aabb;
use terravista_gpu::{BufferUsage, GpuDevice, GpuResources, PatchDraw};
use tracing::{debug, error, info, warn};

use crate::heightmap::Heightmap;
use crate::lod_indices::{LodIndexSet, MAX_LOD_STEP};
use crate::patch::{PatchVertex, TerrainPatch};

/// Satellite palette indexed by material class.
const SATELLITE_PALETTE: [[u8; 3]; 8] = [
    [96, 128, 64],
    [120, 104, 72],
    [140, 136, 128],
    [224, 224, 232],
    [72, 104, 56],
    [176, 160, 112],
    [88, 88, 96],
    [64, 96, 128],
];

/// Patch grid build settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchGridConfig {
    /// Quads per patch side. `None` picks 64 for heightmaps of at least
    /// 1024 samples along an axis and 32 otherwise.
    pub patch_quads: Option<u32>,
    /// How far skirt vertices drop below the patch edge, in world units.
    pub skirt_drop: f32,
}

impl Default for PatchGridConfig {
    fn default() -> Self {
        Self {
            patch_quads: None,
            skirt_drop: 8.0,
        }
    }
}

impl PatchGridConfig {
    /// Patch size for a heightmap, rounded up to a multiple of the coarsest LOD step.
    pub fn patch_quads_for(&self, heightmap: &Heightmap) -> u32 {
        let quads = self.patch_quads.unwrap_or_else(|| {
            if heightmap.width().max(heightmap.height()) >= LARGE_HEIGHTMAP_EXTENT {
                PATCH_QUADS_LARGE
            } else {
                PATCH_QUADS_SMALL
            }
        });
        quads.max(MAX_LOD_STEP).div_ceil(MAX_LOD_STEP) * MAX_LOD_STEP
    }
}

/// One side of a patch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchEdge {
    /// z = 0
    North,
    /// z = patch_quads
    South,
    /// x = 0
    West,
    /// x = patch_quads
    East,
}

impl PatchEdge {
    pub const ALL: [Self; 4] = [Self::North, Self::South, Self::West, Self::East];

    /// Local vertex coordinate of the `k`-th vertex along this edge.
    const fn local(self, q: u32, k: u32) -> (u32, u32) {
        match self {
            Self::North => (k, 0),
            Self::South => (k, q),
            Self::West => (0, k),
            Self::East => (q, k),
        }
    }
}

/// Drawable terrain: patches plus the shared per-LOD index buffers.
#[derive(Debug)]
pub struct PatchGrid {
    patches: Vec<TerrainPatch>,
    lod_indices: Option<LodIndexSet>,
    patch_quads: u32,
    patches_x: u32,
    patches_z: u32,
    cell_size: f32,
    bounds: Aabb,
}

impl Default for PatchGrid {
    fn default() -> Self {
        Self::empty()
    }
}

impl PatchGrid {
    /// A grid with no patches; terrain renders nothing.
    pub fn empty() -> Self {
        Self {
            patches: Vec::new(),
            lod_indices: None,
            patch_quads: 0,
            patches_x: 0,
            patches_z: 0,
            cell_size: 1.0,
            bounds: Aabb::EMPTY,
        }
    }

    /// Build patch geometry from a heightmap and its per-sample material classes.
    ///
    /// A degenerate heightmap (either side of at most one sample) yields an empty grid.
    pub fn build(
        heightmap: &Heightmap,
        material_indices: &[u16],
        cell_size: f32,
        config: &PatchGridConfig,
    ) -> Self {
        if heightmap.is_degenerate() {
            warn!(
                "Heightmap {}x{} is degenerate, terrain will not render",
                heightmap.width(),
                heightmap.height()
            );
            return Self::empty();
        }

        let cell_size = if cell_size > 0.0 && cell_size.is_finite() {
            cell_size
        } else {
            warn!("Invalid cell size {cell_size}, using 1.0");
            1.0
        };

        let sample_count = heightmap.width() * heightmap.height();
        let materials = if material_indices.len() == sample_count {
            Some(material_indices)
        } else {
            if !material_indices.is_empty() {
                warn!(
                    "Material grid has {} entries, heightmap has {sample_count} samples; ignoring it",
                    material_indices.len()
                );
            }
            None
        };

        let q = config.patch_quads_for(heightmap);
        let patches_x = (heightmap.width() as u32 - 1).div_ceil(q);
        let patches_z = (heightmap.height() as u32 - 1).div_ceil(q);

        let builder = PatchBuilder {
            heightmap,
            materials,
            cell_size,
            skirt_drop: config.skirt_drop.max(0.0),
            q,
        };
        let patches: Vec<TerrainPatch> = (0..patches_x * patches_z)
            .into_par_iter()
            .map(|index| builder.build(index % patches_x, index / patches_x))
            .collect();

        let bounds = patches
            .iter()
            .fold(Aabb::EMPTY, |acc, patch| acc.merge(&patch.aabb));

        let grid = Self {
            patches,
            lod_indices: Some(LodIndexSet::new(q)),
            patch_quads: q,
            patches_x,
            patches_z,
            cell_size,
            bounds,
        };

        if cfg!(debug_assertions) {
            let mismatches = grid.seam_mismatches();
            if mismatches > 0 {
                error!("Terrain patch seams disagree at {mismatches} vertices");
            }
            debug_assert_eq!(mismatches, 0, "patch edge heights must match");
        }

        info!(
            "Built terrain: {}x{} patches of {q} quads from {}x{} heightmap",
            patches_x,
            patches_z,
            heightmap.width(),
            heightmap.height()
        );
        grid
    }

    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patches.len()
    }

    pub fn patches(&self) -> &[TerrainPatch] {
        &self.patches
    }

    pub(crate) fn patches_mut(&mut self) -> &mut [TerrainPatch] {
        &mut self.patches
    }

    pub fn patch(&self, index: usize) -> Option<&TerrainPatch> {
        self.patches.get(index)
    }

    /// Patch at a patch-grid coordinate.
    pub fn patch_at(&self, px: u32, pz: u32) -> Option<&TerrainPatch> {
        if px >= self.patches_x || pz >= self.patches_z {
            return None;
        }
        self.patches.get((pz * self.patches_x + px) as usize)
    }

    pub fn patch_quads(&self) -> u32 {
        self.patch_quads
    }

    /// Patch counts along X and Z.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.patches_x, self.patches_z)
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// World-space side length of a full patch.
    pub fn patch_span(&self) -> f32 {
        self.patch_quads as f32 * self.cell_size
    }

    /// World-space bounds of all patches, skirts included.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn lod_indices(&self) -> Option<&LodIndexSet> {
        self.lod_indices.as_ref()
    }

    /// Heights of the main-grid vertices along one edge of a patch.
    pub fn edge_heights(&self, index: usize, edge: PatchEdge) -> Vec<f32> {
        let Some(patch) = self.patches.get(index) else {
            return Vec::new();
        };
        let q = self.patch_quads;
        let n = q + 1;
        (0..n)
            .map(|k| {
                let (x, z) = edge.local(q, k);
                patch.vertices[(z * n + x) as usize].position[1]
            })
            .collect()
    }

    /// Count shared-edge vertices whose heights differ bit-wise between neighbours.
    pub fn seam_mismatches(&self) -> usize {
        let mut mismatches = 0;
        for pz in 0..self.patches_z {
            for px in 0..self.patches_x {
                let index = (pz * self.patches_x + px) as usize;
                if px + 1 < self.patches_x {
                    mismatches += count_mismatches(
                        &self.edge_heights(index, PatchEdge::East),
                        &self.edge_heights(index + 1, PatchEdge::West),
                    );
                }
                if pz + 1 < self.patches_z {
                    mismatches += count_mismatches(
                        &self.edge_heights(index, PatchEdge::South),
                        &self.edge_heights(index + self.patches_x as usize, PatchEdge::North),
                    );
                }
            }
        }
        mismatches
    }

    /// Create the shared index buffers and one vertex buffer per patch.
    pub fn upload<D: GpuDevice>(&mut self, gpu: &mut GpuResources<D>) -> terravista_gpu::Result<()> {
        let Some(lod_indices) = self.lod_indices.as_mut() else {
            return Ok(());
        };
        lod_indices.upload(gpu)?;

        let mut bytes = 0u64;
        for patch in &mut self.patches {
            let label = format!("terrain:patch{}x{}", patch.coord.0, patch.coord.1);
            let buffer = gpu.create_buffer(
                &label,
                BufferUsage::Vertex,
                bytemuck::cast_slice(&patch.vertices),
            )?;
            bytes += buffer.size();
            patch.vertex_buffer = Some(buffer);
        }
        debug!(
            "Uploaded {} terrain patches ({:.1} MiB of vertices)",
            self.patches.len(),
            bytes as f64 / (1024.0 * 1024.0)
        );
        Ok(())
    }

    /// Drop every GPU buffer owned by the grid.
    pub fn release(&mut self) {
        for patch in &mut self.patches {
            patch.vertex_buffer = None;
        }
        if let Some(lod_indices) = self.lod_indices.as_mut() {
            lod_indices.release();
        }
    }

    /// Draw list for the given patches at their current LOD.
    ///
    /// Patches without uploaded buffers are skipped.
    pub fn draws(&self, visible: &[usize]) -> Vec<PatchDraw> {
        let Some(lod_indices) = self.lod_indices.as_ref() else {
            return Vec::new();
        };
        visible
            .iter()
            .filter_map(|&index| {
                let patch = self.patches.get(index)?;
                let level = lod_indices.level(patch.current_lod);
                Some(PatchDraw {
                    vertex_buffer: patch.vertex_buffer.as_ref()?.raw(),
                    index_buffer: level.raw_buffer()?,
                    index_count: level.index_count(),
                    lod: level.lod,
                })
            })
            .collect()
    }
}

fn count_mismatches(a: &[f32], b: &[f32]) -> usize {
    a.iter()
        .zip(b)
        .filter(|(x, y)| x.to_bits() != y.to_bits())
        .count()
        + a.len().abs_diff(b.len())
}

struct PatchBuilder<'a> {
    heightmap: &'a Heightmap,
    materials: Option<&'a [u16]>,
    cell_size: f32,
    skirt_drop: f32,
    q: u32,
}

impl PatchBuilder<'_> {
    fn build(&self, px: u32, pz: u32) -> TerrainPatch {
        let q = self.q;
        let n = q + 1;
        let x0 = px * q;
        let z0 = pz * q;
        let last_x = self.heightmap.width() as u32 - 1;
        let last_z = self.heightmap.height() as u32 - 1;

        let mut vertices = Vec::with_capacity((n * n + 4 * n) as usize);
        for j in 0..n {
            for i in 0..n {
                vertices.push(self.vertex((x0 + i).min(last_x), (z0 + j).min(last_z), 0.0));
            }
        }
        for edge in PatchEdge::ALL {
            for k in 0..n {
                let (i, j) = edge.local(q, k);
                vertices.push(self.vertex(
                    (x0 + i).min(last_x),
                    (z0 + j).min(last_z),
                    self.skirt_drop,
                ));
            }
        }

        let aabb = Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position)));
        TerrainPatch {
            origin: (x0, z0),
            coord: (px, pz),
            covered_quads: (q.min(last_x - x0), q.min(last_z - z0)),
            aabb,
            center: aabb.center(),
            current_lod: 0,
            vertices,
            vertex_buffer: None,
        }
    }

    fn vertex(&self, gx: u32, gz: u32, drop: f32) -> PatchVertex {
        let map = self.heightmap;
        let (x, z) = (i64::from(gx), i64::from(gz));
        let height = map.sample_clamped(x, z);

        // Central differences on the global grid keep normals continuous across patches.
        let normal = Vec3::new(
            map.sample_clamped(x - 1, z) - map.sample_clamped(x + 1, z),
            2.0 * self.cell_size,
            map.sample_clamped(x, z - 1) - map.sample_clamped(x, z + 1),
        )
        .normalize_or_zero();

        let material = self
            .materials
            .map_or(0, |m| m[gz as usize * map.width() + gx as usize]);
        let base = SATELLITE_PALETTE[usize::from(material) % SATELLITE_PALETTE.len()];
        let shade = 0.6 + 0.4 * normal.y;
        let color = [
            (f32::from(base[0]) * shade) as u8,
            (f32::from(base[1]) * shade) as u8,
            (f32::from(base[2]) * shade) as u8,
            255,
        ];

        PatchVertex {
            position: [
                gx as f32 * self.cell_size,
                height - drop,
                gz as f32 * self.cell_size,
            ],
            material: f32::from(material),
            normal: normal.to_array(),
            color,
        }
    }
}
