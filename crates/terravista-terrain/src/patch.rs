//! Terrain patch: one draw unit of the heightmap.

use bytemuck::{Pod, Zeroable};
use terravista_core::Aabb;
use terravista_gpu::OwnedBuffer;

use glam::Vec3;

/// Vertex layout shared by every patch.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PatchVertex {
    pub position: [f32; 3],
    /// Material class packed as a float, decoded by the shader.
    pub material: f32,
    pub normal: [f32; 3],
    /// Satellite palette color.
    pub color: [u8; 4],
}

impl PatchVertex {
    pub const STRIDE: usize = std::mem::size_of::<Self>();
}

/// A rectangular block of `patch_quads` x `patch_quads` heightmap quads.
#[derive(Debug)]
pub struct TerrainPatch {
    /// Grid coordinate (in samples) of the patch's first vertex.
    pub origin: (u32, u32),
    /// Patch coordinate within the patch grid.
    pub coord: (u32, u32),
    /// Quads actually covered by heightmap data; the rest of the vertex grid
    /// is clamped onto the last sample.
    pub covered_quads: (u32, u32),
    pub aabb: Aabb,
    pub center: Vec3,
    pub current_lod: u8,
    pub(crate) vertices: Vec<PatchVertex>,
    pub(crate) vertex_buffer: Option<OwnedBuffer>,
}

impl TerrainPatch {
    /// CPU-side vertices, main grid first then the four skirts.
    pub fn vertices(&self) -> &[PatchVertex] {
        &self.vertices
    }

    pub fn vertex_buffer(&self) -> Option<&OwnedBuffer> {
        self.vertex_buffer.as_ref()
    }

    /// Horizontal extent of the patch in world units.
    pub fn span(&self) -> f32 {
        let size = self.aabb.size();
        size.x.max(size.z)
    }
}
