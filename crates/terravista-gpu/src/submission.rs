//! Per-frame draw description handed to the backend.

use glam::{Mat4, Vec3};

use crate::device::{RawBuffer, RawTexture};

/// One terrain patch draw: a patch vertex buffer with a shared LOD index buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PatchDraw {
    pub vertex_buffer: RawBuffer,
    pub index_buffer: RawBuffer,
    pub index_count: u32,
    pub lod: u8,
}

/// One instanced draw of a model mesh group.
#[derive(Clone, Copy, Debug)]
pub struct InstancedDraw<'a> {
    pub vertex_buffer: RawBuffer,
    pub index_buffer: RawBuffer,
    pub index_count: u32,
    pub material: u32,
    pub transforms: &'a [Mat4],
}

/// Placeholder marker drawn for objects whose model failed to load.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointMarker {
    pub position: Vec3,
    pub color: [u8; 4],
}

/// Everything the backend needs to render one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameSubmission<'a> {
    pub view_projection: Mat4,
    pub eye: Vec3,
    pub patches: &'a [PatchDraw],
    /// Per-role material atlases, in role order.
    pub atlases: &'a [Option<RawTexture>],
    /// Tile lookup table (RGBA32F, one column per tile index).
    pub tile_lookup: Option<RawTexture>,
    pub instanced: &'a [InstancedDraw<'a>],
    pub markers: &'a [PointMarker],
}

impl FrameSubmission<'_> {
    /// Number of draw calls this submission will issue.
    pub fn draw_call_count(&self) -> usize {
        self.patches.len() + self.instanced.len() + usize::from(!self.markers.is_empty())
    }
}
