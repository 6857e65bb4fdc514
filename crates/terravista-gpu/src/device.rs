//! Backend boundary.

use crate::error::Result;
use crate::submission::FrameSubmission;

/// Backend-side buffer name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawBuffer(pub u64);

/// Backend-side texture name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RawTexture(pub u64);

/// What a buffer will be bound as.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
    Instance,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA, used by the per-role material atlases.
    Rgba8Unorm,
    /// 32-bit float RGBA, used by the tile lookup table.
    Rgba32Float,
}

impl TextureFormat {
    /// Bytes per texel.
    pub const fn texel_size(self) -> usize {
        match self {
            Self::Rgba8Unorm => 4,
            Self::Rgba32Float => 16,
        }
    }
}

/// Texture creation parameters.
#[derive(Clone, Debug)]
pub struct TextureDesc {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

impl TextureDesc {
    pub fn new(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            width,
            height,
            format,
        }
    }

    /// Expected size of the initial contents in bytes.
    pub const fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.texel_size()
    }
}

/// A graphics backend, implemented by the platform integration layer.
///
/// All calls happen on the render thread.
pub trait GpuDevice {
    /// Create a buffer initialised with `contents`.
    fn create_buffer(&mut self, label: &str, usage: BufferUsage, contents: &[u8])
        -> Result<RawBuffer>;

    /// Destroy a buffer. Called exactly once per successful `create_buffer`.
    fn destroy_buffer(&mut self, buffer: RawBuffer);

    /// Create a 2D texture initialised with `contents`.
    fn create_texture(&mut self, desc: &TextureDesc, contents: &[u8]) -> Result<RawTexture>;

    /// Destroy a texture. Called exactly once per successful `create_texture`.
    fn destroy_texture(&mut self, texture: RawTexture);

    /// Record and present one frame.
    fn submit(&mut self, frame: &FrameSubmission<'_>) -> Result<()>;
}
