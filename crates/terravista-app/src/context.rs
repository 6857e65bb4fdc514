//! Services the render core runs against.

use std::sync::Arc;

use terravista_gpu::{GpuDevice, GpuResources};
use terravista_objects::ModelResolver;
use terravista_streaming::TextureResolver;

/// Backend and asset services handed to [`crate::RenderCore`] at construction.
///
/// Owned by the core for the lifetime of the session; nothing here is global.
pub struct RenderContext<D: GpuDevice> {
    /// GPU resource arena wrapping the platform backend.
    pub gpu: GpuResources<D>,
    /// Tile texture lookup, shared with the loader threads.
    pub texture_resolver: Arc<dyn TextureResolver>,
    /// Model lookup, called on the render thread.
    pub model_resolver: Box<dyn ModelResolver>,
}

impl<D: GpuDevice> RenderContext<D> {
    /// Wrap a backend device. Frames in flight default to 2 until the core
    /// applies its configuration.
    pub fn new(
        device: D,
        texture_resolver: Arc<dyn TextureResolver>,
        model_resolver: Box<dyn ModelResolver>,
    ) -> Self {
        Self {
            gpu: GpuResources::new(device, 2),
            texture_resolver,
            model_resolver,
        }
    }
}
