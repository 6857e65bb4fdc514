//! Owning GPU handles and the arena that backs them.

use crossbeam::channel::{self, Receiver, Sender};
use tracing::debug;

use crate::deferred::{DeferredReleaseQueue, ReleaseCounts};
use crate::device::{BufferUsage, GpuDevice, RawBuffer, RawTexture, TextureDesc};
use crate::error::{GpuError, Result};
use crate::submission::FrameSubmission;

/// A release the arena must perform on the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseRequest {
    Buffer(RawBuffer),
    Texture(RawTexture),
}

impl ReleaseRequest {
    pub(crate) fn execute<D: GpuDevice + ?Sized>(self, device: &mut D) {
        match self {
            Self::Buffer(buffer) => device.destroy_buffer(buffer),
            Self::Texture(texture) => device.destroy_texture(texture),
        }
    }
}

/// A buffer owned by exactly one holder.
///
/// Dropping it queues the release on its arena; there is no other way to free it.
#[derive(Debug)]
pub struct OwnedBuffer {
    raw: RawBuffer,
    size: u64,
    release_tx: Sender<ReleaseRequest>,
}

impl OwnedBuffer {
    pub const fn raw(&self) -> RawBuffer {
        self.raw
    }

    /// Size in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for OwnedBuffer {
    fn drop(&mut self) {
        // The arena may already be gone during shutdown; the backend is then torn down too.
        let _ = self.release_tx.send(ReleaseRequest::Buffer(self.raw));
    }
}

/// A texture owned by exactly one holder.
#[derive(Debug)]
pub struct OwnedTexture {
    raw: RawTexture,
    width: u32,
    height: u32,
    release_tx: Sender<ReleaseRequest>,
}

impl OwnedTexture {
    pub const fn raw(&self) -> RawTexture {
        self.raw
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }
}

impl Drop for OwnedTexture {
    fn drop(&mut self) {
        let _ = self.release_tx.send(ReleaseRequest::Texture(self.raw));
    }
}

/// Arena owning the backend device and every resource created through it.
pub struct GpuResources<D: GpuDevice> {
    device: D,
    release_tx: Sender<ReleaseRequest>,
    release_rx: Receiver<ReleaseRequest>,
    deferred: DeferredReleaseQueue,
    frame_number: u64,
    live_buffers: usize,
    live_textures: usize,
}

impl<D: GpuDevice> GpuResources<D> {
    /// Wrap a device.
    ///
    /// # Arguments
    /// * `frames_in_flight` - How many frames a dropped resource is kept alive for.
    pub fn new(device: D, frames_in_flight: usize) -> Self {
        let (release_tx, release_rx) = channel::unbounded();
        Self {
            device,
            release_tx,
            release_rx,
            deferred: DeferredReleaseQueue::new(frames_in_flight),
            frame_number: 0,
            live_buffers: 0,
            live_textures: 0,
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Current frame number (advanced by `end_frame`).
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Buffers created and not yet released on the backend.
    pub fn live_buffers(&self) -> usize {
        self.live_buffers
    }

    /// Textures created and not yet released on the backend.
    pub fn live_textures(&self) -> usize {
        self.live_textures
    }

    /// Resources dropped but still waiting for in-flight frames to retire.
    pub fn pending_releases(&self) -> usize {
        self.deferred.pending_count() + self.release_rx.len()
    }

    /// Change how many frames a dropped resource is kept alive for.
    pub fn set_frames_in_flight(&mut self, frames_in_flight: usize) {
        self.deferred.set_frames_in_flight(frames_in_flight.max(1));
    }

    /// Create a buffer initialised with `contents`.
    pub fn create_buffer(
        &mut self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<OwnedBuffer> {
        if contents.is_empty() {
            return Err(GpuError::EmptyResource(label.to_string()));
        }
        let raw = self.device.create_buffer(label, usage, contents)?;
        self.live_buffers += 1;
        Ok(OwnedBuffer {
            raw,
            size: contents.len() as u64,
            release_tx: self.release_tx.clone(),
        })
    }

    /// Create a texture initialised with `contents`.
    pub fn create_texture(&mut self, desc: &TextureDesc, contents: &[u8]) -> Result<OwnedTexture> {
        if desc.width == 0 || desc.height == 0 {
            return Err(GpuError::EmptyResource(desc.label.clone()));
        }
        if contents.len() != desc.byte_len() {
            return Err(GpuError::InvalidState(format!(
                "texture '{}' expects {} bytes, got {}",
                desc.label,
                desc.byte_len(),
                contents.len()
            )));
        }
        let raw = self.device.create_texture(desc, contents)?;
        self.live_textures += 1;
        Ok(OwnedTexture {
            raw,
            width: desc.width,
            height: desc.height,
            release_tx: self.release_tx.clone(),
        })
    }

    /// Hand a frame to the backend.
    pub fn submit(&mut self, frame: &FrameSubmission<'_>) -> Result<()> {
        self.device.submit(frame)
    }

    /// Retire the current frame: collect dropped handles and release the ones
    /// no in-flight frame can still reference.
    pub fn end_frame(&mut self) -> usize {
        self.collect_dropped();
        let released = self.deferred.process(&mut self.device, self.frame_number);
        self.frame_number += 1;
        self.account(released)
    }

    /// Release every dropped handle immediately.
    ///
    /// Only valid when the backend is idle (world unload, shutdown).
    pub fn flush(&mut self) -> usize {
        self.collect_dropped();
        let released = self.deferred.flush(&mut self.device);
        let total = self.account(released);
        if total > 0 {
            debug!("Flushed {total} GPU resources");
        }
        total
    }

    fn collect_dropped(&mut self) {
        while let Ok(request) = self.release_rx.try_recv() {
            self.deferred.queue(request, self.frame_number);
        }
    }

    fn account(&mut self, released: ReleaseCounts) -> usize {
        self.live_buffers = self.live_buffers.saturating_sub(released.buffers);
        self.live_textures = self.live_textures.saturating_sub(released.textures);
        released.total()
    }
}

impl<D: GpuDevice> Drop for GpuResources<D> {
    fn drop(&mut self) {
        let pending = self.pending_releases();
        if pending > 0 {
            debug!("GpuResources dropped with {pending} pending releases, flushing");
        }
        self.flush();
    }
}
