//! Deferred resource release for multi-frame-in-flight rendering.
//!
//! When using multiple frames in flight, GPU resources cannot be freed immediately
//! as they may still be in use by a previous frame. This module provides a queue
//! to defer releases until the resource is guaranteed to no longer be in use.

use std::collections::VecDeque;

use crate::device::GpuDevice;
use crate::resources::ReleaseRequest;

/// Number of resources released by one pass, per kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReleaseCounts {
    pub buffers: usize,
    pub textures: usize,
}

impl ReleaseCounts {
    pub const fn total(self) -> usize {
        self.buffers + self.textures
    }

    fn record(&mut self, request: ReleaseRequest) {
        match request {
            ReleaseRequest::Buffer(_) => self.buffers += 1,
            ReleaseRequest::Texture(_) => self.textures += 1,
        }
    }
}

/// A resource pending release.
#[derive(Debug)]
pub struct PendingRelease {
    pub request: ReleaseRequest,
    /// Frame number when this resource was queued for release.
    pub frame_queued: u64,
}

/// Queue for deferred releases.
///
/// Resources are queued with a frame number and only released once enough
/// frames have passed to guarantee they are no longer in use by any in-flight
/// frame.
#[derive(Debug)]
pub struct DeferredReleaseQueue {
    pending: VecDeque<PendingRelease>,
    frames_in_flight: usize,
}

impl DeferredReleaseQueue {
    /// Create a new deferred release queue.
    ///
    /// # Arguments
    /// * `frames_in_flight` - Number of frames that can be in flight simultaneously.
    ///   Resources will be kept for this many frames before being released.
    pub fn new(frames_in_flight: usize) -> Self {
        Self {
            pending: VecDeque::new(),
            frames_in_flight,
        }
    }

    /// Queue a resource for deferred release.
    pub fn queue(&mut self, request: ReleaseRequest, frame_number: u64) {
        self.pending.push_back(PendingRelease {
            request,
            frame_queued: frame_number,
        });
    }

    /// Release resources that are safe to destroy.
    ///
    /// Returns the number of resources released.
    pub fn process<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        current_frame: u64,
    ) -> ReleaseCounts {
        let cutoff = current_frame.saturating_sub(self.frames_in_flight as u64);
        let mut released = ReleaseCounts::default();

        // Queue order is FIFO and frame numbers are non-decreasing, so only the front can mature.
        while let Some(pending) = self.pending.pop_front() {
            if pending.frame_queued >= cutoff {
                self.pending.push_front(pending);
                break;
            }
            pending.request.execute(device);
            released.record(pending.request);
        }

        released
    }

    /// Release everything immediately.
    ///
    /// Call this during shutdown or world unload once the backend is idle.
    pub fn flush<D: GpuDevice + ?Sized>(&mut self, device: &mut D) -> ReleaseCounts {
        let mut released = ReleaseCounts::default();
        while let Some(pending) = self.pending.pop_front() {
            pending.request.execute(device);
            released.record(pending.request);
        }
        released
    }

    /// Get the number of pending releases.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Update the frames in flight count.
    pub fn set_frames_in_flight(&mut self, frames_in_flight: usize) {
        self.frames_in_flight = frames_in_flight;
    }
}
