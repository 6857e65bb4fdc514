//! Backend that keeps resources in host memory.
//!
//! Used for tests and for running the render core without a window.

use hashbrown::HashMap;
use tracing::trace;

use crate::device::{BufferUsage, GpuDevice, RawBuffer, RawTexture, TextureDesc};
use crate::error::{GpuError, Result};
use crate::submission::FrameSubmission;

/// Summary of the last submitted frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SubmissionSummary {
    pub patch_draws: usize,
    pub instanced_draws: usize,
    pub instances: usize,
    pub markers: usize,
    pub atlases_bound: usize,
    pub has_tile_lookup: bool,
}

/// Headless [`GpuDevice`] recording allocations and submissions.
#[derive(Debug, Default)]
pub struct HeadlessDevice {
    next_id: u64,
    buffers: HashMap<u64, (BufferUsage, usize)>,
    textures: HashMap<u64, TextureDesc>,
    frames_submitted: u64,
    last_submission: SubmissionSummary,
    double_frees: usize,
    /// Fail every allocation whose label contains this string.
    fail_label: Option<String>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make allocations whose label contains `label` fail.
    #[must_use]
    pub fn failing_on(mut self, label: impl Into<String>) -> Self {
        self.fail_label = Some(label.into());
        self
    }

    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Total bytes held by live buffers.
    pub fn buffer_bytes(&self) -> usize {
        self.buffers.values().map(|(_, size)| size).sum()
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    pub fn last_submission(&self) -> SubmissionSummary {
        self.last_submission
    }

    /// Destroy calls for names that were not alive.
    pub fn double_frees(&self) -> usize {
        self.double_frees
    }

    fn allocate_id(&mut self, label: &str) -> Result<u64> {
        if let Some(fail) = &self.fail_label {
            if label.contains(fail.as_str()) {
                return Err(GpuError::AllocationFailed(format!("injected failure for '{label}'")));
            }
        }
        self.next_id += 1;
        Ok(self.next_id)
    }
}

impl GpuDevice for HeadlessDevice {
    fn create_buffer(
        &mut self,
        label: &str,
        usage: BufferUsage,
        contents: &[u8],
    ) -> Result<RawBuffer> {
        let id = self.allocate_id(label)?;
        trace!("headless: buffer {id} '{label}' ({} bytes)", contents.len());
        self.buffers.insert(id, (usage, contents.len()));
        Ok(RawBuffer(id))
    }

    fn destroy_buffer(&mut self, buffer: RawBuffer) {
        if self.buffers.remove(&buffer.0).is_none() {
            self.double_frees += 1;
        }
    }

    fn create_texture(&mut self, desc: &TextureDesc, _contents: &[u8]) -> Result<RawTexture> {
        let id = self.allocate_id(&desc.label)?;
        trace!(
            "headless: texture {id} '{}' {}x{}",
            desc.label,
            desc.width,
            desc.height
        );
        self.textures.insert(id, desc.clone());
        Ok(RawTexture(id))
    }

    fn destroy_texture(&mut self, texture: RawTexture) {
        if self.textures.remove(&texture.0).is_none() {
            self.double_frees += 1;
        }
    }

    fn submit(&mut self, frame: &FrameSubmission<'_>) -> Result<()> {
        self.frames_submitted += 1;
        self.last_submission = SubmissionSummary {
            patch_draws: frame.patches.len(),
            instanced_draws: frame.instanced.len(),
            instances: frame.instanced.iter().map(|d| d.transforms.len()).sum(),
            markers: frame.markers.len(),
            atlases_bound: frame.atlases.iter().filter(|a| a.is_some()).count(),
            has_tile_lookup: frame.tile_lookup.is_some(),
        };
        Ok(())
    }
}
