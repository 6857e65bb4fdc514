//! Headless render core driven frame by frame.

use std::sync::Arc;
use std::time::{Duration, Instant};

use terravista_app::{FrameStats, RenderConfig, RenderContext, RenderCore, WorldData};
use terravista_gpu::HeadlessDevice;
use terravista_objects::ModelResolver;
use terravista_streaming::TextureResolver;
use tracing::debug;

use crate::fixtures::{MemoryTextureResolver, StubModelResolver};
use crate::{Result, TestError};

/// Frame time fed to the core by the harness.
pub const FRAME_DT: f32 = 1.0 / 60.0;

/// A [`RenderCore`] on the headless backend.
pub struct HeadlessHarness {
    core: RenderCore<HeadlessDevice>,
}

impl HeadlessHarness {
    /// Core with the given resolvers.
    pub fn new(
        config: RenderConfig,
        textures: Arc<dyn TextureResolver>,
        models: Box<dyn ModelResolver>,
    ) -> Self {
        let ctx = RenderContext::new(HeadlessDevice::new(), textures, models);
        Self {
            core: RenderCore::new(ctx, config),
        }
    }

    /// Core serving `tile0..tile{tiles}` as solid images and cube models.
    pub fn with_solid_tiles(config: RenderConfig, tiles: usize, tile_size: u32) -> Self {
        Self::new(
            config,
            Arc::new(MemoryTextureResolver::with_solid_tiles(tiles, tile_size)),
            Box::new(StubModelResolver::new()),
        )
    }

    pub fn core(&self) -> &RenderCore<HeadlessDevice> {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut RenderCore<HeadlessDevice> {
        &mut self.core
    }

    pub fn device(&self) -> &HeadlessDevice {
        self.core.context().gpu.device()
    }

    pub fn load(&mut self, world: WorldData) -> Result<()> {
        self.core
            .load_world(world)
            .map_err(|e| TestError::Core(format!("{e:#}")))
    }

    pub fn frame(&mut self) -> Result<FrameStats> {
        self.core
            .on_frame(FRAME_DT)
            .map_err(|e| TestError::Core(format!("{e:#}")))
    }

    /// Run `count` frames, returning the last frame's stats.
    pub fn run_frames(&mut self, count: usize) -> Result<FrameStats> {
        let mut stats = self.core.stats().clone();
        for _ in 0..count {
            stats = self.frame()?;
        }
        Ok(stats)
    }

    /// Run frames until `done` holds, at most `max_frames` or `timeout`.
    ///
    /// Yields briefly between frames so loader threads make progress.
    pub fn run_until(
        &mut self,
        max_frames: usize,
        timeout: Duration,
        mut done: impl FnMut(&FrameStats) -> bool,
    ) -> Result<FrameStats> {
        let started = Instant::now();
        for frame in 0..max_frames {
            let stats = self.frame()?;
            if done(&stats) {
                debug!("Condition reached after {} frames", frame + 1);
                return Ok(stats);
            }
            if started.elapsed() > timeout {
                return Err(TestError::Timeout(timeout));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Err(TestError::FrameLimit(max_frames))
    }

    /// Unload and release everything, returning the live GPU allocations left.
    pub fn shutdown(&mut self) -> (usize, usize) {
        self.core.shutdown();
        let device = self.device();
        (device.live_buffer_count(), device.live_texture_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::tiled_world;

    #[test]
    fn frames_advance_without_world() {
        let mut harness = HeadlessHarness::with_solid_tiles(RenderConfig::default(), 0, 4);
        let stats = harness.run_frames(3).unwrap();
        assert_eq!(stats.frame, 3);
        assert_eq!(harness.device().frames_submitted(), 3);
    }

    #[test]
    fn run_until_reports_frame_limit() {
        let mut harness = HeadlessHarness::with_solid_tiles(RenderConfig::default(), 0, 4);
        let outcome = harness.run_until(2, Duration::from_secs(5), |_| false);
        assert!(matches!(outcome, Err(TestError::FrameLimit(2))));
    }

    #[test]
    fn shutdown_leaves_nothing_alive() {
        let mut harness = HeadlessHarness::with_solid_tiles(
            RenderConfig::default().with_worker_count(1),
            4,
            8,
        );
        harness.load(tiled_world(65, 65, 2.0, 32).unwrap()).unwrap();
        harness.run_frames(2).unwrap();
        assert_eq!(harness.shutdown(), (0, 0));
    }
}
