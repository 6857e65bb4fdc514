//! Test harness for the Terravista renderer.
//!
//! Provides in-memory resolvers, synthetic worlds and a headless render core.

pub mod fixtures;
pub mod harness;

pub use fixtures::{
    cube_model, overhead_view, overhead_view_projection, ramp_heightmap, solid_image,
    tiled_world, GatedResolver, MemoryTextureResolver, StubModelResolver,
};
pub use harness::HeadlessHarness;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TestError {
    #[error("condition not reached after {0} frames")]
    FrameLimit(usize),
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("render core failed: {0}")]
    Core(String),
    #[error("invalid fixture: {0}")]
    Fixture(#[from] terravista_core::Error),
}

pub type Result<T> = std::result::Result<T, TestError>;
