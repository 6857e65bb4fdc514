//! GPU resource ownership for the Terravista terrain renderer.
//!
//! The renderer never talks to a graphics API directly. Instead it goes through
//! the [`GpuDevice`] trait, which a platform backend implements. Resources are
//! handed out as owning handles ([`OwnedBuffer`], [`OwnedTexture`]) whose drop
//! queues exactly one release, executed once no in-flight frame can still use
//! the resource.

pub mod deferred;
pub mod device;
pub mod error;
pub mod headless;
pub mod resources;
pub mod submission;

pub use deferred::{DeferredReleaseQueue, ReleaseCounts};
pub use device::{BufferUsage, GpuDevice, RawBuffer, RawTexture, TextureDesc, TextureFormat};
pub use error::{GpuError, Result};
pub use headless::{HeadlessDevice, SubmissionSummary};
pub use resources::{GpuResources, OwnedBuffer, OwnedTexture, ReleaseRequest};
pub use submission::{FrameSubmission, InstancedDraw, PatchDraw, PointMarker};
