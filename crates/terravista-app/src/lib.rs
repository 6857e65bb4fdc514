//! Render core for the Terravista terrain renderer.
//!
//! [`RenderCore`] owns every subsystem of a loaded world and is driven by a
//! thin platform shim that owns the window and surface:
//!
//! ```ignore
//! use std::sync::Arc;
//! use terravista_app::{init_logging, RenderConfig, RenderContext, RenderCore, WorldData};
//!
//! init_logging();
//! let context = RenderContext::new(device, Arc::new(textures), Box::new(models));
//! let mut core = RenderCore::new(context, RenderConfig::default());
//! core.load_world(world)?;
//!
//! // Per window event / frame
//! core.on_resize(width, height);
//! core.on_input_event(&event);
//! let stats = core.on_frame(dt)?;
//! ```

mod config;
mod context;
mod render_core;
mod logging;
mod stats;
mod world;

pub use crate::config::{RenderConfig, TerrainRenderConfig};
pub use crate::context::RenderContext;
pub use crate::render_core::RenderCore;
pub use crate::logging::init_logging;
pub use crate::stats::{FrameStats, StatsHandle};
pub use crate::world::WorldData;

// Re-export commonly used types for convenience
pub use terravista_render::{CameraMode, InputEvent, Key, MouseButton};
