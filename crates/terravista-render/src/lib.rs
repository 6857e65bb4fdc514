//! Camera handling for the Terravista renderer.
//!
//! - [`Camera`]: eye, direction and projection parameters with the derived
//!   matrices and frustum
//! - [`CameraController`]: orbit and first-person camera state driven by
//!   [`InputEvent`]s
//! - [`InputState`]: keys and mouse buttons held between frames

pub mod camera;
pub mod controller;
pub mod input;

pub use camera::Camera;
pub use controller::{CameraConfig, CameraController, CameraMode};
pub use input::{ButtonState, InputEvent, InputState, Key, MouseButton};
