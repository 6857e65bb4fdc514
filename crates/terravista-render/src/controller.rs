//! Orbit and first-person camera control.

use std::f32::consts::FRAC_PI_2;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use terravista_core::Aabb;
use tracing::debug;

use crate::camera::Camera;
use crate::input::{InputState, Key, MouseButton};

/// Pitch limit keeping the view away from the poles.
const PITCH_LIMIT: f32 = FRAC_PI_2 - 0.01;

/// Camera projection and control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
    /// First-person speed in world units per second.
    pub move_speed: f32,
    pub sprint_multiplier: f32,
    /// Radians per pixel of pointer motion.
    pub mouse_sensitivity: f32,
    /// Distance factor per wheel line in orbit mode.
    pub zoom_step: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    /// Pan distance per pixel, relative to the orbit distance.
    pub pan_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 60.0,
            near: 0.5,
            far: 50_000.0,
            move_speed: 120.0,
            sprint_multiplier: 4.0,
            mouse_sensitivity: 0.003,
            zoom_step: 1.1,
            min_distance: 5.0,
            max_distance: 40_000.0,
            pan_speed: 0.0015,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraMode {
    #[default]
    Orbit,
    FirstPerson,
}

/// Camera state machine producing the per-frame [`Camera`].
///
/// Orbit yaw and pitch describe the direction from the target to the eye
/// (positive pitch is above the target). First-person pitch is positive when
/// looking down.
#[derive(Debug, Clone)]
pub struct CameraController {
    config: CameraConfig,
    mode: CameraMode,
    target: Vec3,
    distance: f32,
    orbit_yaw: f32,
    orbit_pitch: f32,
    position: Vec3,
    yaw: f32,
    pitch: f32,
    camera: Camera,
}

impl CameraController {
    pub fn new(config: CameraConfig) -> Self {
        let camera = Camera {
            fov: config.fov_degrees.to_radians(),
            near: config.near,
            far: config.far,
            ..Camera::default()
        };
        let mut controller = Self {
            config,
            mode: CameraMode::Orbit,
            target: Vec3::ZERO,
            distance: 500.0,
            orbit_yaw: 0.0,
            orbit_pitch: 0.6,
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            camera,
        };
        controller.sync_camera();
        controller
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub const fn mode(&self) -> CameraMode {
        self.mode
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn eye(&self) -> Vec3 {
        self.camera.position
    }

    pub const fn target(&self) -> Vec3 {
        self.target
    }

    pub const fn distance(&self) -> f32 {
        self.distance
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
    }

    /// Place the orbit camera.
    pub fn set_orbit(&mut self, target: Vec3, distance: f32, yaw: f32, pitch: f32) {
        self.mode = CameraMode::Orbit;
        self.target = target;
        self.distance = distance.clamp(self.config.min_distance, self.config.max_distance);
        self.orbit_yaw = yaw;
        self.orbit_pitch = pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        self.sync_camera();
    }

    /// Orbit the center of `bounds` from far enough away to see all of it.
    pub fn frame_world(&mut self, bounds: &Aabb) {
        if bounds.is_empty() {
            return;
        }
        let radius = bounds.half_extents().length();
        let half_fov = self.camera.fov * 0.5;
        let distance = (radius / half_fov.sin()).max(self.config.min_distance);
        self.config.max_distance = self.config.max_distance.max(distance * 2.0);
        self.camera.far = self.camera.far.max(distance + radius * 2.0);
        self.set_orbit(bounds.center(), distance, 0.0, 0.9);
        debug!(
            "Framed world: target {:?}, distance {distance:.0}",
            self.target
        );
    }

    /// Switch between orbit and first person without moving the eye.
    pub fn toggle_mode(&mut self) {
        let eye = self.camera.position;
        let direction = self.camera.direction;
        match self.mode {
            CameraMode::Orbit => {
                self.position = eye;
                self.yaw = direction.x.atan2(direction.z);
                self.pitch = (-direction.y).clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
                self.mode = CameraMode::FirstPerson;
            }
            CameraMode::FirstPerson => {
                self.target = eye + direction * self.distance;
                self.orbit_yaw = (-direction.x).atan2(-direction.z);
                self.orbit_pitch = (-direction.y).clamp(-1.0, 1.0).asin().clamp(-PITCH_LIMIT, PITCH_LIMIT);
                self.mode = CameraMode::Orbit;
            }
        }
        debug!("Camera mode: {:?}", self.mode);
        self.sync_camera();
    }

    /// Apply one frame of input.
    pub fn update(&mut self, input: &InputState, dt: f32) {
        if input.is_key_just_pressed(Key::Tab) {
            self.toggle_mode();
        }
        match self.mode {
            CameraMode::Orbit => self.update_orbit(input),
            CameraMode::FirstPerson => self.update_first_person(input, dt),
        }
        self.sync_camera();
    }

    fn update_orbit(&mut self, input: &InputState) {
        let delta = input.mouse_delta();
        if input.is_mouse_pressed(MouseButton::Left) {
            self.orbit_yaw -= delta.x * self.config.mouse_sensitivity;
            self.orbit_pitch = (self.orbit_pitch + delta.y * self.config.mouse_sensitivity)
                .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
        if input.is_mouse_pressed(MouseButton::Right) || input.is_mouse_pressed(MouseButton::Middle) {
            let forward = Vec3::new(-self.orbit_yaw.sin(), 0.0, -self.orbit_yaw.cos());
            let right = forward.cross(Vec3::Y);
            let scale = self.distance * self.config.pan_speed;
            self.target += (forward * delta.y - right * delta.x) * scale;
        }
        let scroll = input.scroll_delta();
        if scroll != 0.0 {
            self.distance = (self.distance * self.config.zoom_step.powf(-scroll))
                .clamp(self.config.min_distance, self.config.max_distance);
        }
    }

    fn update_first_person(&mut self, input: &InputState, dt: f32) {
        if input.is_mouse_pressed(MouseButton::Left) || input.is_mouse_pressed(MouseButton::Right) {
            let delta = input.mouse_delta();
            self.yaw -= delta.x * self.config.mouse_sensitivity;
            self.pitch = (self.pitch + delta.y * self.config.mouse_sensitivity)
                .clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        let direction = fp_direction(self.yaw, self.pitch);
        let forward = Vec3::new(direction.x, 0.0, direction.z).normalize_or_zero();
        let right = forward.cross(Vec3::Y).normalize_or_zero();

        let speed = if input.is_key_pressed(Key::Shift) {
            self.config.move_speed * self.config.sprint_multiplier
        } else {
            self.config.move_speed
        };

        let mut movement = Vec3::ZERO;
        if input.is_key_pressed(Key::W) {
            movement += forward;
        }
        if input.is_key_pressed(Key::S) {
            movement -= forward;
        }
        if input.is_key_pressed(Key::D) {
            movement += right;
        }
        if input.is_key_pressed(Key::A) {
            movement -= right;
        }
        if input.is_key_pressed(Key::E) || input.is_key_pressed(Key::Space) {
            movement += Vec3::Y;
        }
        if input.is_key_pressed(Key::Q) {
            movement -= Vec3::Y;
        }
        if movement != Vec3::ZERO {
            self.position += movement.normalize() * speed * dt;
        }
    }

    fn sync_camera(&mut self) {
        match self.mode {
            CameraMode::Orbit => {
                let offset = Vec3::new(
                    self.orbit_pitch.cos() * self.orbit_yaw.sin(),
                    self.orbit_pitch.sin(),
                    self.orbit_pitch.cos() * self.orbit_yaw.cos(),
                );
                self.camera.position = self.target + offset * self.distance;
                self.camera.direction = -offset;
            }
            CameraMode::FirstPerson => {
                self.camera.position = self.position;
                self.camera.direction = fp_direction(self.yaw, self.pitch);
            }
        }
    }
}

fn fp_direction(yaw: f32, pitch: f32) -> Vec3 {
    Vec3::new(pitch.cos() * yaw.sin(), -pitch.sin(), pitch.cos() * yaw.cos()).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::InputEvent;
    use approx::assert_relative_eq;

    fn press(input: &mut InputState, event: InputEvent) {
        input.process_event(&event);
    }

    #[test]
    fn orbit_eye_sits_at_distance_from_target() {
        let mut controller = CameraController::new(CameraConfig::default());
        controller.set_orbit(Vec3::new(10.0, 0.0, 10.0), 100.0, 0.3, 0.5);
        assert_relative_eq!(controller.eye().distance(controller.target()), 100.0, epsilon = 1e-3);
        let to_target = (controller.target() - controller.eye()).normalize();
        assert_relative_eq!(to_target.dot(controller.camera().direction), 1.0, epsilon = 1e-5);
        assert!(controller.eye().y > 0.0);
    }

    #[test]
    fn zoom_is_multiplicative_and_clamped() {
        let mut controller = CameraController::new(CameraConfig::default());
        controller.set_orbit(Vec3::ZERO, 100.0, 0.0, 0.5);
        let mut input = InputState::new();
        press(&mut input, InputEvent::Scroll(1.0));
        controller.update(&input, 0.016);
        assert_relative_eq!(controller.distance(), 100.0 / 1.1, epsilon = 1e-3);

        input.end_frame();
        press(&mut input, InputEvent::Scroll(-500.0));
        controller.update(&input, 0.016);
        assert_relative_eq!(controller.distance(), controller.config().max_distance);
    }

    #[test]
    fn pan_moves_target_on_ground_plane() {
        let mut controller = CameraController::new(CameraConfig::default());
        controller.set_orbit(Vec3::ZERO, 1000.0, 0.0, 0.5);
        let mut input = InputState::new();
        press(&mut input, InputEvent::MouseButtonPressed(MouseButton::Right));
        press(&mut input, InputEvent::MouseMoved { dx: 0.0, dy: 100.0 });
        controller.update(&input, 0.016);
        assert_relative_eq!(controller.target().y, 0.0);
        // Yaw 0 puts the eye on +Z, so dragging forward moves the target to -Z.
        assert!(controller.target().z < -100.0);
    }

    #[test]
    fn toggling_keeps_the_eye_in_place() {
        let mut controller = CameraController::new(CameraConfig::default());
        controller.set_orbit(Vec3::new(5.0, 2.0, -3.0), 250.0, 1.1, 0.7);
        let eye = controller.eye();
        let direction = controller.camera().direction;

        controller.toggle_mode();
        assert_eq!(controller.mode(), CameraMode::FirstPerson);
        assert_relative_eq!(controller.eye().distance(eye), 0.0, epsilon = 1e-3);
        assert_relative_eq!(controller.camera().direction.dot(direction), 1.0, epsilon = 1e-4);

        controller.toggle_mode();
        assert_eq!(controller.mode(), CameraMode::Orbit);
        assert_relative_eq!(controller.eye().distance(eye), 0.0, epsilon = 1e-2);
    }

    #[test]
    fn first_person_moves_with_keys_and_sprint() {
        let mut controller = CameraController::new(CameraConfig::default());
        controller.set_orbit(Vec3::ZERO, 100.0, 0.0, 0.0);
        controller.toggle_mode();
        let start = controller.eye();

        let mut input = InputState::new();
        press(&mut input, InputEvent::KeyPressed(Key::W));
        controller.update(&input, 1.0);
        assert_relative_eq!(controller.eye().distance(start), 120.0, epsilon = 1e-2);

        input.end_frame();
        press(&mut input, InputEvent::KeyPressed(Key::Shift));
        let before = controller.eye();
        controller.update(&input, 0.5);
        assert_relative_eq!(controller.eye().distance(before), 240.0, epsilon = 1e-2);
    }

    #[test]
    fn frame_world_sees_every_corner() {
        let bounds = Aabb::new(Vec3::new(0.0, -50.0, 0.0), Vec3::new(4096.0, 300.0, 4096.0));
        let mut controller = CameraController::new(CameraConfig::default());
        controller.set_viewport(1, 1);
        controller.frame_world(&bounds);
        let frustum = controller.camera().frustum();
        for corner in [bounds.min, bounds.max, Vec3::new(bounds.min.x, 0.0, bounds.max.z)] {
            assert!(frustum.contains_point(corner), "{corner:?} not visible");
        }
    }
}
