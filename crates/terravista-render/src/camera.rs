//! Camera and view management.

use glam::{Mat4, Vec3};
use terravista_core::Frustum;

/// Camera for rendering.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub direction: Vec3,
    pub up: Vec3,
    /// Vertical field of view in radians.
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 100.0, 100.0),
            direction: Vec3::new(0.0, -1.0, -1.0).normalize(),
            up: Vec3::Y,
            fov: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.5,
            far: 50_000.0,
        }
    }
}

impl Camera {
    /// Create a new camera.
    pub fn new(position: Vec3, target: Vec3, fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            position,
            direction: (target - position).normalize_or(Vec3::NEG_Z),
            up: Vec3::Y,
            fov,
            aspect,
            near,
            far,
        }
    }

    /// Look at a target position.
    pub fn look_at(&mut self, target: Vec3) {
        self.direction = (target - self.position).normalize_or(self.direction);
    }

    /// Set the aspect ratio from a viewport size. Zero-sized viewports are ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Up vector safe to use with the current direction.
    fn stable_up(&self) -> Vec3 {
        if self.direction.cross(self.up).length_squared() < 1e-8 {
            Vec3::NEG_Z
        } else {
            self.up
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.direction, self.stable_up())
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    /// Get the view-projection matrix.
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Extract frustum planes from the current camera state.
    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(self.view_projection_matrix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use terravista_core::Aabb;

    #[test]
    fn frustum_sees_what_is_ahead() {
        let camera = Camera::new(Vec3::ZERO, Vec3::NEG_Z, 1.0, 1.0, 0.1, 100.0);
        let frustum = camera.frustum();
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 10.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -200.0)));
    }

    #[test]
    fn looking_straight_down_is_well_defined() {
        let camera = Camera::new(Vec3::new(0.0, 50.0, 0.0), Vec3::ZERO, 1.0, 1.0, 0.1, 100.0);
        assert!(!camera.view_matrix().is_nan());
        let below = Aabb::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(camera.frustum().test_aabb(&below));
    }

    #[test]
    fn viewport_sets_aspect() {
        let mut camera = Camera::default();
        camera.set_viewport(800, 400);
        assert!((camera.aspect - 2.0).abs() < f32::EPSILON);
        camera.set_viewport(0, 400);
        assert!((camera.aspect - 2.0).abs() < f32::EPSILON);
    }
}
