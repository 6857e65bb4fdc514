//! Bounding volumes and frustum culling.

use glam::{Mat4, Vec3, Vec4, Vec4Swizzles};

/// Axis-Aligned Bounding Box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any call to `expand_to_include` will replace.
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    /// Create a new AABB from min and max corners
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Build the tightest box around a set of points.
    ///
    /// Returns [`Aabb::EMPTY`] for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for p in points {
            aabb.expand_to_include(p);
        }
        aabb
    }

    /// Returns true if no point has been added to this box.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Get the center of the AABB
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the size of the AABB
    #[inline]
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get the half-extents of the AABB
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Check if a point is inside the AABB
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Expand AABB to include a point
    #[inline]
    pub fn expand_to_include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Merge two AABBs
    #[inline]
    pub fn merge(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

/// Bounding sphere used for placed-object culling.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

impl BoundingSphere {
    #[inline]
    pub const fn new(center: Vec3, radius: f32) -> Self {
        Self { center, radius }
    }
}

/// Frustum for culling operations.
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    /// Six frustum planes (left, right, bottom, top, near, far)
    /// Each plane is (nx, ny, nz, d) with a unit-length normal pointing inwards.
    pub planes: [Vec4; 6],
}

impl Frustum {
    /// Extract frustum planes from a view-projection matrix.
    ///
    /// Expects glam's `*_rh` projections, whose clip-space depth range is `[0, 1]`,
    /// so the near plane is the third row on its own.
    pub fn from_view_projection(vp: Mat4) -> Self {
        let row0 = vp.row(0);
        let row1 = vp.row(1);
        let row2 = vp.row(2);
        let row3 = vp.row(3);

        let planes = [
            normalize_plane(row3 + row0), // Left
            normalize_plane(row3 - row0), // Right
            normalize_plane(row3 + row1), // Bottom
            normalize_plane(row3 - row1), // Top
            normalize_plane(row2),        // Near
            normalize_plane(row3 - row2), // Far
        ];

        Self { planes }
    }

    /// Test if an AABB is inside or intersects the frustum
    pub fn test_aabb(&self, aabb: &Aabb) -> bool {
        for plane in &self.planes {
            let normal = plane.xyz();

            // Find the positive vertex (furthest along plane normal)
            let p = Vec3::new(
                if normal.x >= 0.0 {
                    aabb.max.x
                } else {
                    aabb.min.x
                },
                if normal.y >= 0.0 {
                    aabb.max.y
                } else {
                    aabb.min.y
                },
                if normal.z >= 0.0 {
                    aabb.max.z
                } else {
                    aabb.min.z
                },
            );

            if normal.dot(p) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }

    /// Test if a bounding sphere is inside or intersects the frustum
    pub fn test_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.xyz().dot(sphere.center) + plane.w >= -sphere.radius)
    }

    /// Test if a point lies inside the frustum
    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.test_sphere(&BoundingSphere::new(point, 0.0))
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.xyz().length();
    if len > f32::EPSILON {
        plane / len
    } else {
        plane
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn looking_down_neg_z() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);
        let proj = Mat4::perspective_rh(90.0_f32.to_radians(), 1.0, 0.1, 100.0);
        Frustum::from_view_projection(proj * view)
    }

    #[test]
    fn aabb_contains_point() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        assert!(aabb.contains_point(Vec3::splat(0.5)));
        assert!(aabb.contains_point(Vec3::ZERO));
        assert!(aabb.contains_point(Vec3::ONE));
        assert!(!aabb.contains_point(Vec3::new(2.0, 0.5, 0.5)));
    }

    #[test]
    fn aabb_from_points() {
        let aabb = Aabb::from_points([
            Vec3::new(1.0, -2.0, 3.0),
            Vec3::new(-1.0, 4.0, 0.0),
        ]);
        assert_eq!(aabb.min, Vec3::new(-1.0, -2.0, 0.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 4.0, 3.0));
        assert!(Aabb::from_points(std::iter::empty()).is_empty());
    }

    #[test]
    fn frustum_planes_are_normalized() {
        let frustum = looking_down_neg_z();
        for plane in frustum.planes {
            assert_relative_eq!(plane.xyz().length(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn frustum_accepts_box_in_front() {
        let frustum = looking_down_neg_z();
        let aabb = Aabb::new(Vec3::new(-1.0, -1.0, -11.0), Vec3::new(1.0, 1.0, -9.0));
        assert!(frustum.test_aabb(&aabb));
    }

    #[test]
    fn frustum_rejects_box_behind_and_beyond_far() {
        let frustum = looking_down_neg_z();
        let behind = Aabb::new(Vec3::new(-1.0, -1.0, 5.0), Vec3::new(1.0, 1.0, 7.0));
        let beyond = Aabb::new(Vec3::new(-1.0, -1.0, -210.0), Vec3::new(1.0, 1.0, -200.0));
        assert!(!frustum.test_aabb(&behind));
        assert!(!frustum.test_aabb(&beyond));
    }

    #[test]
    fn frustum_accepts_box_straddling_a_plane() {
        let frustum = looking_down_neg_z();
        // 90 degree fov: the left plane passes through x = z.
        let aabb = Aabb::new(Vec3::new(-30.0, -1.0, -11.0), Vec3::new(-9.0, 1.0, -9.0));
        assert!(frustum.test_aabb(&aabb));
    }

    #[test]
    fn frustum_sphere_test_uses_radius() {
        let frustum = looking_down_neg_z();
        // Centre is 2 units behind the camera, outside the near plane.
        let small = BoundingSphere::new(Vec3::new(0.0, 0.0, 2.0), 1.0);
        let large = BoundingSphere::new(Vec3::new(0.0, 0.0, 2.0), 3.0);
        assert!(!frustum.test_sphere(&small));
        assert!(frustum.test_sphere(&large));
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -50.0)));
    }
}
