//! Axis-aligned bounding box

use crate::foundation::math::{Mat3, Point3, Transform, Vec3};

/// Axis-Aligned Bounding Box for spatial queries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AABB {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl AABB {
    /// Create a new AABB from min and max points
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given half extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Cube centered on the origin spanning `[-half_size, half_size]` on each axis
    pub fn cube(half_size: f32) -> Self {
        Self::from_center_extents(Vec3::zeros(), Vec3::repeat(half_size))
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Full edge lengths
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Whether the box encloses a non-zero volume with finite coordinates
    ///
    /// Points, segments and flat boxes are degenerate and can't be placed in
    /// an octree.
    pub fn is_valid(&self) -> bool {
        let size = self.size();
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
            && size.x > 0.0
            && size.y > 0.0
            && size.z > 0.0
    }

    /// Copy grown so that every half extent reaches at least `min_half_extent`
    ///
    /// Flat and point boxes become valid, non-finite ones stay invalid.
    pub fn thickened(&self, min_half_extent: f32) -> Self {
        let extents = self.extents().map(|value| value.max(min_half_extent));
        Self::from_center_extents(self.center(), extents)
    }

    /// Enclosed volume, zero for degenerate boxes
    pub fn volume(&self) -> f32 {
        if self.is_valid() {
            let size = self.size();
            size.x * size.y * size.z
        } else {
            0.0
        }
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: &Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB fully encloses another one
    pub fn contains_aabb(&self, other: &Self) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    /// Check if this AABB intersects another AABB
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Check if this AABB touches a sphere
    pub fn intersects_sphere(&self, center: &Vec3, radius: f32) -> bool {
        let closest = center.sup(&self.min).inf(&self.max);
        (closest - center).norm_squared() <= radius * radius
    }

    /// Smallest box enclosing both boxes
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Box enclosing this local-space box once moved by `transform`
    pub fn transformed(&self, transform: &Transform) -> Self {
        let center = transform.transform_point(&Point3::from(self.center()));
        let linear: Mat3 = transform.rotation.to_rotation_matrix().into_inner()
            * Mat3::from_diagonal(&transform.scale);
        let extents = linear.abs() * self.extents();
        Self::from_center_extents(center.coords, extents)
    }

    /// Octant (0-7) of `point` relative to the box center
    ///
    /// Bit 0 is +X, bit 1 is +Y, bit 2 is +Z.
    pub fn octant_of(&self, point: &Vec3) -> usize {
        let center = self.center();
        let x_bit = usize::from(point.x >= center.x);
        let y_bit = usize::from(point.y >= center.y);
        let z_bit = usize::from(point.z >= center.z);
        (z_bit << 2) | (y_bit << 1) | x_bit
    }

    /// Bounds of one of the eight half-size octants
    pub fn octant(&self, index: usize) -> Self {
        let center = self.center();
        let quarter = self.extents() * 0.5;
        let sign = |bit: usize| if index & bit != 0 { 1.0 } else { -1.0 };
        let child_center = Vec3::new(
            center.x + quarter.x * sign(1),
            center.y + quarter.y * sign(2),
            center.z + quarter.z * sign(4),
        );
        Self::from_center_extents(child_center, quarter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Quat;
    use approx::assert_relative_eq;

    #[test]
    fn test_aabb_contains_point() {
        let aabb = AABB::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));

        assert!(aabb.contains_point(&Vec3::new(0.0, 0.0, 0.0)));
        assert!(aabb.contains_point(&Vec3::new(1.0, 1.0, 1.0)));
        assert!(!aabb.contains_point(&Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_aabb_intersects() {
        let aabb1 = AABB::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        let aabb2 = AABB::new(Vec3::new(1.0, 1.0, 1.0), Vec3::new(3.0, 3.0, 3.0));
        let aabb3 = AABB::new(Vec3::new(5.0, 5.0, 5.0), Vec3::new(6.0, 6.0, 6.0));

        assert!(aabb1.intersects(&aabb2));
        assert!(!aabb1.intersects(&aabb3));
    }

    #[test]
    fn test_degenerate_boxes_are_invalid() {
        let point = AABB::from_center_extents(Vec3::new(3.0, 3.0, 3.0), Vec3::zeros());
        let flat = AABB::new(Vec3::zeros(), Vec3::new(1.0, 0.0, 1.0));
        let nan = AABB::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::repeat(1.0));

        assert!(!point.is_valid());
        assert!(!flat.is_valid());
        assert!(!nan.is_valid());
        assert_eq!(point.volume(), 0.0);
        assert!(AABB::cube(1.0).is_valid());
        assert_relative_eq!(AABB::cube(1.0).volume(), 8.0);
    }

    #[test]
    fn test_thickened_flat_box() {
        let ground = AABB::new(Vec3::new(-50.0, 2.0, -50.0), Vec3::new(50.0, 2.0, 50.0));
        let thick = ground.thickened(0.5);

        assert!(thick.is_valid());
        assert_relative_eq!(thick.min, Vec3::new(-50.0, 1.5, -50.0));
        assert_relative_eq!(thick.max, Vec3::new(50.0, 2.5, 50.0));

        let nan = AABB::new(Vec3::new(f32::NAN, 0.0, 0.0), Vec3::repeat(1.0));
        assert!(!nan.thickened(0.5).is_valid());
    }

    #[test]
    fn test_octants_tile_parent() {
        let parent = AABB::cube(4.0);
        for index in 0..8 {
            let child = parent.octant(index);
            assert!(parent.contains_aabb(&child));
            assert_eq!(parent.octant_of(&child.center()), index);
            assert_relative_eq!(child.extents(), Vec3::repeat(2.0));
        }
    }

    #[test]
    fn test_transformed_box_grows_under_rotation() {
        let local = AABB::cube(1.0);
        let transform = Transform::from_position_rotation(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4),
        );

        let world = local.transformed(&transform);

        assert_relative_eq!(world.center(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(world.extents().x, std::f32::consts::SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(world.extents().z, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_sphere_intersection() {
        let aabb = AABB::cube(1.0);
        assert!(aabb.intersects_sphere(&Vec3::new(2.0, 0.0, 0.0), 1.0));
        assert!(!aabb.intersects_sphere(&Vec3::new(2.0, 2.0, 0.0), 1.0));
    }
}
