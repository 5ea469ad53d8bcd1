//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the rigid [`Transform`] used by every
//! placeable object of a scene.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Position, rotation and scale of an object relative to its parent frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in the parent frame
    pub position: Vec3,

    /// Orientation in the parent frame
    pub rotation: Quat,

    /// Per-axis scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Transform with only a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Homogeneous matrix (translation * rotation * scale)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        Point3::from(self.position + self.rotation * point.coords.component_mul(&self.scale))
    }

    /// Apply this transform to a direction (no translation)
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation * vector.component_mul(&self.scale)
    }

    /// Compose `self` (parent frame) with `child` (expressed in `self`)
    pub fn combine(&self, child: &Self) -> Self {
        Self {
            position: self.position + self.rotation * self.scale.component_mul(&child.position),
            rotation: self.rotation * child.rotation,
            scale: self.scale.component_mul(&child.scale),
        }
    }

    /// Inverse transform
    ///
    /// Exact for uniform scale, which is the only case the node tree
    /// produces through its public API.
    pub fn inverse(&self) -> Self {
        let inv_scale = Vec3::new(
            safe_recip(self.scale.x),
            safe_recip(self.scale.y),
            safe_recip(self.scale.z),
        );
        let inv_rotation = self.rotation.inverse();
        let inv_position = (inv_rotation * -self.position).component_mul(&inv_scale);

        Self {
            position: inv_position,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }

    /// Forward direction (-Z in local space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::z()
    }

    /// Up direction (+Y in local space)
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::y()
    }

    /// Rotation that orients -Z toward `target` from `position`
    ///
    /// Returns `None` when the two points coincide or the direction is
    /// parallel to `up`.
    pub fn look_rotation(position: &Vec3, target: &Vec3, up: &Vec3) -> Option<Quat> {
        let direction = target - position;
        if direction.norm_squared() <= f32::EPSILON || direction.cross(up).norm_squared() <= f32::EPSILON {
            return None;
        }
        Some(Quat::face_towards(&-direction, up))
    }

    /// View matrix of an observer located at this transform
    pub fn view_matrix(&self) -> Mat4 {
        let eye = Point3::from(self.position);
        let target = eye + self.forward();
        Mat4::look_at_rh(&eye, &target, &self.up())
    }
}

fn safe_recip(value: f32) -> f32 {
    if value.abs() <= f32::EPSILON {
        0.0
    } else {
        1.0 / value
    }
}

/// Math utility functions
pub mod utils {
    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Linear interpolation
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        (b - a).mul_add(t, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_combine_applies_parent_rotation() {
        let parent = Transform::from_position_rotation(
            Vec3::new(10.0, 0.0, 0.0),
            Quat::from_axis_angle(&Vec3::y_axis(), std::f32::consts::FRAC_PI_2),
        );
        let child = Transform::from_position(Vec3::new(0.0, 0.0, -1.0));

        let world = parent.combine(&child);

        assert_relative_eq!(world.position.x, 9.0, epsilon = 1e-5);
        assert_relative_eq!(world.position.z, 0.0, epsilon = 1e-5);
    }

    #[test]
    fn test_inverse_round_trip() {
        let transform = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_axis_angle(&Vec3::x_axis(), 0.7),
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let point = Point3::new(-4.0, 5.0, 0.5);

        let back = transform.inverse().transform_point(&transform.transform_point(&point));

        assert_relative_eq!(back, point, epsilon = 1e-4);
    }

    #[test]
    fn test_matrix_matches_transform_point() {
        let transform = Transform {
            position: Vec3::new(3.0, -1.0, 2.0),
            rotation: Quat::from_axis_angle(&Vec3::z_axis(), 1.1),
            scale: Vec3::new(1.0, 2.0, 3.0),
        };
        let point = Point3::new(1.0, 1.0, 1.0);

        assert_relative_eq!(
            transform.to_matrix().transform_point(&point),
            transform.transform_point(&point),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_look_rotation_rejects_degenerate_direction() {
        let origin = Vec3::zeros();
        assert!(Transform::look_rotation(&origin, &origin, &Vec3::y()).is_none());
        assert!(Transform::look_rotation(&origin, &Vec3::y(), &Vec3::y()).is_none());

        let rotation = Transform::look_rotation(&origin, &Vec3::new(5.0, 0.0, 0.0), &Vec3::y());
        let forward = rotation.map(|r| r * -Vec3::z()).unwrap_or_else(Vec3::zeros);
        assert_relative_eq!(forward, Vec3::x(), epsilon = 1e-5);
    }
}
