//! Entity components consumed by other subsystems
//!
//! Cameras and microphones are routed to the AV console, lights to the
//! scene light set. Each one is shared (`Arc`) between the owning entity and
//! those registries, so its world placement sits behind a lock and is pushed
//! by the entity once per logic cycle.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::foundation::math::{utils, Mat4, Transform, Vec3, Vec4};

/// Perspective camera
#[derive(Debug)]
pub struct Camera {
    name: String,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
    world: RwLock<Transform>,
}

impl Camera {
    /// Create a perspective camera, `fov_y_degrees` is the vertical field of view
    pub fn perspective(name: impl Into<String>, fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            name: name.into(),
            fov_y: utils::deg_to_rad(fov_y_degrees),
            aspect,
            near,
            far,
            world: RwLock::new(Transform::identity()),
        }
    }

    /// Component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Vertical field of view in radians
    pub const fn fov_y(&self) -> f32 {
        self.fov_y
    }

    /// Width over height
    pub const fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Near clip distance
    pub const fn near(&self) -> f32 {
        self.near
    }

    /// Far clip distance
    pub const fn far(&self) -> f32 {
        self.far
    }

    /// Last world transform pushed by the owning entity
    pub fn world(&self) -> Transform {
        *self.world.read()
    }

    /// World position
    pub fn world_position(&self) -> Vec3 {
        self.world.read().position
    }

    pub(crate) fn set_world(&self, world: &Transform) {
        *self.world.write() = *world;
    }

    /// World to view space
    pub fn view_matrix(&self) -> Mat4 {
        self.world.read().view_matrix()
    }

    /// View to clip space
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::new_perspective(self.aspect, self.fov_y, self.near, self.far)
    }

    /// World-space corners of the frustum slice between `near` and `far`
    ///
    /// The four near corners come first. Returns `None` when the matrices
    /// can't be inverted.
    pub fn frustum_corners(&self, near: f32, far: f32) -> Option<[Vec3; 8]> {
        let projection = Mat4::new_perspective(self.aspect, self.fov_y, near, far);
        let inverse = (projection * self.view_matrix()).try_inverse()?;

        let mut corners = [Vec3::zeros(); 8];
        for (index, corner) in corners.iter_mut().enumerate() {
            let x = if index & 1 == 0 { -1.0 } else { 1.0 };
            let y = if index & 2 == 0 { -1.0 } else { 1.0 };
            let z = if index & 4 == 0 { -1.0 } else { 1.0 };
            let point = inverse * Vec4::new(x, y, z, 1.0);
            if point.w.abs() <= f32::EPSILON {
                return None;
            }
            *corner = point.xyz() / point.w;
        }
        Some(corners)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::perspective("camera", 60.0, 16.0 / 9.0, 0.1, 1000.0)
    }
}

/// Audio listener
#[derive(Debug)]
pub struct Microphone {
    name: String,
    world: RwLock<Transform>,
}

impl Microphone {
    /// Create a microphone
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            world: RwLock::new(Transform::identity()),
        }
    }

    /// Component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last world transform pushed by the owning entity
    pub fn world(&self) -> Transform {
        *self.world.read()
    }

    pub(crate) fn set_world(&self, world: &Transform) {
        *self.world.write() = *world;
    }
}

/// One slice of a cascaded shadow map
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cascade {
    /// View distance where the slice starts
    pub near: f32,
    /// View distance where the slice ends
    pub far: f32,
    /// Radius of the bounding sphere of the slice
    pub radius: f32,
    /// Light orthographic projection times light view
    pub view_projection: Mat4,
}

/// Sun-like light with shadow cascades
#[derive(Debug)]
pub struct DirectionalLight {
    color: Vec3,
    intensity: f32,
    casts_shadows: bool,
    direction: RwLock<Vec3>,
    cascades: RwLock<Vec<Cascade>>,
}

impl DirectionalLight {
    /// Create a directional light, its direction follows the owning entity
    pub fn new(color: Vec3, intensity: f32, casts_shadows: bool) -> Self {
        Self {
            color,
            intensity,
            casts_shadows,
            direction: RwLock::new(-Vec3::z()),
            cascades: RwLock::new(Vec::new()),
        }
    }

    /// Light color
    pub const fn color(&self) -> Vec3 {
        self.color
    }

    /// Light intensity
    pub const fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Whether cascades are computed for this light
    pub const fn casts_shadows(&self) -> bool {
        self.casts_shadows
    }

    /// Normalized travel direction of the light
    pub fn direction(&self) -> Vec3 {
        *self.direction.read()
    }

    /// Cascades computed during the last logic cycle
    pub fn cascades(&self) -> Vec<Cascade> {
        self.cascades.read().clone()
    }

    pub(crate) fn set_cascades(&self, cascades: Vec<Cascade>) {
        *self.cascades.write() = cascades;
    }

    fn sync(&self, world: &Transform) {
        let forward = world.forward();
        if let Some(direction) = forward.try_normalize(f32::EPSILON) {
            *self.direction.write() = direction;
        }
    }
}

/// Omnidirectional light
#[derive(Debug)]
pub struct PointLight {
    color: Vec3,
    intensity: f32,
    radius: f32,
    position: RwLock<Vec3>,
}

impl PointLight {
    /// Create a point light
    pub fn new(color: Vec3, intensity: f32, radius: f32) -> Self {
        Self {
            color,
            intensity,
            radius,
            position: RwLock::new(Vec3::zeros()),
        }
    }

    /// Light color
    pub const fn color(&self) -> Vec3 {
        self.color
    }

    /// Light intensity
    pub const fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Influence radius
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        *self.position.read()
    }
}

/// Cone light
#[derive(Debug)]
pub struct SpotLight {
    color: Vec3,
    intensity: f32,
    radius: f32,
    inner_angle: f32,
    outer_angle: f32,
    position: RwLock<Vec3>,
    direction: RwLock<Vec3>,
}

impl SpotLight {
    /// Create a spot light, cone angles in degrees
    pub fn new(color: Vec3, intensity: f32, radius: f32, inner_degrees: f32, outer_degrees: f32) -> Self {
        Self {
            color,
            intensity,
            radius,
            inner_angle: utils::deg_to_rad(inner_degrees),
            outer_angle: utils::deg_to_rad(outer_degrees.max(inner_degrees)),
            position: RwLock::new(Vec3::zeros()),
            direction: RwLock::new(-Vec3::z()),
        }
    }

    /// Light color
    pub const fn color(&self) -> Vec3 {
        self.color
    }

    /// Light intensity
    pub const fn intensity(&self) -> f32 {
        self.intensity
    }

    /// Influence radius
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Inner and outer cone half-angles in radians
    pub const fn cone(&self) -> (f32, f32) {
        (self.inner_angle, self.outer_angle)
    }

    /// World position
    pub fn position(&self) -> Vec3 {
        *self.position.read()
    }

    /// Normalized world direction
    pub fn direction(&self) -> Vec3 {
        *self.direction.read()
    }
}

/// Any light component
#[derive(Debug, Clone)]
pub enum Light {
    /// Directional light
    Directional(Arc<DirectionalLight>),
    /// Point light
    Point(Arc<PointLight>),
    /// Spot light
    Spot(Arc<SpotLight>),
}

impl Light {
    /// Check if both values refer to the same light instance
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Directional(a), Self::Directional(b)) => Arc::ptr_eq(a, b),
            (Self::Point(a), Self::Point(b)) => Arc::ptr_eq(a, b),
            (Self::Spot(a), Self::Spot(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Push the owning entity's world transform
    pub(crate) fn sync(&self, world: &Transform) {
        match self {
            Self::Directional(light) => light.sync(world),
            Self::Point(light) => *light.position.write() = world.position,
            Self::Spot(light) => {
                *light.position.write() = world.position;
                if let Some(direction) = world.forward().try_normalize(f32::EPSILON) {
                    *light.direction.write() = direction;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_frustum_corners_at_requested_depths() {
        let camera = Camera::perspective("main", 90.0, 1.0, 0.1, 100.0);
        camera.set_world(&Transform::from_position(Vec3::new(0.0, 0.0, 10.0)));

        let corners = camera.frustum_corners(1.0, 5.0).unwrap();

        for corner in &corners[..4] {
            assert_relative_eq!(corner.z, 9.0, epsilon = 1e-3);
        }
        for corner in &corners[4..] {
            assert_relative_eq!(corner.z, 5.0, epsilon = 1e-3);
            assert_relative_eq!(corner.x.abs(), 5.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_light_identity() {
        let sun = Arc::new(DirectionalLight::new(Vec3::repeat(1.0), 1.0, true));
        let a = Light::Directional(Arc::clone(&sun));
        let b = Light::Directional(sun);
        let c = Light::Directional(Arc::new(DirectionalLight::new(Vec3::repeat(1.0), 1.0, true)));

        assert!(a.same_as(&b));
        assert!(!a.same_as(&c));
    }

    #[test]
    fn test_spot_light_follows_transform() {
        let spot = Arc::new(SpotLight::new(Vec3::repeat(1.0), 2.0, 10.0, 20.0, 30.0));
        let light = Light::Spot(Arc::clone(&spot));
        let world = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));

        light.sync(&world);

        assert_eq!(spot.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_relative_eq!(spot.direction(), -Vec3::z());
    }
}
