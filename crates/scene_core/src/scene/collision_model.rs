//! Capabilities consumed by the octrees
//!
//! The scene never looks at concrete shapes: a collidable entity exposes a
//! [`CollisionModel`] able to produce a world-space AABB, and a renderable
//! entity exposes one or more [`Renderable`] local bounding boxes.

use std::fmt::Debug;

use crate::foundation::math::{Transform, Vec3};
use crate::spatial::AABB;

/// Kind of collision model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionModelType {
    /// Single point, never enters the physics octree
    Point,
    /// Sphere
    Sphere,
    /// Axis-aligned box in local space
    AxisAlignedBox,
}

/// Collision capability of an entity
pub trait CollisionModel: Debug + Send + Sync {
    /// Model kind
    fn model_type(&self) -> CollisionModelType;

    /// World-space bounding box at the given placement
    fn aabb(&self, world: &Transform) -> AABB;

    /// Radius of a sphere enclosing the model in local space
    fn radius(&self) -> f32;
}

/// Point collision model
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointModel;

impl CollisionModel for PointModel {
    fn model_type(&self) -> CollisionModelType {
        CollisionModelType::Point
    }

    fn aabb(&self, world: &Transform) -> AABB {
        AABB::new(world.position, world.position)
    }

    fn radius(&self) -> f32 {
        0.0
    }
}

/// Sphere collision model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereModel {
    radius: f32,
}

impl SphereModel {
    /// Sphere of the given local radius
    pub const fn new(radius: f32) -> Self {
        Self { radius }
    }
}

impl CollisionModel for SphereModel {
    fn model_type(&self) -> CollisionModelType {
        CollisionModelType::Sphere
    }

    fn aabb(&self, world: &Transform) -> AABB {
        let scale = world.scale.abs().max();
        AABB::from_center_extents(world.position, Vec3::repeat(self.radius * scale))
    }

    fn radius(&self) -> f32 {
        self.radius
    }
}

/// Box collision model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxModel {
    local: AABB,
}

impl BoxModel {
    /// Box from local-space bounds
    pub const fn new(local: AABB) -> Self {
        Self { local }
    }

    /// Box centered on the local origin
    pub fn from_half_extents(half_extents: Vec3) -> Self {
        Self::new(AABB::from_center_extents(Vec3::zeros(), half_extents))
    }
}

impl CollisionModel for BoxModel {
    fn model_type(&self) -> CollisionModelType {
        CollisionModelType::AxisAlignedBox
    }

    fn aabb(&self, world: &Transform) -> AABB {
        self.local.transformed(world)
    }

    fn radius(&self) -> f32 {
        self.local.min.norm().max(self.local.max.norm())
    }
}

/// Render capability of a component
pub trait Renderable: Debug + Send + Sync {
    /// Bounding box in the owning entity's local space
    fn local_bounding_box(&self) -> AABB;

    /// Whether the resource is ready to be drawn
    fn is_ready(&self) -> bool {
        true
    }
}

/// Renderable known only by its bounds, e.g. a mesh loaded elsewhere
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedVisual {
    label: String,
    bounds: AABB,
}

impl BoundedVisual {
    /// Create a visual with local bounds
    pub fn new(label: impl Into<String>, bounds: AABB) -> Self {
        Self {
            label: label.into(),
            bounds,
        }
    }

    /// Cube visual of the given half size
    pub fn cube(label: impl Into<String>, half_size: f32) -> Self {
        Self::new(label, AABB::cube(half_size))
    }

    /// Resource label
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Renderable for BoundedVisual {
    fn local_bounding_box(&self) -> AABB {
        self.bounds
    }
}
