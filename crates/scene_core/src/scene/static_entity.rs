//! Non-hierarchical entities
//!
//! A static entity has no parent and no children: its transform is its world
//! transform. The scene keeps them in a name-keyed registry and shares each
//! one with the caller through an `Arc`.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::events::{NotificationBus, Producer, ProducerKind};
use crate::foundation::math::{Quat, Transform, Unit, Vec3};
use crate::scene::entity::{AbstractEntity, Emitter, EntityCore, EntityId};

/// Mutable state of a static entity
#[derive(Debug)]
pub struct StaticBody {
    core: EntityCore,
}

impl StaticBody {
    /// Replace the whole transform
    pub fn set_transform(&mut self, transform: Transform) {
        self.core.set_world(transform);
    }

    /// Move to a world position
    pub fn set_position(&mut self, position: Vec3) {
        let mut world = *self.core.world();
        world.position = position;
        self.core.set_world(world);
    }

    /// Move by a world offset
    pub fn translate(&mut self, delta: Vec3) {
        let mut world = *self.core.world();
        world.position += delta;
        self.core.set_world(world);
    }

    /// Rotate around a world axis
    pub fn rotate(&mut self, axis: &Unit<Vec3>, angle: f32) {
        let mut world = *self.core.world();
        world.rotation = Quat::from_axis_angle(axis, angle) * world.rotation;
        self.core.set_world(world);
    }

    /// Set a uniform scale
    pub fn set_scale(&mut self, factor: f32) {
        let mut world = *self.core.world();
        world.scale = Vec3::repeat(factor);
        self.core.set_world(world);
    }
}

impl AbstractEntity for StaticBody {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }
}

/// Entity of the static registry
///
/// Component notifications fire while the body lock is held, so an observer
/// must not lock the emitting entity again.
#[derive(Debug)]
pub struct StaticEntity {
    name: String,
    producer: Producer,
    body: Mutex<StaticBody>,
}

impl StaticEntity {
    /// Create an entity with its own producer on `bus`
    pub fn new(name: impl Into<String>, bus: Arc<NotificationBus>) -> Self {
        let name = name.into();
        let producer = bus.register_producer(ProducerKind::StaticEntity);
        let core = EntityCore::new(
            EntityId::Static(producer.id()),
            name.clone(),
            Transform::identity(),
            Emitter::new(bus, producer),
        );

        Self {
            name,
            producer,
            body: Mutex::new(StaticBody { core }),
        }
    }

    /// Registry name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity in the octrees
    pub const fn id(&self) -> EntityId {
        EntityId::Static(self.producer.id())
    }

    /// Producer of the component notifications
    pub const fn producer(&self) -> Producer {
        self.producer
    }

    /// Lock the entity state
    pub fn body(&self) -> MutexGuard<'_, StaticBody> {
        self.body.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::time::CycleClock;
    use approx::assert_relative_eq;

    #[test]
    fn test_static_entity_identity() {
        let bus = Arc::new(NotificationBus::new());
        let a = StaticEntity::new("a", Arc::clone(&bus));
        let b = StaticEntity::new("b", bus);

        assert_ne!(a.id(), b.id());
        assert_eq!(a.body().id(), a.id());
        assert_eq!(a.producer().kind(), ProducerKind::StaticEntity);
        assert_eq!(a.body().name(), "a");
    }

    #[test]
    fn test_moves_flag_placement() {
        let bus = Arc::new(NotificationBus::new());
        let entity = StaticEntity::new("crate", bus);
        let clock = CycleClock::new(1000);
        let mut body = entity.body();
        assert!(body.process_logics(&clock));
        assert!(!body.process_logics(&clock));

        body.set_position(Vec3::new(1.0, 0.0, 0.0));
        body.translate(Vec3::new(0.0, 2.0, 0.0));
        body.rotate(&Vec3::z_axis(), 0.5);
        body.set_scale(3.0);

        assert!(body.process_logics(&clock));
        assert_relative_eq!(body.world_coordinates().position, Vec3::new(1.0, 2.0, 0.0));
        assert_relative_eq!(body.world_coordinates().scale, Vec3::repeat(3.0));
    }
}
