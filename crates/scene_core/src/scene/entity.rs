//! Entity base shared by nodes and static entities
//!
//! [`EntityCore`] holds what every placeable object has: identity, flags,
//! the cached world transform, an optional collision model and the
//! components. Attaching or detaching a camera, microphone or light
//! publishes a notification through the entity's producer.

use std::sync::Arc;

use bitflags::bitflags;

use crate::events::{Notification, NotificationBus, Producer};
use crate::foundation::math::Transform;
use crate::foundation::time::CycleClock;
use crate::scene::collision_model::{CollisionModel, Renderable};
use crate::scene::components::{Camera, Light, Microphone};
use crate::scene::node::NodeKey;
use crate::spatial::AABB;

/// Identity of an entity across both octrees
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    /// Member of the node tree
    Node(NodeKey),
    /// Static entity, keyed by its producer id
    Static(u64),
}

bitflags! {
    /// Entity state bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EntityFlags: u32 {
        /// Placement must be re-checked at the next logic cycle
        const LOCATION_DIRTY = 1 << 0;
        /// Collision model ignored, entity kept out of the physics octree
        const COLLISION_DISABLED = 1 << 1;
        /// Entity will be removed by the next tree trim
        const DISCARDABLE = 1 << 2;
        /// Visual components ignored, entity kept out of the rendering octree
        const INVISIBLE = 1 << 3;
    }
}

/// Bus endpoint of an entity
#[derive(Debug, Clone)]
pub struct Emitter {
    bus: Arc<NotificationBus>,
    producer: Producer,
}

impl Emitter {
    /// Bind a producer to its bus
    pub const fn new(bus: Arc<NotificationBus>, producer: Producer) -> Self {
        Self { bus, producer }
    }

    /// Producer identity
    pub const fn producer(&self) -> Producer {
        self.producer
    }

    /// Publish a notification synchronously
    pub fn emit(&self, notification: &Notification) -> usize {
        self.bus.notify(&self.producer, notification)
    }
}

/// Payload of a component
#[derive(Debug, Clone)]
pub enum ComponentKind {
    /// Camera, routed to the AV console as a video device
    Camera {
        /// The camera
        camera: Arc<Camera>,
        /// Requested as the primary video device
        primary: bool,
    },
    /// Microphone, routed to the AV console as an audio device
    Microphone {
        /// The microphone
        microphone: Arc<Microphone>,
        /// Requested as the primary audio device
        primary: bool,
    },
    /// Light, registered in the scene light set
    Light(Light),
    /// Drawable, makes the entity renderable
    Visual(Arc<dyn Renderable>),
}

/// Named component attached to an entity
#[derive(Debug, Clone)]
pub struct Component {
    name: String,
    kind: ComponentKind,
    expired: bool,
}

impl Component {
    /// Component name, unique per entity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Component payload
    pub const fn kind(&self) -> &ComponentKind {
        &self.kind
    }

    /// Whether the component asked to be removed at the next logic tick
    pub const fn should_be_removed(&self) -> bool {
        self.expired
    }

    /// Notification announcing this component, `None` for silent kinds
    pub fn created_notification(&self, entity: EntityId) -> Option<Notification> {
        match &self.kind {
            ComponentKind::Camera { camera, primary: true } => Some(Notification::PrimaryCameraCreated {
                entity,
                camera: Arc::clone(camera),
            }),
            ComponentKind::Camera { camera, primary: false } => Some(Notification::CameraCreated {
                entity,
                camera: Arc::clone(camera),
            }),
            ComponentKind::Microphone { microphone, primary: true } => {
                Some(Notification::PrimaryMicrophoneCreated {
                    entity,
                    microphone: Arc::clone(microphone),
                })
            }
            ComponentKind::Microphone { microphone, primary: false } => Some(Notification::MicrophoneCreated {
                entity,
                microphone: Arc::clone(microphone),
            }),
            ComponentKind::Light(light) => Some(Notification::LightCreated {
                entity,
                light: light.clone(),
            }),
            ComponentKind::Visual(_) => None,
        }
    }

    /// Notification announcing the removal of this component
    pub fn destroyed_notification(&self, entity: EntityId) -> Option<Notification> {
        match &self.kind {
            ComponentKind::Camera { camera, .. } => Some(Notification::CameraDestroyed {
                entity,
                camera: Arc::clone(camera),
            }),
            ComponentKind::Microphone { microphone, .. } => Some(Notification::MicrophoneDestroyed {
                entity,
                microphone: Arc::clone(microphone),
            }),
            ComponentKind::Light(light) => Some(Notification::LightDestroyed {
                entity,
                light: light.clone(),
            }),
            ComponentKind::Visual(_) => None,
        }
    }

    fn sync(&self, world: &Transform) {
        match &self.kind {
            ComponentKind::Camera { camera, .. } => camera.set_world(world),
            ComponentKind::Microphone { microphone, .. } => microphone.set_world(world),
            ComponentKind::Light(light) => light.sync(world),
            ComponentKind::Visual(_) => {}
        }
    }
}

/// State shared by every entity variant
#[derive(Debug)]
pub struct EntityCore {
    id: EntityId,
    name: String,
    flags: EntityFlags,
    world: Transform,
    collision_model: Option<Arc<dyn CollisionModel>>,
    components: Vec<Component>,
    last_moved_cycle: Option<u64>,
    emitter: Emitter,
}

impl EntityCore {
    /// Create a core, flagged for a first placement check
    pub fn new(id: EntityId, name: impl Into<String>, world: Transform, emitter: Emitter) -> Self {
        Self {
            id,
            name: name.into(),
            flags: EntityFlags::LOCATION_DIRTY,
            world,
            collision_model: None,
            components: Vec::new(),
            last_moved_cycle: None,
            emitter,
        }
    }

    /// Entity identity
    pub const fn id(&self) -> EntityId {
        self.id
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current flags
    pub const fn flags(&self) -> EntityFlags {
        self.flags
    }

    /// Check a flag
    pub const fn is_flag_enabled(&self, flag: EntityFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Cached world transform
    pub const fn world(&self) -> &Transform {
        &self.world
    }

    /// Cycle of the last placement change
    pub const fn last_moved_cycle(&self) -> Option<u64> {
        self.last_moved_cycle
    }

    /// Producer used for component notifications
    pub const fn producer(&self) -> Producer {
        self.emitter.producer()
    }

    /// Collision model, if any
    pub const fn collision_model(&self) -> Option<&Arc<dyn CollisionModel>> {
        self.collision_model.as_ref()
    }

    /// Replace the collision model
    pub fn set_collision_model(&mut self, model: Option<Arc<dyn CollisionModel>>) {
        self.collision_model = model;
        self.mark_location_dirty();
    }

    /// Toggle collision handling
    pub fn enable_collisions(&mut self, enabled: bool) {
        self.flags.set(EntityFlags::COLLISION_DISABLED, !enabled);
        self.mark_location_dirty();
    }

    /// Toggle rendering
    pub fn set_visible(&mut self, visible: bool) {
        self.flags.set(EntityFlags::INVISIBLE, !visible);
        self.mark_location_dirty();
    }

    /// Attached components
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Find a component by name
    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|component| component.name == name)
    }

    /// Attach a drawable
    pub fn add_visual(&mut self, name: impl Into<String>, visual: Arc<dyn Renderable>) -> bool {
        self.attach(name.into(), ComponentKind::Visual(visual))
    }

    /// Attach a camera, returns the shared handle
    pub fn add_camera(&mut self, name: impl Into<String>, camera: Camera, primary: bool) -> Option<Arc<Camera>> {
        let camera = Arc::new(camera);
        self.attach(name.into(), ComponentKind::Camera {
            camera: Arc::clone(&camera),
            primary,
        })
        .then_some(camera)
    }

    /// Attach a microphone, returns the shared handle
    pub fn add_microphone(
        &mut self,
        name: impl Into<String>,
        microphone: Microphone,
        primary: bool,
    ) -> Option<Arc<Microphone>> {
        let microphone = Arc::new(microphone);
        self.attach(name.into(), ComponentKind::Microphone {
            microphone: Arc::clone(&microphone),
            primary,
        })
        .then_some(microphone)
    }

    /// Attach a light
    pub fn add_light(&mut self, name: impl Into<String>, light: Light) -> bool {
        self.attach(name.into(), ComponentKind::Light(light))
    }

    /// Detach a component immediately
    pub fn remove_component(&mut self, name: &str) -> bool {
        let Some(index) = self.components.iter().position(|component| component.name == name) else {
            return false;
        };
        let component = self.components.remove(index);
        self.announce_removal(&component);
        true
    }

    /// Ask for a component to be detached at the next logic tick
    pub fn request_component_removal(&mut self, name: &str) -> bool {
        match self.components.iter_mut().find(|component| component.name == name) {
            Some(component) => {
                component.expired = true;
                true
            }
            None => false,
        }
    }

    /// Detach every component, announcing each removal
    pub fn clear_components(&mut self) {
        for component in std::mem::take(&mut self.components) {
            self.announce_removal(&component);
        }
        self.mark_location_dirty();
    }

    /// Detach every component without any notification
    pub(crate) fn take_components(&mut self) -> Vec<Component> {
        std::mem::take(&mut self.components)
    }

    pub(crate) fn set_flag(&mut self, flag: EntityFlags, enabled: bool) {
        self.flags.set(flag, enabled);
    }

    pub(crate) fn set_world(&mut self, world: Transform) {
        self.world = world;
        self.mark_location_dirty();
    }

    /// Request a placement re-check at the next logic cycle
    ///
    /// Needed when a visual or collision model changes its bounds or its
    /// readiness without going through the entity.
    pub fn mark_location_dirty(&mut self) {
        self.flags.insert(EntityFlags::LOCATION_DIRTY);
    }

    fn attach(&mut self, name: String, kind: ComponentKind) -> bool {
        if self.component(&name).is_some() {
            log::warn!("Entity '{}': a component named '{name}' already exists", self.name);
            return false;
        }

        let component = Component {
            name,
            kind,
            expired: false,
        };
        component.sync(&self.world);
        let notification = component.created_notification(self.id);
        self.components.push(component);
        self.mark_location_dirty();

        if let Some(notification) = notification {
            self.emitter.emit(&notification);
        }
        true
    }

    fn announce_removal(&self, component: &Component) {
        log::debug!("Entity '{}': removing component '{}'", self.name, component.name);
        if let Some(notification) = component.destroyed_notification(self.id) {
            self.emitter.emit(&notification);
        }
    }

    fn remove_expired_components(&mut self) {
        if !self.components.iter().any(Component::should_be_removed) {
            return;
        }

        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.components)
            .into_iter()
            .partition(Component::should_be_removed);
        self.components = kept;

        for component in &expired {
            log::warn!(
                "Entity '{}': removing automatically component '{}'",
                self.name,
                component.name
            );
            self.announce_removal(component);
        }
        self.mark_location_dirty();
    }

    fn sync_components(&self) {
        for component in &self.components {
            component.sync(&self.world);
        }
    }

    fn render_bounds(&self) -> Option<AABB> {
        if self.flags.contains(EntityFlags::INVISIBLE) {
            return None;
        }
        self.components
            .iter()
            .filter_map(|component| match &component.kind {
                ComponentKind::Visual(visual) if visual.is_ready() => Some(visual.local_bounding_box()),
                _ => None,
            })
            .map(|local| local.transformed(&self.world))
            .reduce(|a, b| a.merged(&b))
    }
}

/// Capability shared by every placeable object of a scene
pub trait AbstractEntity {
    /// Shared state
    fn core(&self) -> &EntityCore;

    /// Shared state, mutable
    fn core_mut(&mut self) -> &mut EntityCore;

    /// Variant-specific work done once per logic cycle
    fn on_process_logics(&mut self, _clock: &CycleClock) {}

    /// Entity identity
    fn id(&self) -> EntityId {
        self.core().id()
    }

    /// Entity name
    fn name(&self) -> &str {
        self.core().name()
    }

    /// World transform
    fn world_coordinates(&self) -> &Transform {
        self.core().world()
    }

    /// Whether the entity belongs in the rendering octree
    fn is_renderable(&self) -> bool {
        !self.core().is_flag_enabled(EntityFlags::INVISIBLE)
            && self
                .core()
                .components()
                .iter()
                .any(|component| matches!(component.kind(), ComponentKind::Visual(_)))
    }

    /// Whether the entity belongs in the physics octree
    fn is_collidable(&self) -> bool {
        !self.core().is_flag_enabled(EntityFlags::COLLISION_DISABLED) && self.core().collision_model().is_some()
    }

    /// Collision model, if any
    fn collision_model(&self) -> Option<&Arc<dyn CollisionModel>> {
        self.core().collision_model()
    }

    /// World bounds of every visual component
    fn render_bounds(&self) -> Option<AABB> {
        self.core().render_bounds()
    }

    /// World bounds of the collision model, `None` when not collidable
    fn physics_bounds(&self) -> Option<AABB> {
        if !self.is_collidable() {
            return None;
        }
        self.collision_model()
            .map(|model| model.aabb(self.world_coordinates()))
    }

    /// Tick the entity and its components
    ///
    /// Returns true when the placement must be re-checked in the octrees.
    fn process_logics(&mut self, clock: &CycleClock) -> bool {
        self.core_mut().remove_expired_components();
        self.on_process_logics(clock);
        self.core().sync_components();

        let core = self.core_mut();
        if core.flags.contains(EntityFlags::LOCATION_DIRTY) {
            core.flags.remove(EntityFlags::LOCATION_DIRTY);
            core.last_moved_cycle = Some(clock.cycle());
            return true;
        }
        false
    }
}
