//! Scene - owner of the spatial state and the per-cycle synchronization
//!
//! A scene owns two octrees (rendering and physics), the node tree, the
//! static entity registry, the AV console and the light set. It listens to
//! every producer it creates and keeps the octrees consistent with the
//! entities once per logic cycle.
//!
//! ## Cycle
//!
//! ```text
//! advance clock
//!   → ground level window (primary camera)
//!   → physics pass
//!   → node controller inputs
//!   → static entities tick + placement
//!   → node tree crawl + placement, then trim
//!   → shadow cascades
//!   → ambience tick
//!   → next cycle
//! ```
//!
//! ## Locking
//!
//! Every field has its own lock. The node tree or the static registry may
//! be held while an octree, the controller, the AV console or the light set
//! is locked, never the other way around. Notifications fired under the
//! tree lock only reach handlers that stay on the right side of this order.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::config::{ConfigError, SceneConfig};
use crate::events::{Notification, NotificationBus, Producer, ProducerKind};
use crate::foundation::math::{Transform, Vec3};
use crate::foundation::time::CycleClock;
use crate::scene::av_console::AvConsoleManager;
use crate::scene::components::{Camera, Microphone};
use crate::scene::controller::{ControlInput, NodeController};
use crate::scene::entity::{AbstractEntity, EntityId};
use crate::scene::lighting::LightSet;
use crate::scene::node::{NodeCrawler, NodeError, NodeKey, NodeTree};
use crate::scene::static_entity::StaticEntity;
use crate::spatial::{Octree, OctreeConfig, AABB};

/// Scene construction and reconfiguration errors
#[derive(thiserror::Error, Debug)]
pub enum SceneError {
    /// The world boundary must be a positive finite value
    #[error("invalid world boundary {0}, it must be positive")]
    InvalidBoundary(f32),

    /// Invalid settings
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Node tree mutation failed
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Terrain visibility window following the viewer
pub trait GroundLevel: Send + Sync {
    /// Move the visible window around `position`
    fn update_visibility(&self, position: &Vec3);
}

/// Physics pass run once per cycle before the placement checks
pub trait PhysicsStep: Send + Sync {
    /// Integrate the node tree over `delta_secs`
    fn step(&self, tree: &mut NodeTree, delta_secs: f32);
}

/// Background audio
pub trait Ambience: Send + Sync {
    /// Whether the ambience must be ticked
    fn is_playing(&self) -> bool;

    /// Tick by one cycle
    fn update(&self, cycle_duration_us: u64);
}

#[derive(Default, Clone)]
struct Collaborators {
    ground_level: Option<Arc<dyn GroundLevel>>,
    physics: Option<Arc<dyn PhysicsStep>>,
    ambience: Option<Arc<dyn Ambience>>,
}

/// Snapshot of the scene counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneStats {
    /// Completed logic cycles
    pub cycle: u64,
    /// Accumulated logic time in microseconds
    pub lifetime_us: u64,
    /// Nodes, root included
    pub node_count: usize,
    /// Registered static entities
    pub static_entity_count: usize,
    /// Elements of the rendering octree
    pub rendering_elements: usize,
    /// Sectors of the rendering octree
    pub rendering_sectors: usize,
    /// Elements of the physics octree
    pub physics_elements: usize,
    /// Sectors of the physics octree
    pub physics_sectors: usize,
    /// Registered lights
    pub light_count: usize,
}

struct SceneInner {
    name: String,
    bus: Arc<NotificationBus>,
    config: RwLock<SceneConfig>,
    enabled: AtomicBool,
    clock: Mutex<CycleClock>,
    rendering_octree: Mutex<Octree<EntityId>>,
    physics_octree: Mutex<Octree<EntityId>>,
    node_tree: Mutex<NodeTree>,
    static_entities: Mutex<BTreeMap<String, Arc<StaticEntity>>>,
    node_controller: Mutex<NodeController>,
    av_console: AvConsoleManager,
    light_set: Mutex<LightSet>,
    primary_camera: RwLock<Option<Arc<Camera>>>,
    primary_microphone: RwLock<Option<Arc<Microphone>>>,
    collaborators: Mutex<Collaborators>,
}

/// Scene orchestrator
///
/// Cloning a `Scene` shares it.
#[derive(Clone)]
pub struct Scene {
    inner: Arc<SceneInner>,
}

fn check_boundary(boundary: f32) -> Result<(), SceneError> {
    if boundary.is_finite() && boundary > 0.0 {
        Ok(())
    } else {
        log::error!("Scene: the world boundary {boundary} is invalid, octrees can't be built");
        Err(SceneError::InvalidBoundary(boundary))
    }
}

impl Scene {
    /// Create a scene with empty octrees and a lone root node
    pub fn new(name: impl Into<String>, config: SceneConfig) -> Result<Self, SceneError> {
        let name = name.into();
        config.validate()?;
        check_boundary(config.boundary)?;

        let bus = Arc::new(NotificationBus::new());
        let inner = Arc::new(SceneInner {
            rendering_octree: Mutex::new(Octree::with_boundary(config.boundary, config.rendering.clone())),
            physics_octree: Mutex::new(Octree::with_boundary(config.boundary, config.physics.clone())),
            clock: Mutex::new(CycleClock::new(config.cycle_duration_us)),
            node_tree: Mutex::new(NodeTree::new(Arc::clone(&bus))),
            av_console: AvConsoleManager::new(Arc::clone(&bus)),
            name,
            bus,
            config: RwLock::new(config),
            enabled: AtomicBool::new(true),
            static_entities: Mutex::new(BTreeMap::new()),
            node_controller: Mutex::new(NodeController::new()),
            light_set: Mutex::new(LightSet::new()),
            primary_camera: RwLock::new(None),
            primary_microphone: RwLock::new(None),
            collaborators: Mutex::new(Collaborators::default()),
        });

        let tree_producer = inner.node_tree.lock().producer();
        inner.subscribe(tree_producer);
        inner.subscribe(inner.av_console.producer());

        log::info!("Scene '{}' created", inner.name);
        Ok(Self { inner })
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Bus shared by every producer of the scene
    pub fn bus(&self) -> &Arc<NotificationBus> {
        &self.inner.bus
    }

    /// Copy of the active settings
    pub fn config(&self) -> SceneConfig {
        self.inner.config.read().clone()
    }

    /// Resume logic cycles and input
    pub fn enable(&self) {
        self.inner.enabled.store(true, Ordering::Release);
    }

    /// Suspend logic cycles and input, a running cycle completes
    pub fn disable(&self) {
        self.inner.enabled.store(false, Ordering::Release);
    }

    /// Whether cycles run
    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    /// Run one logic cycle
    ///
    /// Returns false when the scene is disabled and nothing ran.
    pub fn process_logics(&self) -> bool {
        self.inner.process_logics()
    }

    // Static entities

    /// Create and register a static entity
    ///
    /// An entity already registered under `name` is replaced and removed.
    pub fn create_static_entity(&self, name: &str) -> Arc<StaticEntity> {
        let entity = Arc::new(StaticEntity::new(name, Arc::clone(&self.inner.bus)));
        self.inner.subscribe(entity.producer());

        let replaced = self
            .inner
            .static_entities
            .lock()
            .insert(name.to_string(), Arc::clone(&entity));
        if let Some(previous) = replaced {
            log::warn!("Scene '{}': static entity '{name}' already exists, replacing it", self.inner.name);
            self.inner.dispose_static_entity(&previous);
        }

        entity
    }

    /// Find a static entity by name
    pub fn find_static_entity(&self, name: &str) -> Option<Arc<StaticEntity>> {
        self.inner.static_entities.lock().get(name).cloned()
    }

    /// Unregister a static entity and detach its components
    pub fn remove_static_entity(&self, name: &str) -> bool {
        let Some(entity) = self.find_static_entity(name) else {
            log::debug!("Scene '{}': no static entity named '{name}'", self.inner.name);
            return false;
        };

        // The entry stays registered until the disposal completes.
        self.inner.dispose_static_entity(&entity);

        let mut entities = self.inner.static_entities.lock();
        if entities.get(name).is_some_and(|current| Arc::ptr_eq(current, &entity)) {
            entities.remove(name);
        }
        true
    }

    /// Number of registered static entities
    pub fn static_entity_count(&self) -> usize {
        self.inner.static_entities.lock().len()
    }

    // Node tree

    /// Root node key
    pub fn root(&self) -> NodeKey {
        self.inner.node_tree.lock().root()
    }

    /// Create a node under `parent`
    pub fn create_node(&self, parent: NodeKey, name: &str, local: Transform) -> Result<NodeKey, SceneError> {
        Ok(self.inner.node_tree.lock().create_child(parent, name, local)?)
    }

    /// Schedule a node subtree for removal at the end of the next cycle
    pub fn discard_node(&self, key: NodeKey) -> Result<(), SceneError> {
        Ok(self.inner.node_tree.lock().discard(key)?)
    }

    /// Run `f` with exclusive access to the node tree
    ///
    /// `f` must not call back into the scene node tree.
    pub fn with_node_tree<R>(&self, f: impl FnOnce(&mut NodeTree) -> R) -> R {
        f(&mut self.inner.node_tree.lock())
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.inner.node_tree.lock().node_count()
    }

    // Node controller

    /// Drive a node from user input
    pub fn attach_node_controller(&self, key: NodeKey) -> Result<(), SceneError> {
        let tree = self.inner.node_tree.lock();
        if !tree.contains(key) {
            return Err(NodeError::StaleKey.into());
        }
        self.inner.node_controller.lock().attach(key);
        Ok(())
    }

    /// Stop driving any node
    pub fn release_node_controller(&self) -> Option<NodeKey> {
        self.inner.node_controller.lock().release()
    }

    /// Node currently driven by the controller
    pub fn controlled_node(&self) -> Option<NodeKey> {
        self.inner.node_controller.lock().controlled()
    }

    /// Queue an input for the controlled node
    ///
    /// Ignored while the scene is disabled or no node is attached.
    pub fn push_control_input(&self, input: ControlInput) -> bool {
        if !self.is_enabled() {
            log::trace!("Scene '{}': input ignored, the scene is disabled", self.inner.name);
            return false;
        }
        self.inner.node_controller.lock().push(input)
    }

    // Octrees

    /// Whether a world position lies inside the scene boundary
    pub fn contains(&self, position: &Vec3) -> bool {
        let boundary = self.inner.config.read().boundary;
        position.iter().all(|value| value.abs() <= boundary)
    }

    /// Change the world boundary and rebuild both octrees
    pub fn set_boundary(&self, boundary: f32, keep_elements: bool) -> Result<(), SceneError> {
        check_boundary(boundary)?;
        self.inner.config.write().boundary = boundary;
        self.rebuild_rendering_octree(keep_elements)?;
        self.rebuild_physics_octree(keep_elements)
    }

    /// Replace both octree settings and rebuild the octrees
    pub fn reconfigure_octrees(
        &self,
        rendering: OctreeConfig,
        physics: OctreeConfig,
        keep_elements: bool,
    ) -> Result<(), SceneError> {
        rendering.validate()?;
        physics.validate()?;
        {
            let mut config = self.inner.config.write();
            config.rendering = rendering;
            config.physics = physics;
        }
        self.rebuild_rendering_octree(keep_elements)?;
        self.rebuild_physics_octree(keep_elements)
    }

    /// Rebuild the rendering octree from the current settings
    pub fn rebuild_rendering_octree(&self, keep_elements: bool) -> Result<(), SceneError> {
        let (boundary, config) = {
            let config = self.inner.config.read();
            (config.boundary, config.rendering.clone())
        };
        rebuild_octree("rendering", &self.inner.rendering_octree, boundary, config, keep_elements)
    }

    /// Rebuild the physics octree from the current settings
    pub fn rebuild_physics_octree(&self, keep_elements: bool) -> Result<(), SceneError> {
        let (boundary, config) = {
            let config = self.inner.config.read();
            (config.boundary, config.physics.clone())
        };
        rebuild_octree("physics", &self.inner.physics_octree, boundary, config, keep_elements)
    }

    /// Refresh the octree placement of an entity
    ///
    /// Returns false while the entity is renderable without a ready visual or
    /// collidable without a usable volume. The cycle keeps such entities
    /// flagged so the check runs again at the next one.
    pub fn check_entity_location_in_octrees<E>(&self, entity: &E) -> bool
    where
        E: AbstractEntity + ?Sized,
    {
        self.inner.check_entity_location_in_octrees(entity)
    }

    /// Entities whose render bounds overlap `region`
    pub fn query_rendering(&self, region: &AABB) -> Vec<EntityId> {
        self.inner.rendering_octree.lock().query_aabb(region)
    }

    /// Entities whose physics bounds overlap `region`
    pub fn query_physics(&self, region: &AABB) -> Vec<EntityId> {
        self.inner.physics_octree.lock().query_aabb(region)
    }

    /// Whether an entity is in the rendering octree
    pub fn is_in_rendering_octree(&self, id: EntityId) -> bool {
        self.inner.rendering_octree.lock().contains(&id)
    }

    /// Whether an entity is in the physics octree
    pub fn is_in_physics_octree(&self, id: EntityId) -> bool {
        self.inner.physics_octree.lock().contains(&id)
    }

    /// Number of elements in the rendering octree
    pub fn rendering_element_count(&self) -> usize {
        self.inner.rendering_octree.lock().element_count()
    }

    /// Number of elements in the physics octree
    pub fn physics_element_count(&self) -> usize {
        self.inner.physics_octree.lock().element_count()
    }

    // Devices and lights

    /// Device registry
    pub fn av_console(&self) -> &AvConsoleManager {
        &self.inner.av_console
    }

    /// Camera of the primary video device
    pub fn primary_camera(&self) -> Option<Arc<Camera>> {
        self.inner.primary_camera.read().clone()
    }

    /// Microphone of the primary audio device
    pub fn primary_microphone(&self) -> Option<Arc<Microphone>> {
        self.inner.primary_microphone.read().clone()
    }

    /// Run `f` with read access to the registered lights
    pub fn with_light_set<R>(&self, f: impl FnOnce(&LightSet) -> R) -> R {
        f(&self.inner.light_set.lock())
    }

    // Collaborators

    /// Install the ground level window updater
    pub fn set_ground_level(&self, ground_level: Option<Arc<dyn GroundLevel>>) {
        self.inner.collaborators.lock().ground_level = ground_level;
    }

    /// Install the physics pass
    pub fn set_physics_step(&self, physics: Option<Arc<dyn PhysicsStep>>) {
        self.inner.collaborators.lock().physics = physics;
    }

    /// Install the ambience
    pub fn set_ambience(&self, ambience: Option<Arc<dyn Ambience>>) {
        self.inner.collaborators.lock().ambience = ambience;
    }

    // Time and statistics

    /// Completed logic cycles
    pub fn cycle(&self) -> u64 {
        self.inner.clock.lock().cycle()
    }

    /// Accumulated logic time in microseconds
    pub fn lifetime_us(&self) -> u64 {
        self.inner.clock.lock().lifetime_us()
    }

    /// Accumulated logic time in milliseconds
    pub fn lifetime_ms(&self) -> u64 {
        self.inner.clock.lock().lifetime_ms()
    }

    /// Counters snapshot
    pub fn stats(&self) -> SceneStats {
        let clock = *self.inner.clock.lock();
        let node_count = self.inner.node_tree.lock().node_count();
        let static_entity_count = self.inner.static_entities.lock().len();
        let (rendering_elements, rendering_sectors) = {
            let octree = self.inner.rendering_octree.lock();
            (octree.element_count(), octree.sector_count())
        };
        let (physics_elements, physics_sectors) = {
            let octree = self.inner.physics_octree.lock();
            (octree.element_count(), octree.sector_count())
        };

        SceneStats {
            cycle: clock.cycle(),
            lifetime_us: clock.lifetime_us(),
            node_count,
            static_entity_count,
            rendering_elements,
            rendering_sectors,
            physics_elements,
            physics_sectors,
            light_count: self.inner.light_set.lock().len(),
        }
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("name", &self.inner.name)
            .field("enabled", &self.is_enabled())
            .field("stats", &self.stats())
            .finish()
    }
}

fn rebuild_octree(
    label: &str,
    octree: &Mutex<Octree<EntityId>>,
    boundary: f32,
    config: OctreeConfig,
    keep_elements: bool,
) -> Result<(), SceneError> {
    check_boundary(boundary)?;
    config.validate()?;

    let mut octree = octree.lock();
    let mut rebuilt = Octree::with_boundary(boundary, config);
    if keep_elements {
        for (element, aabb) in octree.iter() {
            if !rebuilt.insert(element, aabb) {
                log::debug!("Scene: {element:?} dropped by the {label} octree rebuild");
            }
        }
    }

    log::info!(
        "Scene: {label} octree rebuilt with boundary {boundary}, {} element(s) kept",
        rebuilt.element_count()
    );
    *octree = rebuilt;
    Ok(())
}

impl SceneInner {
    fn subscribe(self: &Arc<Self>, producer: Producer) {
        let scene: Weak<Self> = Arc::downgrade(self);
        self.bus.subscribe(producer, move |producer: &Producer, notification: &Notification| {
            scene
                .upgrade()
                .is_some_and(|scene| scene.on_notification(producer, notification))
        });
    }

    fn process_logics(&self) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }

        let clock = {
            let mut clock = self.clock.lock();
            clock.advance();
            *clock
        };
        let collaborators = self.collaborators.lock().clone();

        let primary_camera = self.primary_camera.read().clone();
        if let (Some(ground_level), Some(camera)) = (&collaborators.ground_level, &primary_camera) {
            ground_level.update_visibility(&camera.world_position());
        }

        if let Some(physics) = &collaborators.physics {
            physics.step(&mut self.node_tree.lock(), clock.cycle_duration_secs());
        }

        self.apply_control_inputs();
        self.update_static_entities(&clock);
        self.update_node_tree(&clock);

        // Components attached during the ticks may have changed the primary camera.
        let primary_camera = self.primary_camera.read().clone();
        if let Some(camera) = primary_camera {
            let shadow = self.config.read().shadow.clone();
            self.light_set.lock().update_cascades(&camera, &shadow);
        }

        if let Some(ambience) = &collaborators.ambience {
            if ambience.is_playing() {
                ambience.update(clock.cycle_duration_us());
            }
        }

        self.clock.lock().next_cycle();
        true
    }

    fn apply_control_inputs(&self) {
        let Some((key, inputs)) = self.node_controller.lock().take_pending() else {
            return;
        };

        let mut tree = self.node_tree.lock();
        for input in &inputs {
            if let Err(error) = input.apply(&mut tree, key) {
                log::warn!("Scene '{}': controller input dropped, {error}", self.name);
                self.node_controller.lock().release_node(key);
                return;
            }
        }
    }

    fn update_static_entities(&self, clock: &CycleClock) {
        let entities = self.static_entities.lock();
        for entity in entities.values() {
            let mut body = entity.body();
            if body.process_logics(clock) && !self.check_entity_location_in_octrees(&*body) {
                body.core_mut().mark_location_dirty();
            }
        }
    }

    fn update_node_tree(&self, clock: &CycleClock) {
        let mut tree = self.node_tree.lock();
        let mut crawler = NodeCrawler::new(tree.root());
        while let Some(key) = crawler.advance(&tree) {
            let Some(node) = tree.get_mut(key) else {
                continue;
            };
            if node.process_logics(clock) && !self.check_entity_location_in_octrees(&*node) {
                node.core_mut().mark_location_dirty();
            }
        }

        let trimmed = tree.trim_tree();
        if trimmed > 0 {
            log::debug!("Scene '{}': {trimmed} node(s) trimmed", self.name);
        }
    }

    fn check_entity_location_in_octrees<E>(&self, entity: &E) -> bool
    where
        E: AbstractEntity + ?Sized,
    {
        let id = entity.id();
        let mut settled = true;

        let render_bounds = if entity.is_renderable() {
            let bounds = render_placement(entity);
            if bounds.is_none() {
                log::trace!("Scene: {id:?} has no ready visual yet");
                settled = false;
            }
            bounds
        } else {
            None
        };
        {
            let mut octree = self.rendering_octree.lock();
            match render_bounds {
                Some(aabb) => {
                    octree.update_or_insert(id, aabb);
                }
                None if octree.contains(&id) => {
                    octree.erase(&id);
                }
                None => {}
            }
        }

        let physics_bounds = entity.physics_bounds();
        let mut octree = self.physics_octree.lock();
        match physics_bounds {
            Some(aabb) if aabb.is_valid() => {
                octree.update_or_insert(id, aabb);
            }
            Some(aabb) => {
                log::trace!("Scene: {id:?} has no usable collision volume yet ({aabb:?})");
                settled = false;
                if octree.contains(&id) {
                    octree.erase(&id);
                }
            }
            None if octree.contains(&id) => {
                octree.erase(&id);
            }
            None => {}
        }

        settled
    }

    fn evict_from_octrees(&self, id: EntityId) {
        {
            let mut octree = self.rendering_octree.lock();
            if octree.contains(&id) {
                octree.erase(&id);
            }
        }
        let mut octree = self.physics_octree.lock();
        if octree.contains(&id) {
            octree.erase(&id);
        }
    }

    fn dispose_static_entity(&self, entity: &StaticEntity) {
        self.bus.forget_producer(&entity.producer());
        self.evict_from_octrees(entity.id());

        let components = entity.body().core_mut().take_components();
        for component in &components {
            if let Some(notification) = component.destroyed_notification(entity.id()) {
                self.on_entity_notification(&notification);
            }
        }
        log::debug!("Scene '{}': static entity '{}' removed", self.name, entity.name());
    }

    fn on_notification(&self, producer: &Producer, notification: &Notification) -> bool {
        match producer.kind() {
            ProducerKind::AvConsole => self.on_av_console_notification(producer, notification),
            ProducerKind::Node => match notification {
                Notification::SubNodeCreating { .. }
                | Notification::SubNodeCreated { .. }
                | Notification::SubNodeDeleting { .. }
                | Notification::SubNodeDeleted { .. } => self.on_node_notification(notification),
                _ => self.on_entity_notification(notification),
            },
            ProducerKind::StaticEntity => self.on_entity_notification(notification),
        }
    }

    fn on_av_console_notification(&self, producer: &Producer, notification: &Notification) -> bool {
        if *producer != self.av_console.producer() {
            log::debug!("Scene '{}': dropping foreign AV console {producer}", self.name);
            return false;
        }

        match notification {
            Notification::VideoDeviceAdded { .. } | Notification::VideoDeviceRemoved { .. } => {
                *self.primary_camera.write() = self.av_console.primary_camera();
            }
            Notification::AudioDeviceAdded { .. } | Notification::AudioDeviceRemoved { .. } => {
                *self.primary_microphone.write() = self.av_console.primary_microphone();
            }
            _ => self.trace_unhandled(producer, notification),
        }
        true
    }

    fn on_node_notification(&self, notification: &Notification) -> bool {
        match notification {
            Notification::SubNodeDeleting { node, .. } => {
                if self.node_controller.lock().release_node(*node) {
                    log::debug!("Scene '{}': controlled node deleted, controller released", self.name);
                }
                self.evict_from_octrees(EntityId::Node(*node));
            }
            Notification::SubNodeCreating { .. }
            | Notification::SubNodeCreated { .. }
            | Notification::SubNodeDeleted { .. } => {
                log::trace!("Scene '{}': {}", self.name, notification.name());
            }
            _ => {}
        }
        true
    }

    fn on_entity_notification(&self, notification: &Notification) -> bool {
        match notification {
            Notification::CameraCreated { entity, camera } => {
                self.av_console
                    .add_video_device(&device_name(*entity, camera.name()), Arc::clone(camera), false);
            }
            Notification::PrimaryCameraCreated { entity, camera } => {
                self.av_console
                    .add_video_device(&device_name(*entity, camera.name()), Arc::clone(camera), true);
            }
            Notification::CameraDestroyed { camera, .. } => {
                self.av_console.remove_video_device(camera);
            }
            Notification::MicrophoneCreated { entity, microphone } => {
                self.av_console.add_audio_device(
                    &device_name(*entity, microphone.name()),
                    Arc::clone(microphone),
                    false,
                );
            }
            Notification::PrimaryMicrophoneCreated { entity, microphone } => {
                self.av_console.add_audio_device(
                    &device_name(*entity, microphone.name()),
                    Arc::clone(microphone),
                    true,
                );
            }
            Notification::MicrophoneDestroyed { microphone, .. } => {
                self.av_console.remove_audio_device(microphone);
            }
            Notification::LightCreated { light, .. } => {
                self.light_set.lock().add(light.clone());
            }
            Notification::LightDestroyed { light, .. } => {
                self.light_set.lock().remove(light);
            }
            _ => log::debug!(
                "Scene '{}': unhandled entity notification {} ({})",
                self.name,
                notification.name(),
                notification.code()
            ),
        }
        true
    }

    fn trace_unhandled(&self, producer: &Producer, notification: &Notification) {
        log::debug!(
            "Scene '{}': unhandled notification {} ({}) from {producer}",
            self.name,
            notification.name(),
            notification.code()
        );
    }
}

/// Half extent given to flat or point render bounds
const MIN_RENDER_HALF_EXTENT: f32 = 0.5;

/// Render bounds usable by the rendering octree
///
/// Flat visuals (ground planes, quads, sprites) are thickened, unusable
/// bounds fall back to a small box around the entity position.
fn render_placement<E>(entity: &E) -> Option<AABB>
where
    E: AbstractEntity + ?Sized,
{
    let bounds = entity.render_bounds()?;
    if bounds.is_valid() {
        return Some(bounds);
    }
    let thick = bounds.thickened(MIN_RENDER_HALF_EXTENT);
    if thick.is_valid() {
        return Some(thick);
    }
    Some(AABB::from_center_extents(
        entity.world_coordinates().position,
        Vec3::repeat(MIN_RENDER_HALF_EXTENT),
    ))
    .filter(AABB::is_valid)
}

fn device_name(entity: EntityId, component: &str) -> String {
    match entity {
        EntityId::Node(key) => format!("node{key:?}/{component}"),
        EntityId::Static(id) => format!("static#{id}/{component}"),
    }
}

impl Drop for SceneInner {
    fn drop(&mut self) {
        self.bus.forget_producer(&self.node_tree.get_mut().producer());
        self.bus.forget_producer(&self.av_console.producer());
        for entity in self.static_entities.get_mut().values() {
            self.bus.forget_producer(&entity.producer());
        }
        log::info!("Scene '{}' destroyed", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::collision_model::{BoundedVisual, Renderable, SphereModel};
    use crate::scene::components::{DirectionalLight, Light};
    use crate::scene::entity::EntityFlags;
    use crate::scene::node::TransformSpace;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::AtomicUsize;

    fn scene() -> Scene {
        Scene::new("test", SceneConfig::default()).unwrap()
    }

    fn populate_static(scene: &Scene, name: &str, position: Vec3) -> Arc<StaticEntity> {
        let entity = scene.create_static_entity(name);
        {
            let mut body = entity.body();
            body.set_position(position);
            body.core_mut().add_visual("mesh", Arc::new(BoundedVisual::cube("mesh", 1.0)));
            body.core_mut().set_collision_model(Some(Arc::new(SphereModel::new(1.0))));
        }
        entity
    }

    #[test]
    fn test_static_entities_fill_both_octrees() {
        for seed in 0..8 {
            let scene = scene();
            let mut rng = StdRng::seed_from_u64(seed);
            let interior = scene.config().boundary - 1.0;
            for index in 0..5 {
                let position = Vec3::new(
                    rng.gen_range(-interior..interior),
                    rng.gen_range(-interior..interior),
                    rng.gen_range(-interior..interior),
                );
                populate_static(&scene, &format!("rock{index}"), position);
            }

            assert!(scene.process_logics());

            assert_eq!(scene.rendering_element_count(), 5, "seed {seed}");
            assert_eq!(scene.physics_element_count(), 5, "seed {seed}");
            assert_eq!(scene.static_entity_count(), 5);
            assert_eq!(scene.cycle(), 1);
        }
    }

    #[derive(Debug, Default)]
    struct StreamedMesh {
        ready: AtomicBool,
    }

    impl Renderable for StreamedMesh {
        fn local_bounding_box(&self) -> AABB {
            AABB::cube(1.0)
        }

        fn is_ready(&self) -> bool {
            self.ready.load(Ordering::Acquire)
        }
    }

    #[test]
    fn test_visual_indexed_once_ready() {
        let scene = scene();
        let mesh = Arc::new(StreamedMesh::default());
        let entity = scene.create_static_entity("statue");
        {
            let mut body = entity.body();
            body.set_position(Vec3::new(20.0, 0.0, -20.0));
            body.core_mut().add_visual("mesh", Arc::clone(&mesh) as Arc<dyn Renderable>);
        }

        scene.process_logics();
        assert!(entity.body().is_renderable());
        assert!(!scene.is_in_rendering_octree(entity.id()));

        mesh.ready.store(true, Ordering::Release);
        scene.process_logics();
        assert!(scene.is_in_rendering_octree(entity.id()));
        assert_eq!(scene.rendering_element_count(), 1);

        // Settled entities are no longer re-checked.
        assert!(!entity.body().core().is_flag_enabled(EntityFlags::LOCATION_DIRTY));
    }

    #[test]
    fn test_node_visual_indexed_once_ready() {
        let scene = scene();
        let mesh = Arc::new(StreamedMesh::default());
        let ship = scene.create_node(scene.root(), "ship", Transform::identity()).unwrap();
        scene.with_node_tree(|tree| {
            if let Some(node) = tree.get_mut(ship) {
                node.core_mut().add_visual("hull", Arc::clone(&mesh) as Arc<dyn Renderable>);
            }
        });

        for _ in 0..3 {
            scene.process_logics();
        }
        assert!(!scene.is_in_rendering_octree(EntityId::Node(ship)));

        mesh.ready.store(true, Ordering::Release);
        scene.process_logics();
        assert!(scene.is_in_rendering_octree(EntityId::Node(ship)));
    }

    #[test]
    fn test_flat_visual_enters_rendering_octree() {
        let scene = scene();
        let ground = scene.create_static_entity("ground");
        let plane = AABB::new(Vec3::new(-50.0, 0.0, -50.0), Vec3::new(50.0, 0.0, 50.0));
        ground
            .body()
            .core_mut()
            .add_visual("plane", Arc::new(BoundedVisual::new("plane", plane)));

        scene.process_logics();

        assert!(scene.is_in_rendering_octree(ground.id()));
        assert_eq!(scene.rendering_element_count(), 1);
        assert_eq!(scene.query_rendering(&AABB::cube(5.0)), vec![ground.id()]);
        assert!(!scene.is_in_physics_octree(ground.id()));
    }

    #[test]
    fn test_removed_static_disposed_while_registered() {
        let scene = scene();
        let entity = populate_static(&scene, "rig", Vec3::new(5.0, 5.0, 5.0));
        entity.body().core_mut().add_camera("eye", Camera::default(), true);
        scene.process_logics();

        let inner = Arc::downgrade(&scene.inner);
        let registered = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&registered);
        scene.bus().subscribe(scene.av_console().producer(), move |_: &Producer, notification: &Notification| {
            if let (Notification::VideoDeviceRemoved { .. }, Some(inner)) = (notification, inner.upgrade()) {
                let id = inner.static_entities.lock().get("rig").map(|found| found.id());
                *sink.lock() = Some((id, inner.rendering_octree.lock().element_count()));
            }
            true
        });

        assert!(scene.remove_static_entity("rig"));

        assert_eq!(*registered.lock(), Some((Some(entity.id()), 0)));
        assert_eq!(scene.bus().subscriber_count(&entity.producer()), 0);
        assert!(!scene.is_in_physics_octree(entity.id()));
        assert!(scene.find_static_entity("rig").is_none());
        assert!(scene.primary_camera().is_none());
    }

    #[test]
    fn test_invalid_boundary() {
        assert!(matches!(
            Scene::new("bad", SceneConfig::default().with_boundary(0.0)),
            Err(SceneError::InvalidBoundary(_))
        ));

        let scene = scene();
        assert!(scene.set_boundary(-1.0, true).is_err());
        assert!(scene.contains(&Vec3::new(999.0, -1000.0, 0.0)));
        assert!(!scene.contains(&Vec3::new(1000.5, 0.0, 0.0)));
    }

    #[test]
    fn test_set_boundary_keeps_elements() {
        let scene = scene();
        populate_static(&scene, "near", Vec3::new(10.0, 0.0, 0.0));
        populate_static(&scene, "far", Vec3::new(800.0, 0.0, 0.0));
        scene.process_logics();

        scene.set_boundary(100.0, true).unwrap();
        assert_eq!(scene.rendering_element_count(), 1);
        assert_eq!(scene.physics_element_count(), 1);
        assert!(!scene.contains(&Vec3::new(800.0, 0.0, 0.0)));

        scene.set_boundary(2000.0, false).unwrap();
        assert_eq!(scene.rendering_element_count(), 0);
    }

    #[test]
    fn test_disabled_scene_skips_cycles() {
        let scene = scene();
        let ship = scene.create_node(scene.root(), "ship", Transform::identity()).unwrap();
        scene.attach_node_controller(ship).unwrap();
        scene.disable();

        assert!(!scene.process_logics());
        assert!(!scene.push_control_input(ControlInput::Translate {
            delta: Vec3::x(),
            space: TransformSpace::World,
        }));
        assert_eq!(scene.cycle(), 0);

        scene.enable();
        assert!(scene.push_control_input(ControlInput::Translate {
            delta: Vec3::x(),
            space: TransformSpace::World,
        }));
        scene.process_logics();
        let position = scene.with_node_tree(|tree| tree.world(ship).map(|world| world.position));
        assert_relative_eq!(position.unwrap(), Vec3::x());
        assert_eq!(scene.lifetime_us(), SceneConfig::default().cycle_duration_us);
    }

    #[test]
    fn test_deleted_node_releases_controller_and_octrees() {
        let scene = scene();
        let ship = scene.create_node(scene.root(), "ship", Transform::identity()).unwrap();
        scene.with_node_tree(|tree| {
            if let Some(node) = tree.get_mut(ship) {
                node.core_mut().add_visual("hull", Arc::new(BoundedVisual::cube("hull", 2.0)));
            }
        });
        scene.attach_node_controller(ship).unwrap();
        scene.process_logics();
        assert!(scene.is_in_rendering_octree(EntityId::Node(ship)));

        scene.discard_node(ship).unwrap();
        scene.process_logics();

        assert!(!scene.is_in_rendering_octree(EntityId::Node(ship)));
        assert_eq!(scene.controlled_node(), None);
    }

    #[test]
    fn test_components_route_to_console_and_lights() {
        let scene = scene();
        let entity = scene.create_static_entity("rig");
        let camera = entity.body().core_mut().add_camera("eye", Camera::default(), true);
        let sun = Light::Directional(Arc::new(DirectionalLight::new(Vec3::repeat(1.0), 1.0, true)));
        entity.body().core_mut().add_light("sun", sun);

        assert!(scene
            .primary_camera()
            .zip(camera)
            .is_some_and(|(primary, camera)| Arc::ptr_eq(&primary, &camera)));
        assert_eq!(scene.with_light_set(LightSet::len), 1);

        scene.process_logics();
        assert_eq!(scene.with_light_set(|lights| lights.directional_lights()[0].cascades().len()), 4);

        assert!(scene.remove_static_entity("rig"));
        assert!(!scene.remove_static_entity("rig"));
        assert!(scene.primary_camera().is_none());
        assert_eq!(scene.with_light_set(LightSet::len), 0);
    }

    #[test]
    fn test_duplicate_static_name_replaces_entity() {
        let scene = scene();
        let first = populate_static(&scene, "crate", Vec3::new(1.0, 1.0, 1.0));
        scene.process_logics();
        let second = scene.create_static_entity("crate");

        assert_eq!(scene.static_entity_count(), 1);
        assert!(!scene.is_in_rendering_octree(first.id()));
        assert!(scene
            .find_static_entity("crate")
            .is_some_and(|found| found.id() == second.id()));
        assert_eq!(scene.bus().subscriber_count(&first.producer()), 0);
    }

    #[test]
    fn test_collaborators_are_called() {
        struct CountingPhysics(AtomicUsize);

        impl PhysicsStep for CountingPhysics {
            fn step(&self, _tree: &mut NodeTree, delta_secs: f32) {
                assert!(delta_secs > 0.0);
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        struct Silence;

        impl Ambience for Silence {
            fn is_playing(&self) -> bool {
                false
            }

            fn update(&self, _cycle_duration_us: u64) {
                panic!("a silent ambience is never ticked");
            }
        }

        let scene = scene();
        let physics = Arc::new(CountingPhysics(AtomicUsize::new(0)));
        scene.set_physics_step(Some(Arc::clone(&physics) as Arc<dyn PhysicsStep>));
        scene.set_ambience(Some(Arc::new(Silence)));

        for _ in 0..3 {
            scene.process_logics();
        }

        assert_eq!(physics.0.load(Ordering::SeqCst), 3);
        assert_eq!(scene.stats().cycle, 3);
    }
}
