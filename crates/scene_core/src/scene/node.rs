//! Hierarchical transform tree
//!
//! Nodes live in a slotmap arena owned by [`NodeTree`]. A node owns its
//! children (destroying it destroys its subtree) and keeps a plain key to
//! its parent for navigation. Child names are unique per level and `root`
//! is reserved.
//!
//! Every structural change is relayed through the tree's producer:
//! `SubNodeCreating` before a link, `SubNodeCreated` after it,
//! `SubNodeDeleting` before an unlink and `SubNodeDeleted` after it.
//! Removing a subtree announces the descendants first, deepest first, so a
//! listener always sees a node disappear before its parent.

use std::collections::BTreeMap;
use std::sync::Arc;

use slotmap::{new_key_type, SlotMap};

use crate::events::{Notification, NotificationBus, Producer, ProducerKind};
use crate::foundation::math::{Quat, Transform, Unit, Vec3};
use crate::foundation::time::CycleClock;
use crate::scene::entity::{AbstractEntity, Emitter, EntityCore, EntityFlags, EntityId};

new_key_type! {
    /// Arena handle of a node
    pub struct NodeKey;
}

/// Name reserved for the tree root
pub const ROOT_NODE_NAME: &str = "root";

/// Node tree mutation errors
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    /// The requested name is reserved
    #[error("the node name '{0}' is reserved")]
    ReservedName(String),

    /// A sibling already uses the requested name
    #[error("a child node named '{0}' already exists")]
    DuplicateName(String),

    /// No child with this name
    #[error("no child node named '{0}'")]
    NotFound(String),

    /// The root can't be discarded
    #[error("the root node can't be discarded")]
    RootDiscard,

    /// The key refers to a destroyed node
    #[error("the node no longer exists")]
    StaleKey,
}

/// Frame in which a transform change is expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransformSpace {
    /// The node's own axes
    Local,
    /// The parent's axes
    #[default]
    Parent,
    /// World axes
    World,
}

/// Member of a node tree
#[derive(Debug)]
pub struct Node {
    core: EntityCore,
    parent: Option<NodeKey>,
    children: BTreeMap<String, NodeKey>,
    local: Transform,
    depth: usize,
    lifetime_us: u64,
    lifespan_us: Option<u64>,
}

impl Node {
    /// Parent key, `None` for the root
    pub const fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Children by name
    pub fn children(&self) -> impl Iterator<Item = (&str, NodeKey)> + '_ {
        self.children.iter().map(|(name, key)| (name.as_str(), *key))
    }

    /// Number of direct children
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Transform relative to the parent
    pub const fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// Number of ancestors (0 for the root)
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Check if this is the tree root
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Accumulated simulated lifetime
    pub const fn lifetime_us(&self) -> u64 {
        self.lifetime_us
    }

    /// Lifetime after which the node discards itself
    pub const fn lifespan_us(&self) -> Option<u64> {
        self.lifespan_us
    }

    /// Set or clear the lifespan
    pub fn set_lifespan_us(&mut self, lifespan_us: Option<u64>) {
        self.lifespan_us = lifespan_us;
    }

    /// Whether the next tree trim removes this node
    pub const fn is_discardable(&self) -> bool {
        self.core.is_flag_enabled(EntityFlags::DISCARDABLE)
    }
}

impl AbstractEntity for Node {
    fn core(&self) -> &EntityCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EntityCore {
        &mut self.core
    }

    fn on_process_logics(&mut self, clock: &CycleClock) {
        self.lifetime_us += clock.cycle_duration_us();

        let expired = self
            .lifespan_us
            .is_some_and(|lifespan| self.lifetime_us >= lifespan);
        if expired && !self.is_root() && !self.is_discardable() {
            log::debug!("Node '{}' reached its lifespan", self.core.name());
            self.core.set_flag(EntityFlags::DISCARDABLE, true);
        }
    }
}

/// Arena owning a root node and all its descendants
#[derive(Debug)]
pub struct NodeTree {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
    emitter: Emitter,
}

impl NodeTree {
    /// Create a tree with a lone root, publishing on `bus`
    pub fn new(bus: Arc<NotificationBus>) -> Self {
        let producer = bus.register_producer(ProducerKind::Node);
        let emitter = Emitter::new(bus, producer);
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert_with_key(|key| Node {
            core: EntityCore::new(
                EntityId::Node(key),
                ROOT_NODE_NAME,
                Transform::identity(),
                emitter.clone(),
            ),
            parent: None,
            children: BTreeMap::new(),
            local: Transform::identity(),
            depth: 0,
            lifetime_us: 0,
            lifespan_us: None,
        });

        Self { nodes, root, emitter }
    }

    /// Producer relaying every notification of the tree
    pub const fn producer(&self) -> Producer {
        self.emitter.producer()
    }

    /// Root key
    pub const fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of nodes, root included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Check if a key refers to a live node
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Read access to a node
    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Write access to a node
    ///
    /// Use the tree methods to move a node so the world transforms of its
    /// subtree stay consistent.
    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Find a direct child by name
    pub fn find_child(&self, parent: NodeKey, name: &str) -> Option<NodeKey> {
        self.nodes.get(parent)?.children.get(name).copied()
    }

    /// Parent of a node
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key)?.parent
    }

    /// Child keys of a node, ordered by name
    pub fn children(&self, key: NodeKey) -> Vec<NodeKey> {
        self.nodes
            .get(key)
            .map(|node| node.children.values().copied().collect())
            .unwrap_or_default()
    }

    /// Check if a key refers to the root
    pub fn is_root(&self, key: NodeKey) -> bool {
        key == self.root
    }

    /// Ancestor count of a node
    pub fn depth(&self, key: NodeKey) -> Option<usize> {
        self.nodes.get(key).map(Node::depth)
    }

    /// Cached world transform of a node
    pub fn world(&self, key: NodeKey) -> Option<&Transform> {
        self.nodes.get(key).map(|node| node.core.world())
    }

    /// Pre-order traversal of the whole tree
    pub fn crawl(&self) -> NodeCrawl<'_> {
        NodeCrawler::new(self.root).iter(self)
    }

    /// Create and link a child node
    pub fn create_child(
        &mut self,
        parent: NodeKey,
        name: &str,
        local: Transform,
    ) -> Result<NodeKey, NodeError> {
        if name == ROOT_NODE_NAME {
            return Err(NodeError::ReservedName(name.to_string()));
        }

        let (parent_world, depth) = {
            let parent_node = self.nodes.get(parent).ok_or(NodeError::StaleKey)?;
            if parent_node.children.contains_key(name) {
                return Err(NodeError::DuplicateName(name.to_string()));
            }
            (*parent_node.core.world(), parent_node.depth + 1)
        };

        self.emitter.emit(&Notification::SubNodeCreating { parent });

        let emitter = self.emitter.clone();
        let key = self.nodes.insert_with_key(|key| Node {
            core: EntityCore::new(EntityId::Node(key), name, parent_world.combine(&local), emitter),
            parent: Some(parent),
            children: BTreeMap::new(),
            local,
            depth,
            lifetime_us: 0,
            lifespan_us: None,
        });
        if let Some(parent_node) = self.nodes.get_mut(parent) {
            parent_node.children.insert(name.to_string(), key);
        }

        log::trace!("NodeTree: created node '{name}' at depth {depth}");
        self.emitter.emit(&Notification::SubNodeCreated { parent, node: key });

        Ok(key)
    }

    /// Destroy a named child and its subtree immediately
    ///
    /// Returns the number of destroyed nodes.
    pub fn destroy_child(&mut self, parent: NodeKey, name: &str) -> Result<usize, NodeError> {
        if !self.nodes.contains_key(parent) {
            return Err(NodeError::StaleKey);
        }
        let child = self
            .find_child(parent, name)
            .ok_or_else(|| NodeError::NotFound(name.to_string()))?;
        Ok(self.remove_subtree(child))
    }

    /// Destroy every descendant of a node, keeping the node itself
    pub fn destroy_tree(&mut self, key: NodeKey) -> usize {
        let children: Vec<NodeKey> = self
            .nodes
            .get(key)
            .map(|node| node.children.values().copied().collect())
            .unwrap_or_default();

        children
            .into_iter()
            .map(|child| self.remove_subtree(child))
            .sum()
    }

    /// Mark a node for removal at the next [`NodeTree::trim_tree`]
    pub fn discard(&mut self, key: NodeKey) -> Result<(), NodeError> {
        if key == self.root {
            log::error!("NodeTree: the root node can't be discarded");
            return Err(NodeError::RootDiscard);
        }
        let node = self.nodes.get_mut(key).ok_or(NodeError::StaleKey)?;
        node.core.set_flag(EntityFlags::DISCARDABLE, true);
        Ok(())
    }

    /// Remove every discardable node along with its subtree
    ///
    /// Returns the number of destroyed nodes.
    pub fn trim_tree(&mut self) -> usize {
        let mut doomed = Vec::new();
        let mut pending = vec![self.root];
        while let Some(key) = pending.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if !node.is_root() && node.is_discardable() {
                doomed.push(key);
                continue;
            }
            pending.extend(node.children.values().copied());
        }

        doomed
            .into_iter()
            .map(|key| self.remove_subtree(key))
            .sum()
    }

    /// Replace the local transform
    pub fn set_local_transform(&mut self, key: NodeKey, transform: Transform) -> Result<(), NodeError> {
        self.modify_local(key, |local, _| *local = transform)
    }

    /// Place a node
    ///
    /// In `Local` and `Parent` space the position is relative to the parent.
    pub fn set_position(&mut self, key: NodeKey, position: Vec3, space: TransformSpace) -> Result<(), NodeError> {
        self.modify_local(key, |local, parent_world| {
            local.position = match space {
                TransformSpace::Local | TransformSpace::Parent => position,
                TransformSpace::World => parent_world
                    .inverse()
                    .transform_point(&position.into())
                    .coords,
            };
        })
    }

    /// Move a node by `delta`
    pub fn translate(&mut self, key: NodeKey, delta: Vec3, space: TransformSpace) -> Result<(), NodeError> {
        self.modify_local(key, |local, parent_world| {
            local.position += match space {
                TransformSpace::Local => local.rotation * delta,
                TransformSpace::Parent => delta,
                TransformSpace::World => parent_world.inverse().transform_vector(&delta),
            };
        })
    }

    /// Rotate a node around `axis`
    pub fn rotate(
        &mut self,
        key: NodeKey,
        axis: &Unit<Vec3>,
        angle: f32,
        space: TransformSpace,
    ) -> Result<(), NodeError> {
        let rotation = Quat::from_axis_angle(axis, angle);
        self.modify_local(key, |local, parent_world| {
            local.rotation = match space {
                TransformSpace::Local => local.rotation * rotation,
                TransformSpace::Parent => rotation * local.rotation,
                TransformSpace::World => {
                    parent_world.rotation.inverse() * rotation * parent_world.rotation * local.rotation
                }
            };
        })
    }

    /// Set a uniform scale
    pub fn set_scale(&mut self, key: NodeKey, factor: f32) -> Result<(), NodeError> {
        self.modify_local(key, |local, _| local.scale = Vec3::repeat(factor))
    }

    /// Orient a node toward a world position
    ///
    /// Returns `Ok(false)` when the direction is degenerate.
    pub fn look_at(&mut self, key: NodeKey, target: Vec3, up: Vec3) -> Result<bool, NodeError> {
        let position = self.world(key).ok_or(NodeError::StaleKey)?.position;
        let Some(world_rotation) = Transform::look_rotation(&position, &target, &up) else {
            return Ok(false);
        };
        self.modify_local(key, |local, parent_world| {
            local.rotation = parent_world.rotation.inverse() * world_rotation;
        })?;
        Ok(true)
    }

    fn modify_local<F>(&mut self, key: NodeKey, modify: F) -> Result<(), NodeError>
    where
        F: FnOnce(&mut Transform, &Transform),
    {
        let parent_world = self.parent_world(key).ok_or(NodeError::StaleKey)?;
        let node = self.nodes.get_mut(key).ok_or(NodeError::StaleKey)?;
        modify(&mut node.local, &parent_world);
        self.refresh_world(key);
        Ok(())
    }

    fn parent_world(&self, key: NodeKey) -> Option<Transform> {
        let node = self.nodes.get(key)?;
        Some(
            node.parent
                .and_then(|parent| self.nodes.get(parent))
                .map_or_else(Transform::identity, |parent| *parent.core.world()),
        )
    }

    fn refresh_world(&mut self, key: NodeKey) {
        let mut pending = vec![key];
        while let Some(current) = pending.pop() {
            let Some(parent_world) = self.parent_world(current) else {
                continue;
            };
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };
            let world = parent_world.combine(&node.local);
            node.core.set_world(world);
            pending.extend(node.children.values().copied());
        }
    }

    fn remove_subtree(&mut self, key: NodeKey) -> usize {
        let mut order = Vec::new();
        let mut crawler = NodeCrawler::new(key);
        while let Some(current) = crawler.advance(self) {
            order.push(current);
        }

        let mut removed = 0;
        // Reversed pre-order puts every node after all of its descendants.
        for current in order.into_iter().rev() {
            let Some(parent) = self.nodes.get(current).and_then(Node::parent) else {
                continue;
            };

            self.emitter.emit(&Notification::SubNodeDeleting { parent, node: current });

            if let Some(node) = self.nodes.get_mut(current) {
                node.core.clear_components();
            }
            if let Some(node) = self.nodes.remove(current) {
                if let Some(parent_node) = self.nodes.get_mut(parent) {
                    parent_node.children.remove(node.core.name());
                }
                log::trace!("NodeTree: destroyed node '{}'", node.core.name());
                removed += 1;
            }

            self.emitter.emit(&Notification::SubNodeDeleted { parent, node: current });
        }

        removed
    }
}

/// Restartable pre-order traversal of a subtree
///
/// The crawler only stores keys, so the tree may change between two steps:
/// destroyed nodes are skipped, children created under a node not visited
/// yet are picked up.
#[derive(Debug, Clone)]
pub struct NodeCrawler {
    start: NodeKey,
    stack: Vec<NodeKey>,
    started: bool,
}

impl NodeCrawler {
    /// Crawl the subtree rooted at `start`, `start` included
    pub const fn new(start: NodeKey) -> Self {
        Self {
            start,
            stack: Vec::new(),
            started: false,
        }
    }

    /// Next node in pre-order, children visited by name
    pub fn advance(&mut self, tree: &NodeTree) -> Option<NodeKey> {
        if !self.started {
            self.started = true;
            self.stack.push(self.start);
        }

        while let Some(key) = self.stack.pop() {
            if let Some(node) = tree.nodes.get(key) {
                self.stack.extend(node.children.values().rev().copied());
                return Some(key);
            }
        }
        None
    }

    /// Start over from the first node
    pub fn restart(&mut self) {
        self.stack.clear();
        self.started = false;
    }

    /// Borrowing iterator adapter
    pub fn iter(self, tree: &NodeTree) -> NodeCrawl<'_> {
        NodeCrawl { crawler: self, tree }
    }
}

/// Iterator over a tree borrowed for the whole traversal
#[derive(Debug)]
pub struct NodeCrawl<'a> {
    crawler: NodeCrawler,
    tree: &'a NodeTree,
}

impl Iterator for NodeCrawl<'_> {
    type Item = NodeKey;

    fn next(&mut self) -> Option<Self::Item> {
        self.crawler.advance(self.tree)
    }
}
