//! Input-driven node movement
//!
//! One node at a time is attached to the controller. Inputs are queued by
//! whoever handles the user input and applied by the scene during its logic
//! cycle, so at most one node moves from user input per cycle.

use crate::foundation::math::{Unit, Vec3};
use crate::scene::node::{NodeError, NodeKey, NodeTree, TransformSpace};

/// Movement request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlInput {
    /// Move by an offset
    Translate {
        /// Offset
        delta: Vec3,
        /// Frame of the offset
        space: TransformSpace,
    },
    /// Rotate around an axis
    Rotate {
        /// Rotation axis
        axis: Unit<Vec3>,
        /// Angle in radians
        angle: f32,
        /// Frame of the axis
        space: TransformSpace,
    },
}

impl ControlInput {
    /// Apply the input to a node of `tree`
    pub fn apply(&self, tree: &mut NodeTree, key: NodeKey) -> Result<(), NodeError> {
        match *self {
            Self::Translate { delta, space } => tree.translate(key, delta, space),
            Self::Rotate { axis, angle, space } => tree.rotate(key, &axis, angle, space),
        }
    }
}

/// Controller driving a single node
#[derive(Debug, Default)]
pub struct NodeController {
    controlled: Option<NodeKey>,
    pending: Vec<ControlInput>,
}

impl NodeController {
    /// Create a detached controller
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive `key`, dropping inputs queued for the previous node
    pub fn attach(&mut self, key: NodeKey) {
        if self.controlled != Some(key) {
            self.pending.clear();
        }
        self.controlled = Some(key);
    }

    /// Stop driving any node
    pub fn release(&mut self) -> Option<NodeKey> {
        self.pending.clear();
        self.controlled.take()
    }

    /// Release the controller only if it drives `key`
    pub fn release_node(&mut self, key: NodeKey) -> bool {
        if self.controlled == Some(key) {
            self.release();
            return true;
        }
        false
    }

    /// Node currently driven
    pub const fn controlled(&self) -> Option<NodeKey> {
        self.controlled
    }

    /// Queue an input, refused while detached
    pub fn push(&mut self, input: ControlInput) -> bool {
        if self.controlled.is_none() {
            return false;
        }
        self.pending.push(input);
        true
    }

    /// Number of queued inputs
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Take the queued inputs with the node they target
    pub fn take_pending(&mut self) -> Option<(NodeKey, Vec<ControlInput>)> {
        let key = self.controlled?;
        if self.pending.is_empty() {
            return None;
        }
        Some((key, std::mem::take(&mut self.pending)))
    }
}
