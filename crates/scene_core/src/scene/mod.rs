//! Scene management system
//!
//! Entities, the node tree, the static entity registry and the [`Scene`]
//! that keeps them in sync with the spatial indexes.
//!
//! ## Architecture
//!
//! ```text
//! Node tree ──┐
//!             ├── notifications ──→ Scene ──→ rendering / physics octrees
//! Statics   ──┘                        │
//!                                      ├──→ AV console (cameras, microphones)
//!                                      └──→ light set (shadow cascades)
//! ```

pub mod av_console;
pub mod collision_model;
pub mod components;
pub mod controller;
pub mod entity;
pub mod lighting;
pub mod node;
mod scene_manager;
pub mod static_entity;

pub use av_console::AvConsoleManager;
pub use collision_model::{BoundedVisual, BoxModel, CollisionModel, PointModel, Renderable, SphereModel};
pub use components::{Camera, DirectionalLight, Light, Microphone, PointLight, SpotLight};
pub use controller::{ControlInput, NodeController};
pub use entity::{AbstractEntity, EntityFlags, EntityId};
pub use lighting::LightSet;
pub use node::{Node, NodeCrawler, NodeError, NodeKey, NodeTree, TransformSpace};
pub use scene_manager::{Ambience, GroundLevel, PhysicsStep, Scene, SceneError, SceneStats};
pub use static_entity::{StaticBody, StaticEntity};
