//! # Scene Core
//!
//! Spatial core of a 3D scene: a transform node tree, a flat registry of
//! static entities, two octrees (rendering and physics) and a notification
//! bus tying them together.
//!
//! ## Features
//!
//! - **Octree**: loose single-sector placement with auto subdivision and collapse
//! - **Node Tree**: named hierarchy with cached world transforms and deferred removal
//! - **Notifications**: producer/observer bus with self-unsubscribing handlers
//! - **Scene**: fixed-step logic cycle keeping every index consistent
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use scene_core::prelude::*;
//!
//! fn main() -> Result<(), SceneError> {
//!     scene_core::foundation::logging::init();
//!
//!     let scene = Scene::new("level", SceneConfig::default())?;
//!     let rock = scene.create_static_entity("rock");
//!     {
//!         let mut body = rock.body();
//!         body.set_position(Vec3::new(10.0, 0.0, 0.0));
//!         body.core_mut().add_visual("mesh", Arc::new(BoundedVisual::cube("mesh", 1.0)));
//!         body.core_mut().set_collision_model(Some(Arc::new(SphereModel::new(1.0))));
//!     }
//!
//!     scene.process_logics();
//!     assert_eq!(scene.physics_element_count(), 1);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod events;
pub mod foundation;
pub mod scene;
pub mod spatial;

/// Common imports for scene users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, SceneConfig, ShadowConfig},
        events::{Notification, NotificationBus, Observer, Producer, ProducerKind},
        foundation::{
            math::{Quat, Transform, Vec3},
            time::{CycleClock, Stopwatch},
        },
        scene::{
            AbstractEntity, BoundedVisual, BoxModel, Camera, ControlInput, EntityFlags, EntityId, Light,
            Microphone, NodeKey, NodeTree, PointModel, Scene, SceneError, SceneStats, SphereModel,
            StaticEntity, TransformSpace,
        },
        spatial::{Octree, OctreeConfig, AABB},
    };
}
