//! Spatial partitioning
//!
//! Bounding volumes and the arena octree used by scenes for visibility
//! culling and collision broad-phase.

pub mod aabb;
pub mod octree;

pub use aabb::AABB;
pub use octree::{Octree, OctreeConfig, Sector, SectorKey};
