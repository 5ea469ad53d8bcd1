//! Octree spatial partitioning structure
//!
//! Divides a cubic region into hierarchical sectors for culling and
//! collision broad-phase queries. Sectors live in an arena and refer to each
//! other by [`SectorKey`]; a leaf sector subdivides into 8 octants when it
//! holds more elements than the configured limit and merges its subtree back
//! when the population drops (auto-collapse).
//!
//! Every element is stored in exactly one sector: the deepest one whose
//! bounds fully enclose the element's AABB. Elements straddling octant
//! borders therefore stay in the parent sector.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SlotMap};

use crate::config::ConfigError;
use crate::foundation::math::Vec3;
use crate::spatial::AABB;

new_key_type! {
    /// Arena handle of an octree sector
    pub struct SectorKey;
}

/// Configuration for octree behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Elements a leaf may hold before subdividing (never below 8)
    pub max_element_per_sector: usize,

    /// Maximum subdivision depth (root is depth 0)
    pub max_depth: usize,

    /// Smallest edge length a sector may have
    pub min_sector_size: f32,

    /// Merge subtrees back when their population drops
    pub auto_collapse: bool,

    /// Depth to pre-subdivide at construction, only honoured without auto-collapse
    pub reserve_depth: usize,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_element_per_sector: Self::MIN_ELEMENT_PER_SECTOR,
            max_depth: 16,
            min_sector_size: 1.0,
            auto_collapse: true,
            reserve_depth: 0,
        }
    }
}

impl OctreeConfig {
    /// Lower bound applied to `max_element_per_sector`
    pub const MIN_ELEMENT_PER_SECTOR: usize = 8;

    /// Settings of a scene rendering octree: large leaves, no collapse
    pub fn rendering_defaults() -> Self {
        Self {
            max_element_per_sector: 256,
            auto_collapse: false,
            ..Self::default()
        }
    }

    /// Settings of a scene physics octree: small leaves reserved three levels deep, no collapse
    pub fn physics_defaults() -> Self {
        Self {
            max_element_per_sector: 32,
            auto_collapse: false,
            reserve_depth: 3,
            ..Self::default()
        }
    }

    /// Effective element limit of a leaf
    pub fn element_limit(&self) -> usize {
        self.max_element_per_sector.max(Self::MIN_ELEMENT_PER_SECTOR)
    }

    /// Subtree population under which children merge back
    pub fn collapse_threshold(&self) -> usize {
        self.element_limit() / 2
    }

    /// Set the element limit
    pub fn with_max_element_per_sector(mut self, value: usize) -> Self {
        self.max_element_per_sector = value;
        self
    }

    /// Set the maximum depth
    pub fn with_max_depth(mut self, value: usize) -> Self {
        self.max_depth = value;
        self
    }

    /// Enable or disable auto-collapse
    pub fn with_auto_collapse(mut self, value: bool) -> Self {
        self.auto_collapse = value;
        self
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_sector_size.is_finite() && self.min_sector_size > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min sector size {} must be positive",
                self.min_sector_size
            )));
        }
        if self.reserve_depth > self.max_depth {
            return Err(ConfigError::Invalid(format!(
                "reserve depth {} exceeds max depth {}",
                self.reserve_depth, self.max_depth
            )));
        }
        if self.reserve_depth > 0 && self.auto_collapse {
            return Err(ConfigError::Invalid(
                "reserve depth requires auto-collapse to be disabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// One cubic cell of the octree
#[derive(Debug, Clone)]
pub struct Sector<T> {
    bounds: AABB,
    parent: Option<SectorKey>,
    slot: usize,
    depth: usize,
    elements: Vec<T>,
    children: Option<[SectorKey; 8]>,
    population: usize,
}

impl<T> Sector<T> {
    fn new(bounds: AABB, parent: Option<SectorKey>, slot: usize, depth: usize) -> Self {
        Self {
            bounds,
            parent,
            slot,
            depth,
            elements: Vec::new(),
            children: None,
            population: 0,
        }
    }

    /// World-space bounds
    pub const fn bounds(&self) -> &AABB {
        &self.bounds
    }

    /// Parent sector, `None` for the root
    pub const fn parent(&self) -> Option<SectorKey> {
        self.parent
    }

    /// Octant index inside the parent (0 for the root)
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Depth in the tree (0 = root)
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Elements stored directly in this sector
    pub fn elements(&self) -> &[T] {
        &self.elements
    }

    /// The eight child sectors, `None` if this is a leaf
    pub const fn sub_sectors(&self) -> Option<&[SectorKey; 8]> {
        self.children.as_ref()
    }

    /// Check if this sector has no children
    pub const fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Check if this sector is the root
    pub const fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Elements stored in this sector and all its descendants
    pub const fn population(&self) -> usize {
        self.population
    }
}

#[derive(Debug, Clone, Copy)]
struct Placement {
    sector: SectorKey,
    aabb: AABB,
}

/// Arena octree indexing elements of type `T` by bounding box
#[derive(Debug, Clone)]
pub struct Octree<T> {
    sectors: SlotMap<SectorKey, Sector<T>>,
    root: SectorKey,
    locations: HashMap<T, Placement>,
    config: OctreeConfig,
}

impl<T> Octree<T>
where
    T: Copy + Eq + Hash + Debug,
{
    /// Create an octree covering `bounds`
    pub fn new(bounds: AABB, config: OctreeConfig) -> Self {
        let mut sectors = SlotMap::with_key();
        let root = sectors.insert(Sector::new(bounds, None, 0, 0));
        let mut octree = Self {
            sectors,
            root,
            locations: HashMap::new(),
            config,
        };

        if octree.config.reserve_depth > 0 {
            octree.reserve(octree.config.reserve_depth);
        }

        octree
    }

    /// Create an octree covering `[-boundary, boundary]` on every axis
    pub fn with_boundary(boundary: f32, config: OctreeConfig) -> Self {
        Self::new(AABB::cube(boundary), config)
    }

    /// Active configuration
    pub const fn config(&self) -> &OctreeConfig {
        &self.config
    }

    /// Region covered by the root sector
    pub fn bounds(&self) -> AABB {
        self.sectors[self.root].bounds
    }

    /// Root sector key
    pub const fn root(&self) -> SectorKey {
        self.root
    }

    /// Read access to a sector
    pub fn sector(&self, key: SectorKey) -> Option<&Sector<T>> {
        self.sectors.get(key)
    }

    /// Insert an element with its world-space bounding box
    ///
    /// Degenerate boxes and boxes entirely outside the root are refused.
    /// Inserting an element already present relocates it.
    pub fn insert(&mut self, element: T, aabb: AABB) -> bool {
        if !aabb.is_valid() {
            log::trace!("Octree: refusing {element:?}, bounding box {aabb:?} is degenerate");
            return false;
        }

        if self.locations.contains_key(&element) {
            return self.update_or_insert(element, aabb);
        }

        if !self.bounds().intersects(&aabb) {
            log::warn!("Octree: refusing {element:?}, bounding box lies outside the octree bounds");
            return false;
        }

        self.place(element, aabb);
        true
    }

    /// Refresh the placement of an element, inserting it if absent
    ///
    /// Nothing moves while the current sector still encloses the new box and
    /// no child could take it.
    pub fn update_or_insert(&mut self, element: T, aabb: AABB) -> bool {
        if !aabb.is_valid() {
            log::trace!("Octree: ignoring update of {element:?}, bounding box {aabb:?} is degenerate");
            return false;
        }

        let Some(placement) = self.locations.get(&element).copied() else {
            return self.insert(element, aabb);
        };

        if self.still_fits(placement.sector, &aabb) {
            if let Some(placement) = self.locations.get_mut(&element) {
                placement.aabb = aabb;
            }
            return true;
        }

        if !self.bounds().intersects(&aabb) {
            log::debug!("Octree: {element:?} left the octree bounds");
            self.erase(&element);
            return false;
        }

        self.detach(&element, placement.sector);
        self.place(element, aabb);
        self.collapse_from(placement.sector);
        true
    }

    /// Remove an element
    pub fn erase(&mut self, element: &T) -> bool {
        let Some(placement) = self.locations.get(element).copied() else {
            log::warn!("Octree: {element:?} is not in the octree");
            return false;
        };

        self.detach(element, placement.sector);
        self.collapse_from(placement.sector);
        true
    }

    /// Check if an element is anywhere in the octree
    pub fn contains(&self, element: &T) -> bool {
        self.locations.contains_key(element)
    }

    /// Sector currently holding an element
    pub fn sector_of(&self, element: &T) -> Option<SectorKey> {
        self.locations.get(element).map(|placement| placement.sector)
    }

    /// Bounding box recorded for an element
    pub fn aabb_of(&self, element: &T) -> Option<AABB> {
        self.locations.get(element).map(|placement| placement.aabb)
    }

    /// Elements whose bounding box intersects `region`
    pub fn query_aabb(&self, region: &AABB) -> Vec<T> {
        self.collect(
            |bounds| bounds.intersects(region),
            |aabb| aabb.intersects(region),
        )
    }

    /// Elements whose bounding box touches a sphere
    pub fn query_sphere(&self, center: &Vec3, radius: f32) -> Vec<T> {
        self.collect(
            |bounds| bounds.intersects_sphere(center, radius),
            |aabb| aabb.intersects_sphere(center, radius),
        )
    }

    /// Every element with its recorded bounding box
    pub fn iter(&self) -> impl Iterator<Item = (T, AABB)> + '_ {
        self.locations
            .iter()
            .map(|(element, placement)| (*element, placement.aabb))
    }

    /// Number of elements
    pub fn element_count(&self) -> usize {
        self.locations.len()
    }

    /// Check if the octree holds no element
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of sectors, root included
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Depth of the deepest sector
    pub fn depth(&self) -> usize {
        self.sectors.values().map(Sector::depth).max().unwrap_or(0)
    }

    /// Visit every leaf sector
    pub fn for_leaf_sectors<F>(&self, mut visitor: F)
    where
        F: FnMut(SectorKey, &Sector<T>),
    {
        for (key, sector) in &self.sectors {
            if sector.is_leaf() {
                visitor(key, sector);
            }
        }
    }

    /// Subdivide every leaf down to `depth`
    ///
    /// Refused while auto-collapse is enabled since the reserved sectors
    /// would merge back on the next erase.
    pub fn reserve(&mut self, depth: usize) -> bool {
        if self.config.auto_collapse {
            log::warn!("Octree: reserve({depth}) refused, auto-collapse is enabled");
            return false;
        }

        let depth = depth.min(self.config.max_depth);
        let mut pending = vec![self.root];
        while let Some(key) = pending.pop() {
            if self.sectors[key].depth >= depth {
                continue;
            }
            self.subdivide(key);
            if let Some(children) = self.sectors[key].children {
                pending.extend(children);
            }
        }

        true
    }

    /// Remove every element and every sector below the root
    pub fn clear(&mut self) {
        let root = &self.sectors[self.root];
        let bounds = root.bounds;
        self.sectors.clear();
        self.root = self.sectors.insert(Sector::new(bounds, None, 0, 0));
        self.locations.clear();

        if self.config.reserve_depth > 0 {
            self.reserve(self.config.reserve_depth);
        }
    }

    fn collect<S, E>(&self, sector_test: S, element_test: E) -> Vec<T>
    where
        S: Fn(&AABB) -> bool,
        E: Fn(&AABB) -> bool,
    {
        let mut found = Vec::new();
        let mut pending = vec![self.root];

        while let Some(key) = pending.pop() {
            let sector = &self.sectors[key];
            // Root elements may stick out of the root bounds.
            if !sector.is_root() && !sector_test(&sector.bounds) {
                continue;
            }
            for element in &sector.elements {
                if self
                    .locations
                    .get(element)
                    .is_some_and(|placement| element_test(&placement.aabb))
                {
                    found.push(*element);
                }
            }
            if let Some(children) = &sector.children {
                pending.extend(children.iter().copied());
            }
        }

        found
    }

    fn still_fits(&self, key: SectorKey, aabb: &AABB) -> bool {
        let Some(sector) = self.sectors.get(key) else {
            return false;
        };
        if !sector.bounds.contains_aabb(aabb) {
            return false;
        }
        self.fitting_child(key, aabb).is_none()
    }

    fn fitting_child(&self, key: SectorKey, aabb: &AABB) -> Option<SectorKey> {
        let sector = &self.sectors[key];
        let children = sector.children?;
        let child = children[sector.bounds.octant_of(&aabb.center())];
        self.sectors[child]
            .bounds
            .contains_aabb(aabb)
            .then_some(child)
    }

    fn place(&mut self, element: T, aabb: AABB) {
        let mut key = self.root;
        while let Some(child) = self.fitting_child(key, &aabb) {
            key = child;
        }

        self.sectors[key].elements.push(element);
        self.locations.insert(element, Placement { sector: key, aabb });

        let mut cursor = Some(key);
        while let Some(current) = cursor {
            let sector = &mut self.sectors[current];
            sector.population += 1;
            cursor = sector.parent;
        }

        if self.overflows(key) {
            self.split_overflowing(key);
        }
    }

    fn detach(&mut self, element: &T, key: SectorKey) {
        self.locations.remove(element);

        let sector = &mut self.sectors[key];
        if let Some(index) = sector.elements.iter().position(|stored| stored == element) {
            sector.elements.swap_remove(index);
        }

        let mut cursor = Some(key);
        while let Some(current) = cursor {
            let sector = &mut self.sectors[current];
            sector.population = sector.population.saturating_sub(1);
            cursor = sector.parent;
        }
    }

    fn overflows(&self, key: SectorKey) -> bool {
        let sector = &self.sectors[key];
        sector.is_leaf()
            && sector.elements.len() > self.config.element_limit()
            && sector.depth < self.config.max_depth
            && sector.bounds.extents().x >= self.config.min_sector_size
    }

    fn split_overflowing(&mut self, key: SectorKey) {
        let mut pending = vec![key];
        while let Some(current) = pending.pop() {
            if !self.overflows(current) {
                continue;
            }
            self.subdivide(current);
            if let Some(children) = self.sectors[current].children {
                pending.extend(children);
            }
        }
    }

    fn subdivide(&mut self, key: SectorKey) {
        let (bounds, depth) = {
            let sector = &self.sectors[key];
            if sector.children.is_some() {
                return;
            }
            (sector.bounds, sector.depth)
        };

        let children: [SectorKey; 8] = std::array::from_fn(|slot| {
            self.sectors
                .insert(Sector::new(bounds.octant(slot), Some(key), slot, depth + 1))
        });

        let sector = &mut self.sectors[key];
        sector.children = Some(children);
        let elements = std::mem::take(&mut sector.elements);

        log::trace!(
            "Octree: subdividing sector at depth {depth} holding {} elements",
            elements.len()
        );

        let mut kept = Vec::new();
        for element in elements {
            let Some(placement) = self.locations.get_mut(&element) else {
                continue;
            };
            let child = children[bounds.octant_of(&placement.aabb.center())];
            let child_sector = &mut self.sectors[child];
            if child_sector.bounds.contains_aabb(&placement.aabb) {
                child_sector.elements.push(element);
                child_sector.population += 1;
                placement.sector = child;
            } else {
                kept.push(element);
            }
        }
        self.sectors[key].elements = kept;
    }

    fn collapse_from(&mut self, key: SectorKey) {
        if !self.config.auto_collapse {
            return;
        }

        let threshold = self.config.collapse_threshold();
        let mut target = None;
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            let Some(sector) = self.sectors.get(current) else {
                break;
            };
            if sector.children.is_some() && sector.population < threshold {
                target = Some(current);
            }
            cursor = sector.parent;
        }

        if let Some(target) = target {
            self.collapse(target);
        }
    }

    fn collapse(&mut self, key: SectorKey) {
        let Some(children) = self.sectors[key].children.take() else {
            return;
        };

        let mut gathered = Vec::new();
        let mut pending = children.to_vec();
        while let Some(current) = pending.pop() {
            if let Some(sector) = self.sectors.remove(current) {
                gathered.extend(sector.elements);
                if let Some(grandchildren) = sector.children {
                    pending.extend(grandchildren);
                }
            }
        }

        log::trace!("Octree: collapsing sector, {} elements merged back", gathered.len());

        for element in &gathered {
            if let Some(placement) = self.locations.get_mut(element) {
                placement.sector = key;
            }
        }
        self.sectors[key].elements.extend(gathered);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_box(x: f32, y: f32, z: f32) -> AABB {
        AABB::from_center_extents(Vec3::new(x, y, z), Vec3::repeat(0.5))
    }

    /// Every recorded element sits in exactly one sector list, and that sector is the recorded one.
    fn assert_single_placement(octree: &Octree<u32>) {
        let mut seen = HashMap::new();
        for (key, sector) in &octree.sectors {
            for element in sector.elements() {
                assert!(seen.insert(*element, key).is_none(), "{element} stored twice");
            }
        }
        assert_eq!(seen.len(), octree.element_count());
        for (element, key) in seen {
            assert_eq!(octree.sector_of(&element), Some(key));
        }
    }

    fn grid(octree: &mut Octree<u32>, count: u32) {
        for id in 0..count {
            #[allow(clippy::cast_precision_loss)]
            let offset = id as f32;
            let x = (offset % 5.0).mul_add(15.0, -40.0);
            let y = ((offset / 5.0).floor() % 5.0).mul_add(15.0, -40.0);
            let z = (offset / 25.0).floor().mul_add(15.0, -40.0);
            assert!(octree.insert(id, small_box(x, y, z)));
        }
    }

    #[test]
    fn test_octree_basic_insertion() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());

        assert!(octree.insert(1, small_box(10.0, 10.0, 10.0)));

        assert_eq!(octree.element_count(), 1);
        assert!(octree.contains(&1));
        assert_eq!(octree.query_aabb(&small_box(10.0, 10.0, 10.0)), vec![1]);
    }

    #[test]
    fn test_octree_subdivides_past_limit() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 9);

        assert_eq!(octree.sector_count(), 9);
        assert_eq!(octree.depth(), 1);
        assert_single_placement(&octree);
    }

    #[test]
    fn test_octree_query_completeness() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 60);

        for (element, aabb) in octree.iter().collect::<Vec<_>>() {
            assert!(octree.query_aabb(&aabb).contains(&element));
            assert!(octree.query_sphere(&aabb.center(), 0.1).contains(&element));
        }
        assert_single_placement(&octree);
    }

    #[test]
    fn test_octree_degenerate_and_outside_refused() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());

        let flat = AABB::from_center_extents(Vec3::zeros(), Vec3::zeros());
        assert!(!octree.insert(1, flat));
        assert!(!octree.update_or_insert(1, flat));
        assert!(!octree.insert(2, small_box(200.0, 0.0, 0.0)));

        assert!(octree.is_empty());
    }

    #[test]
    fn test_octree_straddling_element_stays_in_parent() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 9);
        assert!(octree.insert(100, small_box(0.0, 0.0, 0.0)));

        assert_eq!(octree.sector_of(&100), Some(octree.root()));
        assert!(octree.query_aabb(&small_box(0.2, 0.2, 0.2)).contains(&100));
    }

    #[test]
    fn test_octree_boundary_crossing_element_kept_in_root() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        let crossing = AABB::from_center_extents(Vec3::new(50.0, 0.0, 0.0), Vec3::repeat(2.0));

        assert!(octree.insert(7, crossing));
        assert_eq!(octree.sector_of(&7), Some(octree.root()));
        assert_eq!(octree.query_sphere(&Vec3::new(51.5, 0.0, 0.0), 0.1), vec![7]);
    }

    #[test]
    fn test_update_or_insert_idempotent_in_place() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 20);
        let before = octree.sector_of(&3);
        let sectors = octree.sector_count();
        let aabb = octree.aabb_of(&3).unwrap_or_else(|| small_box(0.0, 0.0, 0.0));

        for _ in 0..5 {
            assert!(octree.update_or_insert(3, aabb));
        }

        assert_eq!(octree.sector_of(&3), before);
        assert_eq!(octree.sector_count(), sectors);
        assert_eq!(octree.element_count(), 20);
    }

    #[test]
    fn test_update_or_insert_moves_element() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 20);
        let moved_to = small_box(-40.0, 45.0, 45.0);

        assert!(octree.update_or_insert(0, moved_to));

        assert_eq!(octree.element_count(), 20);
        assert_eq!(octree.aabb_of(&0), Some(moved_to));
        assert!(octree.query_aabb(&moved_to).contains(&0));
        assert!(!octree.query_aabb(&small_box(-40.0, -40.0, -40.0)).contains(&0));
        assert_single_placement(&octree);
    }

    #[test]
    fn test_update_or_insert_inserts_absent_element() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        assert!(octree.update_or_insert(9, small_box(1.0, 2.0, 3.0)));
        assert!(octree.contains(&9));
    }

    #[test]
    fn test_octree_erase() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 30);
        let aabb = octree.aabb_of(&12).unwrap_or_else(|| small_box(0.0, 0.0, 0.0));

        assert!(octree.erase(&12));

        assert_eq!(octree.element_count(), 29);
        assert!(!octree.query_aabb(&aabb).contains(&12));
        assert!(!octree.erase(&12));
        assert_single_placement(&octree);
    }

    #[test]
    fn test_auto_collapse_merges_children() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 9);
        assert!(octree.sector_count() > 1);

        for id in 0..6 {
            assert!(octree.erase(&id));
        }

        assert_eq!(octree.sector_count(), 1);
        assert_eq!(octree.element_count(), 3);
        assert_single_placement(&octree);
    }

    #[test]
    fn test_collapse_disabled_keeps_sectors() {
        let config = OctreeConfig::default().with_auto_collapse(false);
        let mut octree = Octree::with_boundary(50.0, config);
        grid(&mut octree, 9);
        let sectors = octree.sector_count();

        for id in 0..9 {
            assert!(octree.erase(&id));
        }

        assert_eq!(octree.sector_count(), sectors);
        assert!(octree.is_empty());
    }

    #[test]
    fn test_reserve_requires_collapse_disabled() {
        let mut octree: Octree<u32> = Octree::with_boundary(50.0, OctreeConfig::default());
        assert!(!octree.reserve(2));
        assert_eq!(octree.sector_count(), 1);

        let config = OctreeConfig::default().with_auto_collapse(false);
        let mut octree: Octree<u32> = Octree::with_boundary(50.0, config);
        assert!(octree.reserve(2));
        assert_eq!(octree.sector_count(), 1 + 8 + 64);
        assert_eq!(octree.depth(), 2);

        let mut leaves = 0;
        octree.for_leaf_sectors(|_, sector| {
            assert_eq!(sector.depth(), 2);
            leaves += 1;
        });
        assert_eq!(leaves, 64);
    }

    #[test]
    fn test_max_depth_stops_subdivision() {
        let config = OctreeConfig::default().with_max_depth(2);
        let mut octree = Octree::with_boundary(50.0, config);
        for id in 0..40 {
            assert!(octree.insert(id, small_box(40.0, 40.0, 40.0)));
        }

        assert_eq!(octree.depth(), 2);
        assert_eq!(octree.element_count(), 40);
        assert_single_placement(&octree);
    }

    #[test]
    fn test_clear() {
        let mut octree = Octree::with_boundary(50.0, OctreeConfig::default());
        grid(&mut octree, 30);
        octree.clear();

        assert!(octree.is_empty());
        assert_eq!(octree.sector_count(), 1);
        assert_eq!(octree.bounds(), AABB::cube(50.0));
    }

    #[test]
    fn test_config_validate() {
        assert!(OctreeConfig::default().validate().is_ok());

        let reserve_with_collapse = OctreeConfig {
            reserve_depth: 2,
            ..OctreeConfig::default()
        };
        assert!(reserve_with_collapse.validate().is_err());

        let limit = OctreeConfig::default().with_max_element_per_sector(2);
        assert_eq!(limit.element_limit(), 8);
        assert_eq!(limit.collapse_threshold(), 4);
    }
}
