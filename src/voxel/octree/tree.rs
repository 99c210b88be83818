//! Sparse octree indexing the non-empty content of a voxel store

use crate::core::error::Error;
use crate::core::time::Timestamp;
use crate::core::types::{IVec3, Result};
use crate::math::Region;
use crate::voxel::store::VoxelStore;
use crate::voxel::voxel::Voxel;

use super::node::{NodeHandle, OctreeNode, octant_index, octant_offset};

/// Largest accepted leaf edge length
const MAX_BASE_NODE_SIZE: u32 = 1 << 12;

#[derive(Debug, Clone)]
struct Slot {
    generation: u32,
    node: Option<OctreeNode>,
}

/// Structural changes caused by one `mark_dirty` call
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MarkOutcome {
    pub created: Vec<NodeHandle>,
    pub pruned: Vec<NodeHandle>,
}

/// Sparse octree over a volume region.
///
/// Nodes live in a generational arena. A node exists iff its subregion holds at
/// least one non-empty voxel, so empty subtrees are simply absent. The root is
/// anchored at the region's lower corner and covers the region rounded up to a
/// power-of-two multiple of the leaf size.
#[derive(Debug, Clone)]
pub struct Octree {
    region: Region,
    base_node_size: i32,
    root_level: u8,
    /// Subtrees with at most this many solid voxels render as one node (0 disables)
    lod_collapse_voxels: u32,
    slots: Vec<Slot>,
    free: Vec<u32>,
    root: Option<NodeHandle>,
    live: usize,
}

impl Octree {
    /// Create an empty octree
    pub fn new(region: Region, base_node_size: u32, lod_collapse_voxels: u32) -> Result<Self> {
        if base_node_size < 2 || !base_node_size.is_power_of_two() || base_node_size > MAX_BASE_NODE_SIZE {
            return Err(Error::InvalidConfig(format!(
                "base node size must be a power of two in 2..={}, got {}",
                MAX_BASE_NODE_SIZE, base_node_size
            )));
        }
        let base = base_node_size as i32;
        let extent = region.dimensions().max_element() as i64;
        let mut root_level = 0u8;
        while (base as i64) << root_level < extent {
            root_level += 1;
        }
        // the root and a one voxel border for neighbour reads must stay in i32
        let root_size = (base as i64) << root_level;
        let lower = region.lower().as_i64vec3();
        if lower.min_element() <= i32::MIN as i64 || (lower.max_element() + root_size) > i32::MAX as i64 {
            return Err(Error::InvalidRegion);
        }

        Ok(Self {
            region,
            base_node_size: base,
            root_level,
            lod_collapse_voxels,
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            live: 0,
        })
    }

    /// Build the octree for everything currently in `store`
    pub fn from_store<V: Voxel>(
        store: &VoxelStore<V>,
        base_node_size: u32,
        lod_collapse_voxels: u32,
        timestamp: Timestamp,
    ) -> Result<Self> {
        let mut octree = Self::new(*store.region(), base_node_size, lod_collapse_voxels)?;
        let mut outcome = MarkOutcome::default();
        for pos in store.solid_positions() {
            octree.insert_path(pos, timestamp, &mut outcome);
        }
        Ok(octree)
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Leaf edge length in voxels
    pub fn base_node_size(&self) -> i32 {
        self.base_node_size
    }

    pub fn root_level(&self) -> u8 {
        self.root_level
    }

    /// Edge length of the root node in voxels
    pub fn root_size(&self) -> i32 {
        self.base_node_size << self.root_level
    }

    pub fn lod_collapse_voxels(&self) -> u32 {
        self.lod_collapse_voxels
    }

    pub fn root(&self) -> Option<NodeHandle> {
        self.root
    }

    /// Look up a live node; `None` for pruned or foreign handles
    pub fn node(&self, handle: NodeHandle) -> Option<&OctreeNode> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, handle: NodeHandle) -> Option<&mut OctreeNode> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.node(handle).is_some()
    }

    pub fn has_child(&self, handle: NodeHandle, ox: u32, oy: u32, oz: u32) -> bool {
        self.child(handle, ox, oy, oz).is_some()
    }

    pub fn child(&self, handle: NodeHandle, ox: u32, oy: u32, oz: u32) -> Option<NodeHandle> {
        self.node(handle)?.child(octant_index(ox, oy, oz))
    }

    /// Lower corner of the node's subregion
    pub fn node_position(&self, handle: NodeHandle) -> Option<IVec3> {
        self.node(handle).map(|node| node.lower_corner())
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &OctreeNode)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|node| {
                (NodeHandle { index: index as u32, generation: slot.generation }, node)
            })
        })
    }

    /// Existing nodes from the root down to the deepest node containing `pos`
    pub fn path(&self, pos: IVec3) -> Vec<NodeHandle> {
        let mut path = Vec::with_capacity(self.root_level as usize + 1);
        let mut current = self.root;
        while let Some(handle) = current {
            let Some(node) = self.node(handle) else { break };
            if !node.contains(pos) {
                break;
            }
            path.push(handle);
            if node.level() == 0 {
                break;
            }
            current = node.child(node.octant_of(pos));
        }
        path
    }

    /// Deepest existing node containing `pos`
    pub fn deepest_node(&self, pos: IVec3) -> Option<NodeHandle> {
        self.path(pos).last().copied()
    }

    /// Lower corner of the leaf-sized cell containing `pos`
    pub fn leaf_corner(&self, pos: IVec3) -> IVec3 {
        let base = IVec3::splat(self.base_node_size);
        let lower = self.region.lower();
        lower + (pos - lower).div_euclid(base) * base
    }

    fn alloc(&mut self, node: OctreeNode) -> NodeHandle {
        self.live += 1;
        match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeHandle { index, generation: slot.generation }
            }
            None => {
                self.slots.push(Slot { generation: 0, node: Some(node) });
                NodeHandle { index: self.slots.len() as u32 - 1, generation: 0 }
            }
        }
    }

    /// Free a node and anything still hanging below it
    fn release(&mut self, handle: NodeHandle, pruned: &mut Vec<NodeHandle>) {
        let Some(slot) = self.slots.get_mut(handle.index as usize) else { return };
        if slot.generation != handle.generation {
            return;
        }
        let Some(node) = slot.node.take() else { return };
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        for (_, child) in node.children() {
            self.release(child, pruned);
        }
        pruned.push(handle);
    }

    fn decide_render(node: &OctreeNode, lod_collapse_voxels: u32) -> bool {
        node.level == 0 || (lod_collapse_voxels > 0 && node.solid_count <= lod_collapse_voxels)
    }

    /// Record a voxel change at `pos`.
    ///
    /// `occupancy_delta` is +1 when the voxel became non-empty, -1 when it became
    /// empty and 0 when only its value changed. Every surviving node on the path
    /// gets `last_changed = timestamp`.
    pub fn mark_dirty(&mut self, pos: IVec3, occupancy_delta: i32, timestamp: Timestamp) -> MarkOutcome {
        let mut outcome = MarkOutcome::default();
        if !self.region.contains(pos) {
            return outcome;
        }
        match occupancy_delta.signum() {
            1 => self.insert_path(pos, timestamp, &mut outcome),
            -1 => self.remove_path(pos, timestamp, &mut outcome),
            _ => {
                self.touch(pos, timestamp);
            }
        }
        outcome
    }

    fn insert_path(&mut self, pos: IVec3, timestamp: Timestamp, outcome: &mut MarkOutcome) {
        let lod = self.lod_collapse_voxels;
        let mut current = match self.root {
            Some(root) => root,
            None => {
                let root = self.alloc(OctreeNode::new(
                    self.region.lower(),
                    self.root_level,
                    self.root_size(),
                    None,
                ));
                self.root = Some(root);
                outcome.created.push(root);
                root
            }
        };

        loop {
            let Some(node) = self.node_mut(current) else { return };
            node.solid_count += 1;
            node.last_changed = timestamp;
            node.render_this_node = Self::decide_render(node, lod);
            if node.level == 0 {
                return;
            }
            let octant = node.octant_of(pos);
            let next = node.children[octant];
            current = match next {
                Some(child) => child,
                None => {
                    let half = node.size / 2;
                    let lower = node.lower_corner + octant_offset(octant) * half;
                    let level = node.level - 1;
                    let child = self.alloc(OctreeNode::new(lower, level, half, Some(current)));
                    if let Some(parent) = self.node_mut(current) {
                        parent.children[octant] = Some(child);
                    }
                    outcome.created.push(child);
                    child
                }
            };
        }
    }

    fn remove_path(&mut self, pos: IVec3, timestamp: Timestamp, outcome: &mut MarkOutcome) {
        let lod = self.lod_collapse_voxels;
        let path = self.path(pos);
        for &handle in &path {
            if let Some(node) = self.node_mut(handle) {
                node.solid_count = node.solid_count.saturating_sub(1);
            }
        }

        for &handle in path.iter().rev() {
            let Some(node) = self.node_mut(handle) else { continue };
            if node.solid_count > 0 {
                node.last_changed = timestamp;
                node.render_this_node = Self::decide_render(node, lod);
                continue;
            }

            let parent = node.parent;
            let lower = node.lower_corner;
            self.release(handle, &mut outcome.pruned);
            match parent {
                Some(parent) => {
                    if let Some(parent) = self.node_mut(parent) {
                        let octant = parent.octant_of(lower);
                        parent.children[octant] = None;
                    }
                }
                None => self.root = None,
            }
        }
    }

    /// Stamp the existing path to `pos` without structural change.
    /// Returns the number of nodes stamped.
    pub fn touch(&mut self, pos: IVec3, timestamp: Timestamp) -> usize {
        let path = self.path(pos);
        for &handle in &path {
            if let Some(node) = self.node_mut(handle) {
                node.last_changed = node.last_changed.max(timestamp);
            }
        }
        path.len()
    }

    /// Record the result of a mesh regeneration
    pub fn set_mesh_updated(&mut self, handle: NodeHandle, timestamp: Timestamp, has_mesh: bool) -> bool {
        match self.node_mut(handle) {
            Some(node) => {
                node.mesh_last_updated = timestamp;
                node.has_mesh = has_mesh;
                true
            }
            None => false,
        }
    }
}
