//! Octree node and handle types

use crate::core::time::Timestamp;
use crate::core::types::IVec3;
use crate::math::Region;

/// Opaque node identity: arena slot plus generation.
///
/// A handle stays valid until its node is pruned. A node later created in the
/// same slot gets a new generation, so stale handles never alias it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeHandle {
    /// Pack into a single integer for hosts that want a flat id
    pub fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

/// Octant index from a 3-bit (x, y, z) address
pub fn octant_index(ox: u32, oy: u32, oz: u32) -> usize {
    debug_assert!(ox < 2 && oy < 2 && oz < 2);
    ((oz << 2) | (oy << 1) | ox) as usize
}

/// (x, y, z) offsets of an octant index
pub fn octant_offset(octant: usize) -> IVec3 {
    IVec3::new((octant & 1) as i32, ((octant >> 1) & 1) as i32, ((octant >> 2) & 1) as i32)
}

/// One cubical node of the octree
#[derive(Clone, Debug)]
pub struct OctreeNode {
    pub(super) lower_corner: IVec3,
    /// 0 for leaf-sized nodes, increasing towards the root
    pub(super) level: u8,
    pub(super) size: i32,
    pub(super) parent: Option<NodeHandle>,
    pub(super) children: [Option<NodeHandle>; 8],
    /// Non-empty voxels inside the subregion; a live node always has at least one
    pub(super) solid_count: u32,
    pub(super) last_changed: Timestamp,
    pub(super) mesh_last_updated: Timestamp,
    pub(super) has_mesh: bool,
    pub(super) render_this_node: bool,
}

impl OctreeNode {
    pub(super) fn new(lower_corner: IVec3, level: u8, size: i32, parent: Option<NodeHandle>) -> Self {
        Self {
            lower_corner,
            level,
            size,
            parent,
            children: [None; 8],
            solid_count: 0,
            last_changed: 0,
            mesh_last_updated: 0,
            has_mesh: false,
            render_this_node: level == 0,
        }
    }

    /// Minimum voxel coordinate covered by this node
    pub fn lower_corner(&self) -> IVec3 {
        self.lower_corner
    }

    /// Edge length in voxels
    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Subregion covered by this node (may extend past the volume region)
    pub fn region(&self) -> Region {
        Region::new_unchecked(self.lower_corner, self.lower_corner + IVec3::splat(self.size - 1))
    }

    pub fn contains(&self, pos: IVec3) -> bool {
        let rel = pos - self.lower_corner;
        rel.cmpge(IVec3::ZERO).all() && rel.cmplt(IVec3::splat(self.size)).all()
    }

    /// Octant of this node that contains `pos`
    pub fn octant_of(&self, pos: IVec3) -> usize {
        let half = self.size / 2;
        let rel = pos - self.lower_corner;
        let o = rel.cmpge(IVec3::splat(half));
        octant_index(o.x as u32, o.y as u32, o.z as u32)
    }

    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    pub fn child(&self, octant: usize) -> Option<NodeHandle> {
        self.children[octant]
    }

    pub fn children(&self) -> impl Iterator<Item = (usize, NodeHandle)> + '_ {
        self.children
            .iter()
            .enumerate()
            .filter_map(|(octant, child)| child.map(|c| (octant, c)))
    }

    pub fn child_count(&self) -> usize {
        self.children.iter().flatten().count()
    }

    pub fn solid_count(&self) -> u32 {
        self.solid_count
    }

    /// Stamp of the latest voxel change affecting this node or a descendant
    pub fn last_changed(&self) -> Timestamp {
        self.last_changed
    }

    /// Stamp of the last mesh regeneration for this node
    pub fn mesh_last_updated(&self) -> Timestamp {
        self.mesh_last_updated
    }

    pub fn has_mesh(&self) -> bool {
        self.has_mesh
    }

    /// Whether this node is drawn itself instead of its children
    pub fn render_this_node(&self) -> bool {
        self.render_this_node
    }
}
