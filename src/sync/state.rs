//! Consumer-side mirror of octree nodes

use crate::core::time::Timestamp;
use crate::voxel::octree::NodeHandle;

/// What the consumer last saw of one node.
///
/// `oldest_mesh_sync` is the minimum `mesh_last_synchronised` over the mirrored
/// subtree, so a whole subtree can be skipped once it exceeds the node's
/// `last_changed`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    pub parent: Option<NodeHandle>,
    pub children: [Option<NodeHandle>; 8],
    pub mesh_last_synchronised: Timestamp,
    pub oldest_mesh_sync: Timestamp,
    /// `last_changed` of the node when it was last visited
    pub node_last_changed: Timestamp,
    /// `last_changed` at the most recent failed extraction
    pub failed_change: Option<Timestamp>,
    pub last_synchronised_with_renderer: Timestamp,
    pub last_synchronised_with_collider: Timestamp,
    pub has_mesh: bool,
    pub visible: bool,
}

impl SyncState {
    pub fn new(parent: Option<NodeHandle>) -> Self {
        Self { parent, ..Default::default() }
    }

    pub fn mirrored_children(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.children.iter().flatten().copied()
    }
}

/// Where a node stands relative to the consumer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeSyncState {
    /// Mirror matches the octree
    Clean,
    /// Render node whose mesh is older than its content
    MeshDirty,
    /// Structural node with stale descendants or mirror
    StructureDirty,
    /// Handle no longer names a live node
    Pruned,
}
