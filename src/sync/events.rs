//! Change notifications for scene-graph consumers

use std::sync::Arc;

use crate::core::types::IVec3;
use crate::mesh::{NodeMesh, VoxelKind};
use crate::voxel::octree::NodeHandle;

/// One change the consumer should mirror.
///
/// For any node, `NodeCreated` precedes every other event and `NodeRemoved`
/// is the last one. Parents are created before their children and removed
/// after them.
#[derive(Debug, Clone)]
pub enum SyncEvent<V: VoxelKind> {
    NodeCreated {
        handle: NodeHandle,
        parent: Option<NodeHandle>,
        lower_corner: IVec3,
        size: i32,
    },
    NodeRemoved {
        handle: NodeHandle,
    },
    /// `None` means the node currently has nothing to draw
    MeshUpdated {
        handle: NodeHandle,
        mesh: Option<Arc<NodeMesh<V>>>,
    },
    PropertiesChanged {
        handle: NodeHandle,
        visible: bool,
        cast_shadows: bool,
        receive_shadows: bool,
        collider_enabled: bool,
    },
}

impl<V: VoxelKind> SyncEvent<V> {
    pub fn handle(&self) -> NodeHandle {
        match self {
            SyncEvent::NodeCreated { handle, .. }
            | SyncEvent::NodeRemoved { handle }
            | SyncEvent::MeshUpdated { handle, .. }
            | SyncEvent::PropertiesChanged { handle, .. } => *handle,
        }
    }
}

/// Receives sync events during `update`
pub trait SyncObserver<V: VoxelKind> {
    fn on_event(&mut self, event: SyncEvent<V>);
}

impl<V: VoxelKind> SyncObserver<V> for Vec<SyncEvent<V>> {
    fn on_event(&mut self, event: SyncEvent<V>) {
        self.push(event);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl<V: VoxelKind> SyncObserver<V> for NullObserver {
    fn on_event(&mut self, _event: SyncEvent<V>) {}
}

/// Adapts a closure into an observer
pub struct FnObserver<F>(pub F);

impl<V: VoxelKind, F: FnMut(SyncEvent<V>)> SyncObserver<V> for FnObserver<F> {
    fn on_event(&mut self, event: SyncEvent<V>) {
        (self.0)(event);
    }
}
