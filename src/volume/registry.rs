//! Handle-based access to many volumes
//!
//! Hosts that cannot hold Rust references (scripting layers, FFI) address
//! volumes and nodes through copyable handles. Every call validates the handle
//! and answers `Error::InvalidHandle` once the volume is destroyed.

use std::path::Path;
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::time::Timestamp;
use crate::core::types::{IVec3, Result};
use crate::math::Region;
use crate::mesh::{NodeMesh, VoxelKind};
use crate::sync::{NullObserver, SyncEvent};
use crate::voxel::octree::{NodeHandle, OctreeNode};

use super::config::VolumeConfig;
use super::volume::Volume;

/// Generational index of a registered volume
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VolumeHandle {
    index: u32,
    generation: u32,
}

struct Entry<V: VoxelKind> {
    generation: u32,
    volume: Option<Volume<V>>,
    /// Whether `update` queues events for `drain_events`
    recording: bool,
    /// Events produced by `update` and not yet drained
    events: Vec<SyncEvent<V>>,
}

/// Owns volumes on behalf of a host
pub struct VolumeRegistry<V: VoxelKind> {
    entries: Vec<Entry<V>>,
    free: Vec<u32>,
}

impl<V: VoxelKind> Default for VolumeRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: VoxelKind> VolumeRegistry<V> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), free: Vec::new() }
    }

    /// Number of live volumes
    pub fn len(&self) -> usize {
        self.entries.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&mut self, volume: Volume<V>) -> VolumeHandle {
        match self.free.pop() {
            Some(index) => {
                let entry = &mut self.entries[index as usize];
                entry.volume = Some(volume);
                entry.recording = false;
                VolumeHandle { index, generation: entry.generation }
            }
            None => {
                self.entries.push(Entry {
                    generation: 0,
                    volume: Some(volume),
                    recording: false,
                    events: Vec::new(),
                });
                VolumeHandle { index: self.entries.len() as u32 - 1, generation: 0 }
            }
        }
    }

    fn entry_mut(&mut self, handle: VolumeHandle) -> Result<&mut Entry<V>> {
        self.entries
            .get_mut(handle.index as usize)
            .filter(|e| e.generation == handle.generation && e.volume.is_some())
            .ok_or(Error::InvalidHandle)
    }

    pub fn create(&mut self, region: Region, config: VolumeConfig) -> Result<VolumeHandle> {
        Ok(self.insert(Volume::new(region, config)?))
    }

    pub fn create_at(&mut self, path: &Path, region: Region, config: VolumeConfig) -> Result<VolumeHandle> {
        Ok(self.insert(Volume::create_at(path, region, config)?))
    }

    pub fn open(&mut self, path: &Path, config: VolumeConfig) -> Result<VolumeHandle> {
        Ok(self.insert(Volume::open(path, config)?))
    }

    /// Destroy a volume, flushing it first when `persist` is set.
    ///
    /// If the flush fails the volume stays registered and the call can be retried.
    pub fn destroy(&mut self, handle: VolumeHandle, persist: bool) -> Result<()> {
        let entry = self.entry_mut(handle)?;
        if persist {
            if let Some(volume) = entry.volume.as_mut() {
                volume.flush()?;
            }
        }
        if let Some(volume) = entry.volume.take() {
            volume.shutdown(false)?;
        }
        entry.events.clear();
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);
        Ok(())
    }

    pub fn volume(&self, handle: VolumeHandle) -> Result<&Volume<V>> {
        self.entries
            .get(handle.index as usize)
            .filter(|e| e.generation == handle.generation)
            .and_then(|e| e.volume.as_ref())
            .ok_or(Error::InvalidHandle)
    }

    pub fn volume_mut(&mut self, handle: VolumeHandle) -> Result<&mut Volume<V>> {
        self.entry_mut(handle)?.volume.as_mut().ok_or(Error::InvalidHandle)
    }

    fn node(&self, handle: VolumeHandle, node: NodeHandle) -> Result<&OctreeNode> {
        self.volume(handle)?.node(node).ok_or(Error::InvalidHandle)
    }

    pub fn get_voxel(&self, handle: VolumeHandle, x: i32, y: i32, z: i32) -> Result<V> {
        self.volume(handle)?.get_voxel(IVec3::new(x, y, z))
    }

    pub fn set_voxel(&mut self, handle: VolumeHandle, x: i32, y: i32, z: i32, voxel: V) -> Result<()> {
        self.volume_mut(handle)?.set_voxel(IVec3::new(x, y, z), voxel)
    }

    /// Run one sync tick. Returns whether anything changed for the consumer.
    pub fn update(&mut self, handle: VolumeHandle) -> Result<bool> {
        let entry = self.entry_mut(handle)?;
        let volume = entry.volume.as_mut().ok_or(Error::InvalidHandle)?;
        let report = if entry.recording {
            volume.update(&mut entry.events)
        } else {
            volume.update(&mut NullObserver)
        };
        Ok(report.had_changes())
    }

    /// Queue sync events for `drain_events`. Off by default; hosts that only poll
    /// node state never accumulate events. Turning it off drops the queue.
    pub fn record_events(&mut self, handle: VolumeHandle, enabled: bool) -> Result<()> {
        let entry = self.entry_mut(handle)?;
        entry.recording = enabled;
        if !enabled {
            entry.events = Vec::new();
        }
        Ok(())
    }

    /// Take the events queued by previous `update` calls
    pub fn drain_events(&mut self, handle: VolumeHandle) -> Result<Vec<SyncEvent<V>>> {
        Ok(std::mem::take(&mut self.entry_mut(handle)?.events))
    }

    pub fn has_root_node(&self, handle: VolumeHandle) -> Result<bool> {
        Ok(self.volume(handle)?.root_node().is_some())
    }

    pub fn root_node(&self, handle: VolumeHandle) -> Result<Option<NodeHandle>> {
        Ok(self.volume(handle)?.root_node())
    }

    pub fn has_child_node(&self, handle: VolumeHandle, node: NodeHandle, ox: u32, oy: u32, oz: u32) -> Result<bool> {
        Ok(self.child_node(handle, node, ox, oy, oz)?.is_some())
    }

    pub fn child_node(
        &self,
        handle: VolumeHandle,
        node: NodeHandle,
        ox: u32,
        oy: u32,
        oz: u32,
    ) -> Result<Option<NodeHandle>> {
        if ox > 1 || oy > 1 || oz > 1 {
            let clamp = |o: u32| o.min(i32::MAX as u32) as i32;
            return Err(Error::OutOfRange { x: clamp(ox), y: clamp(oy), z: clamp(oz) });
        }
        let volume = self.volume(handle)?;
        if volume.node(node).is_none() {
            return Err(Error::InvalidHandle);
        }
        Ok(volume.octree().child(node, ox, oy, oz))
    }

    pub fn node_position(&self, handle: VolumeHandle, node: NodeHandle) -> Result<IVec3> {
        Ok(self.node(handle, node)?.lower_corner())
    }

    pub fn node_has_mesh(&self, handle: VolumeHandle, node: NodeHandle) -> Result<bool> {
        Ok(self.node(handle, node)?.has_mesh())
    }

    pub fn render_this_node(&self, handle: VolumeHandle, node: NodeHandle) -> Result<bool> {
        Ok(self.node(handle, node)?.render_this_node())
    }

    pub fn mesh_last_updated(&self, handle: VolumeHandle, node: NodeHandle) -> Result<Timestamp> {
        Ok(self.node(handle, node)?.mesh_last_updated())
    }

    pub fn node_last_changed(&self, handle: VolumeHandle, node: NodeHandle) -> Result<Timestamp> {
        Ok(self.node(handle, node)?.last_changed())
    }

    pub fn node_mesh(&self, handle: VolumeHandle, node: NodeHandle) -> Result<Option<Arc<NodeMesh<V>>>> {
        self.node(handle, node)?;
        Ok(self.volume(handle)?.node_mesh(node))
    }

    pub fn enclosing_region(&self, handle: VolumeHandle) -> Result<Region> {
        Ok(*self.volume(handle)?.enclosing_region())
    }

    pub fn current_time(&self, handle: VolumeHandle) -> Result<Timestamp> {
        Ok(self.volume(handle)?.current_time())
    }
}
