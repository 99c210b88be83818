//! Budgeted incremental synchronization of node meshes
//!
//! Every tick walks the octree from the root in pre-order, skipping subtrees the
//! mirror already covers. Render nodes with stale meshes become extraction jobs
//! until the tick's budget is spent. A node that failed on its current content
//! only gets budget left over after the walk. Jobs run against a shared borrow of the
//! store (on the rayon pool when enabled) and results are committed afterwards,
//! so a published mesh always reflects one consistent voxel snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::time::Timestamp;
use crate::math::Region;
use crate::mesh::{ExtractLimits, MeshError, NodeMesh, VoxelKind, extract_node_mesh};
use crate::volume::config::VolumeConfig;
use crate::voxel::octree::{NodeHandle, Octree};
use crate::voxel::store::VoxelStore;

use super::events::{SyncEvent, SyncObserver};
use super::state::{NodeSyncState, SyncState};

/// Counters for one `sync` call
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub meshes_extracted: usize,
    pub meshes_cleared: usize,
    pub nodes_created: usize,
    pub nodes_removed: usize,
    pub properties_changed: usize,
    /// Extractions that failed and will be retried
    pub failures: usize,
}

impl SyncReport {
    /// Whether the consumer saw any change this tick
    pub fn had_changes(&self) -> bool {
        self.meshes_extracted + self.meshes_cleared + self.nodes_created + self.nodes_removed + self.properties_changed
            > 0
    }
}

struct Job {
    handle: NodeHandle,
    area: Region,
    previous_sync: Timestamp,
}

/// Mirrors an octree towards a consumer, a bounded amount of work per tick
pub struct SyncScheduler<V: VoxelKind> {
    mirror: HashMap<NodeHandle, SyncState>,
    root: Option<NodeHandle>,
    meshes: HashMap<NodeHandle, Arc<NodeMesh<V>>>,
    /// Nodes that already failed on their current content, retried with leftover budget
    retries: Vec<NodeHandle>,
}

impl<V: VoxelKind> Default for SyncScheduler<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: VoxelKind> SyncScheduler<V> {
    pub fn new() -> Self {
        Self {
            mirror: HashMap::new(),
            root: None,
            meshes: HashMap::new(),
            retries: Vec::new(),
        }
    }

    /// Root node as last mirrored
    pub fn root(&self) -> Option<NodeHandle> {
        self.root
    }

    pub fn state(&self, handle: NodeHandle) -> Option<&SyncState> {
        self.mirror.get(&handle)
    }

    /// Current published mesh of a node
    pub fn mesh(&self, handle: NodeHandle) -> Option<Arc<NodeMesh<V>>> {
        self.meshes.get(&handle).cloned()
    }

    pub fn mirrored_count(&self) -> usize {
        self.mirror.len()
    }

    /// Classify a node against its mirror
    pub fn node_state(&self, octree: &Octree, handle: NodeHandle) -> NodeSyncState {
        let Some(node) = octree.node(handle) else {
            return NodeSyncState::Pruned;
        };
        let mirror = self.mirror.get(&handle);
        if node.render_this_node() {
            match mirror {
                Some(state) if state.mesh_last_synchronised >= node.last_changed() => NodeSyncState::Clean,
                _ => NodeSyncState::MeshDirty,
            }
        } else {
            match mirror {
                Some(state) if state.oldest_mesh_sync >= node.last_changed() => NodeSyncState::Clean,
                _ => NodeSyncState::StructureDirty,
            }
        }
    }

    /// Run one tick of mesh synchronization stamped `now`
    pub fn sync(
        &mut self,
        octree: &mut Octree,
        store: &VoxelStore<V>,
        config: &VolumeConfig,
        now: Timestamp,
        observer: &mut dyn SyncObserver<V>,
    ) -> SyncReport {
        let mut report = SyncReport::default();

        let octree_root = octree.root();
        if self.root != octree_root {
            if let Some(old) = self.root.take() {
                self.remove_subtree(old, observer, &mut report);
            }
            if let Some(new) = octree_root {
                self.create_mirror(octree, new, None, observer, &mut report);
            }
            self.root = octree_root;
        }

        let mut jobs = Vec::new();
        let mut budget = config.max_node_syncs_per_tick;
        if let Some(root) = self.root {
            self.plan_node(octree, root, now, &mut budget, &mut jobs, observer, &mut report);
        }
        for handle in std::mem::take(&mut self.retries) {
            if budget == 0 {
                break;
            }
            let Some(node) = octree.node(handle) else { continue };
            let Some(state) = self.mirror.get_mut(&handle) else { continue };
            jobs.push(Job {
                handle,
                area: node.region(),
                previous_sync: state.mesh_last_synchronised,
            });
            state.mesh_last_synchronised = now;
            state.oldest_mesh_sync = now;
            budget -= 1;
        }

        let limits = ExtractLimits { max_vertices: config.max_vertices_per_node };
        let with_collision = config.use_collision_mesh;
        let extract = |job: &Job| extract_node_mesh(store, &job.area, &limits, with_collision);
        let results: Vec<Result<Option<NodeMesh<V>>, MeshError>> = if config.parallel_extraction && jobs.len() > 1 {
            jobs.par_iter().map(extract).collect()
        } else {
            jobs.iter().map(extract).collect()
        };

        for (job, result) in jobs.into_iter().zip(results) {
            self.commit(octree, job, result, now, observer, &mut report);
        }

        if report.had_changes() || report.failures > 0 {
            log::debug!(
                "sync @{}: {} extracted, {} cleared, {} created, {} removed, {} failed",
                now,
                report.meshes_extracted,
                report.meshes_cleared,
                report.nodes_created,
                report.nodes_removed,
                report.failures
            );
        }
        report
    }

    #[allow(clippy::too_many_arguments)]
    fn plan_node(
        &mut self,
        octree: &mut Octree,
        handle: NodeHandle,
        now: Timestamp,
        budget: &mut usize,
        jobs: &mut Vec<Job>,
        observer: &mut dyn SyncObserver<V>,
        report: &mut SyncReport,
    ) {
        if *budget == 0 {
            return;
        }
        let Some(node) = octree.node(handle) else { return };
        let Some(mut state) = self.mirror.get(&handle).copied() else { return };
        let last_changed = node.last_changed();
        if state.oldest_mesh_sync >= last_changed {
            return;
        }
        state.node_last_changed = last_changed;

        if node.render_this_node() {
            if state.mesh_last_synchronised < last_changed {
                if state.failed_change == Some(last_changed) {
                    self.retries.push(handle);
                } else {
                    jobs.push(Job {
                        handle,
                        area: node.region(),
                        previous_sync: state.mesh_last_synchronised,
                    });
                    *budget -= 1;
                    state.mesh_last_synchronised = now;
                }
            }
            // a collapsed node draws its whole subtree, so children leave the mirror
            let stale: Vec<NodeHandle> = state.mirrored_children().collect();
            state.children = [None; 8];
            state.oldest_mesh_sync = state.mesh_last_synchronised;
            self.mirror.insert(handle, state);
            for child in stale {
                self.remove_subtree(child, observer, report);
            }
            return;
        }

        let octree_children: [Option<NodeHandle>; 8] = std::array::from_fn(|octant| node.child(octant));
        if state.has_mesh {
            self.meshes.remove(&handle);
            octree.set_mesh_updated(handle, now, false);
            state.has_mesh = false;
            observer.on_event(SyncEvent::MeshUpdated { handle, mesh: None });
            report.meshes_cleared += 1;
        }
        state.mesh_last_synchronised = now;

        for octant in 0..8 {
            let current = state.children[octant];
            let wanted = octree_children[octant];
            if current == wanted {
                continue;
            }
            if let Some(old) = current {
                self.remove_subtree(old, observer, report);
            }
            if let Some(new) = wanted {
                self.create_mirror(octree, new, Some(handle), observer, report);
            }
            state.children[octant] = wanted;
        }
        self.mirror.insert(handle, state);

        let mut oldest = now;
        for child in octree_children.into_iter().flatten() {
            self.plan_node(octree, child, now, budget, jobs, observer, report);
            if let Some(child_state) = self.mirror.get(&child) {
                oldest = oldest.min(child_state.oldest_mesh_sync);
            }
        }
        if let Some(state) = self.mirror.get_mut(&handle) {
            state.oldest_mesh_sync = oldest;
        }
    }

    fn commit(
        &mut self,
        octree: &mut Octree,
        job: Job,
        result: Result<Option<NodeMesh<V>>, MeshError>,
        now: Timestamp,
        observer: &mut dyn SyncObserver<V>,
        report: &mut SyncReport,
    ) {
        let handle = job.handle;
        if !octree.contains(handle) || !self.mirror.contains_key(&handle) {
            return;
        }

        match result {
            Ok(mesh) => {
                let mesh = mesh.map(Arc::new);
                let has_mesh = mesh.is_some();
                match &mesh {
                    Some(mesh) => {
                        self.meshes.insert(handle, Arc::clone(mesh));
                    }
                    None => {
                        self.meshes.remove(&handle);
                    }
                }
                octree.set_mesh_updated(handle, now, has_mesh);
                if let Some(state) = self.mirror.get_mut(&handle) {
                    state.has_mesh = has_mesh;
                    state.failed_change = None;
                }
                observer.on_event(SyncEvent::MeshUpdated { handle, mesh });
                report.meshes_extracted += 1;
            }
            Err(err) => {
                let failure = Error::ExtractionFailure { node: handle, reason: err.to_string() };
                log::warn!("{}", failure);
                report.failures += 1;
                // leave the node and its ancestors dirty so the next tick retries
                let mut current = Some(handle);
                let mut first = true;
                while let Some(h) = current {
                    let Some(state) = self.mirror.get_mut(&h) else { break };
                    if first {
                        state.mesh_last_synchronised = job.previous_sync;
                        state.failed_change = Some(state.node_last_changed);
                        first = false;
                    }
                    state.oldest_mesh_sync = state.oldest_mesh_sync.min(job.previous_sync);
                    current = state.parent;
                }
            }
        }
    }

    fn create_mirror(
        &mut self,
        octree: &Octree,
        handle: NodeHandle,
        parent: Option<NodeHandle>,
        observer: &mut dyn SyncObserver<V>,
        report: &mut SyncReport,
    ) {
        let Some(node) = octree.node(handle) else { return };
        self.mirror.insert(handle, SyncState::new(parent));
        observer.on_event(SyncEvent::NodeCreated {
            handle,
            parent,
            lower_corner: node.lower_corner(),
            size: node.size(),
        });
        report.nodes_created += 1;
    }

    /// Drop a mirrored subtree, children before parents
    fn remove_subtree(&mut self, handle: NodeHandle, observer: &mut dyn SyncObserver<V>, report: &mut SyncReport) {
        let Some(state) = self.mirror.remove(&handle) else { return };
        for child in state.mirrored_children() {
            self.remove_subtree(child, observer, report);
        }
        self.meshes.remove(&handle);
        observer.on_event(SyncEvent::NodeRemoved { handle });
        report.nodes_removed += 1;
    }

    /// Push renderer/collider settings to nodes that have not seen them yet.
    /// Returns the number of `PropertiesChanged` events emitted.
    pub fn sync_properties(
        &mut self,
        octree: &Octree,
        config: &VolumeConfig,
        now: Timestamp,
        observer: &mut dyn SyncObserver<V>,
    ) -> usize {
        let mut handles: Vec<NodeHandle> = self.mirror.keys().copied().collect();
        handles.sort_unstable();

        let mut emitted = 0;
        for handle in handles {
            let Some(node) = octree.node(handle) else { continue };
            let Some(state) = self.mirror.get_mut(&handle) else { continue };
            let visible = config.renderer.enabled && node.render_this_node();
            let stale = state.last_synchronised_with_renderer < config.renderer.modified
                || state.last_synchronised_with_collider < config.collider.modified
                || state.visible != visible;
            if !stale {
                continue;
            }
            state.visible = visible;
            state.last_synchronised_with_renderer = now;
            state.last_synchronised_with_collider = now;
            observer.on_event(SyncEvent::PropertiesChanged {
                handle,
                visible,
                cast_shadows: config.renderer.cast_shadows,
                receive_shadows: config.renderer.receive_shadows,
                collider_enabled: config.collider.enabled && node.render_this_node(),
            });
            emitted += 1;
        }
        emitted
    }
}
