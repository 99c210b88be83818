//! A single voxel volume: store, octree and mesh sync in one owner

use std::path::Path;
use std::sync::Arc;

use crate::core::error::Error;
use crate::core::time::{Clock, Timestamp};
use crate::core::types::{IVec3, Result};
use crate::math::Region;
use crate::mesh::{NodeMesh, VoxelKind};
use crate::storage::{Dataset, VolumeMetadata};
use crate::sync::{NodeSyncState, SyncObserver, SyncReport, SyncScheduler};
use crate::voxel::color::Color;
use crate::voxel::material::MaterialSet;
use crate::voxel::octree::{NodeHandle, Octree, OctreeNode};
use crate::voxel::store::VoxelStore;

use super::config::{ColliderConfig, RendererConfig, VolumeConfig};

/// Volume of colored cubes
pub type ColoredCubesVolume = Volume<Color>;
/// Volume of smooth, multi-material terrain
pub type TerrainVolume = Volume<MaterialSet>;

/// Sparse voxel volume with incremental mesh synchronization.
///
/// All mutation goes through `&mut self`, so a tick's extraction never sees
/// a half-applied write.
pub struct Volume<V: VoxelKind> {
    config: VolumeConfig,
    clock: Clock,
    store: VoxelStore<V>,
    octree: Octree,
    scheduler: SyncScheduler<V>,
    dataset: Option<Dataset>,
}

impl<V: VoxelKind> Volume<V> {
    /// Create an empty in-memory volume
    pub fn new(region: Region, config: VolumeConfig) -> Result<Self> {
        config.validate()?;
        let octree = Octree::new(region, config.base_node_size, config.lod_collapse_voxels)?;
        let mut volume = Self {
            config,
            clock: Clock::new(),
            store: VoxelStore::new(region),
            octree,
            scheduler: SyncScheduler::new(),
            dataset: None,
        };
        volume.stamp_properties();
        log::info!(
            "Created {:?} volume {:?}..={:?} (root level {})",
            V::KIND,
            region.lower(),
            region.upper(),
            volume.octree.root_level()
        );
        Ok(volume)
    }

    /// Create an empty volume backed by a new dataset directory
    pub fn create_at(path: &Path, region: Region, config: VolumeConfig) -> Result<Self> {
        let mut volume = Self::new(region, config)?;
        let metadata = VolumeMetadata::new(V::KIND, region, volume.config.base_node_size);
        volume.dataset = Some(Dataset::create(path, &metadata)?);
        Ok(volume)
    }

    /// Load a volume from a dataset directory.
    ///
    /// The dataset's base node size overrides the one in `config`.
    pub fn open(path: &Path, config: VolumeConfig) -> Result<Self> {
        let (dataset, metadata) = Dataset::open(path)?;
        if metadata.kind != V::KIND {
            return Err(Error::InvalidConfig(format!(
                "dataset holds {:?} voxels, expected {:?}",
                metadata.kind,
                V::KIND
            )));
        }
        let config = VolumeConfig { base_node_size: metadata.base_node_size, ..config };
        config.validate()?;

        let mut store = VoxelStore::new(metadata.region);
        for (coord, page) in dataset.read_pages::<V>()? {
            store.insert_page(coord, page);
        }

        let mut clock = Clock::new();
        let loaded_at = clock.advance();
        let octree = Octree::from_store(&store, config.base_node_size, config.lod_collapse_voxels, loaded_at)?;
        log::info!(
            "Opened volume at {} ({} pages, {} nodes)",
            path.display(),
            store.page_count(),
            octree.len()
        );

        let mut volume = Self {
            config,
            clock,
            store,
            octree,
            scheduler: SyncScheduler::new(),
            dataset: Some(dataset),
        };
        volume.stamp_properties();
        Ok(volume)
    }

    fn stamp_properties(&mut self) {
        let now = self.clock.advance();
        self.config.renderer.modified = now;
        self.config.collider.modified = now;
    }

    pub fn enclosing_region(&self) -> &Region {
        self.store.region()
    }

    pub fn config(&self) -> &VolumeConfig {
        &self.config
    }

    pub fn current_time(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn octree(&self) -> &Octree {
        &self.octree
    }

    pub fn store(&self) -> &VoxelStore<V> {
        &self.store
    }

    pub fn dataset_path(&self) -> Option<&Path> {
        self.dataset.as_ref().map(|d| d.root())
    }

    pub fn get_voxel(&self, pos: IVec3) -> Result<V> {
        self.store.get(pos)
    }

    /// Read a voxel, anything outside the region is empty
    pub fn get_voxel_or_empty(&self, pos: IVec3) -> V {
        self.store.get_or_empty(pos)
    }

    /// Write a voxel and invalidate every node whose mesh reads it
    pub fn set_voxel(&mut self, pos: IVec3, voxel: V) -> Result<()> {
        let voxel = voxel.normalized();
        let previous = self.store.set(pos, voxel)?;
        if previous == voxel {
            return Ok(());
        }

        let delta = voxel.is_solid() as i32 - previous.is_solid() as i32;
        let now = self.clock.advance();
        self.octree.mark_dirty(pos, delta, now);
        self.touch_neighbours(pos, now);
        Ok(())
    }

    /// Meshes sample one voxel past their node, so neighbouring leaves are stale too
    fn touch_neighbours(&mut self, pos: IVec3, now: Timestamp) {
        let own = self.octree.leaf_corner(pos);
        let mut seen: Vec<IVec3> = Vec::with_capacity(8);
        seen.push(own);
        for dz in -1..=1 {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let n = pos + IVec3::new(dx, dy, dz);
                    if !self.store.region().contains(n) {
                        continue;
                    }
                    let corner = self.octree.leaf_corner(n);
                    if seen.contains(&corner) {
                        continue;
                    }
                    seen.push(corner);
                    self.octree.touch(n, now);
                }
            }
        }
    }

    /// Solid voxel with at least one empty face neighbour
    pub fn is_surface_voxel(&self, pos: IVec3) -> Result<bool> {
        if self.store.get(pos)?.is_empty() {
            return Ok(false);
        }
        const FACES: [IVec3; 6] = [IVec3::X, IVec3::NEG_X, IVec3::Y, IVec3::NEG_Y, IVec3::Z, IVec3::NEG_Z];
        Ok(FACES.iter().any(|step| self.store.get_or_empty(pos + *step).is_empty()))
    }

    /// Advance the clock and run one sync tick
    pub fn update(&mut self, observer: &mut dyn SyncObserver<V>) -> SyncReport {
        let now = self.clock.advance();
        let mut report = self.scheduler.sync(&mut self.octree, &self.store, &self.config, now, observer);
        report.properties_changed = self.scheduler.sync_properties(&self.octree, &self.config, now, observer);
        report
    }

    pub fn root_node(&self) -> Option<NodeHandle> {
        self.octree.root()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<&OctreeNode> {
        self.octree.node(handle)
    }

    /// Mesh currently published for a node
    pub fn node_mesh(&self, handle: NodeHandle) -> Option<Arc<NodeMesh<V>>> {
        self.scheduler.mesh(handle)
    }

    pub fn node_state(&self, handle: NodeHandle) -> NodeSyncState {
        self.scheduler.node_state(&self.octree, handle)
    }

    pub fn set_renderer_config(&mut self, renderer: RendererConfig) {
        self.config.renderer = RendererConfig { modified: self.clock.advance(), ..renderer };
    }

    pub fn set_collider_config(&mut self, collider: ColliderConfig) {
        self.config.collider = ColliderConfig { modified: self.clock.advance(), ..collider };
    }

    pub fn set_max_node_syncs_per_tick(&mut self, budget: usize) -> Result<()> {
        if budget == 0 {
            return Err(Error::InvalidConfig("max_node_syncs_per_tick must be at least 1".to_string()));
        }
        self.config.max_node_syncs_per_tick = budget;
        Ok(())
    }

    /// Write metadata and every page changed since the last flush
    pub fn flush(&mut self) -> Result<()> {
        let Some(dataset) = &self.dataset else {
            return Err(Error::InvalidConfig("volume has no dataset to flush to".to_string()));
        };
        let metadata = VolumeMetadata::new(V::KIND, *self.store.region(), self.config.base_node_size);
        dataset.write_metadata(&metadata)?;

        let mut written = 0;
        for coord in self.store.dirty_pages() {
            if let Some(page) = self.store.page(coord) {
                dataset.write_page(coord, page)?;
                written += 1;
            }
        }
        let removed: Vec<IVec3> = self.store.removed_pages().collect();
        for coord in &removed {
            dataset.remove_page(*coord)?;
        }
        dataset.sync_pages_dir()?;
        self.store.clear_dirty();

        log::info!(
            "Flushed {} pages ({} removed) to {}",
            written,
            removed.len(),
            dataset.root().display()
        );
        Ok(())
    }

    /// Write the whole volume to a new dataset and keep it as the flush target
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        let metadata = VolumeMetadata::new(V::KIND, *self.store.region(), self.config.base_node_size);
        let dataset = Dataset::create(path, &metadata)?;
        for (coord, page) in self.store.pages() {
            dataset.write_page(coord, page)?;
        }
        dataset.sync_pages_dir()?;
        log::info!("Saved {} pages to {}", self.store.page_count(), path.display());
        self.store.clear_dirty();
        self.dataset = Some(dataset);
        Ok(())
    }

    /// Tear the volume down, optionally flushing first.
    ///
    /// Without `persist`, writes since the last flush are discarded.
    pub fn shutdown(mut self, persist: bool) -> Result<()> {
        if persist {
            self.flush()?;
        }
        log::info!("Shut down {:?} volume (persist: {})", V::KIND, persist);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{NullObserver, SyncEvent};
    use crate::voxel::voxel::Voxel;
    use tempfile::TempDir;

    fn config() -> VolumeConfig {
        VolumeConfig { base_node_size: 8, ..Default::default() }
    }

    fn colored(size: u32) -> ColoredCubesVolume {
        Volume::new(Region::with_size(size, size, size).unwrap(), config()).unwrap()
    }

    #[test]
    fn test_out_of_range() {
        let mut volume = colored(16);
        let err = volume.set_voxel(IVec3::new(16, 0, 0), Color::opaque(1, 1, 1)).unwrap_err();
        assert!(matches!(err, Error::OutOfRange { x: 16, y: 0, z: 0 }));
        assert!(volume.get_voxel(IVec3::new(-1, 0, 0)).is_err());
        assert_eq!(volume.get_voxel_or_empty(IVec3::new(-1, 0, 0)), Color::EMPTY);
    }

    #[test]
    fn test_alpha_is_thresholded() {
        let mut volume = colored(16);
        volume.set_voxel(IVec3::new(1, 1, 1), Color::new(10, 20, 30, 200)).unwrap();
        volume.set_voxel(IVec3::new(2, 1, 1), Color::new(10, 20, 30, 60)).unwrap();
        assert_eq!(volume.get_voxel(IVec3::new(1, 1, 1)).unwrap().a, 255);
        assert_eq!(volume.get_voxel(IVec3::new(2, 1, 1)).unwrap().a, 0);
    }

    #[test]
    fn test_write_advances_clock() {
        let mut volume = colored(16);
        let before = volume.current_time();
        volume.set_voxel(IVec3::new(1, 1, 1), Color::opaque(1, 1, 1)).unwrap();
        assert!(volume.current_time() > before);
        let root = volume.root_node().unwrap();
        assert_eq!(volume.node(root).unwrap().last_changed(), volume.current_time());
    }

    #[test]
    fn test_zero_budget_rejected() {
        let region = Region::with_size(16, 16, 16).unwrap();
        let zero = VolumeConfig { max_node_syncs_per_tick: 0, ..config() };
        assert!(matches!(ColoredCubesVolume::new(region, zero), Err(Error::InvalidConfig(_))));

        let mut volume = colored(16);
        assert!(volume.set_max_node_syncs_per_tick(0).is_err());
        assert_eq!(volume.config().max_node_syncs_per_tick, 4);
        volume.set_max_node_syncs_per_tick(1).unwrap();
        volume.set_voxel(IVec3::new(5, 5, 5), Color::opaque(1, 1, 1)).unwrap();
        assert_eq!(volume.update(&mut NullObserver).meshes_extracted, 1);
    }

    #[test]
    fn test_neighbour_leaf_invalidated() {
        let mut volume = colored(16);
        volume.set_voxel(IVec3::new(8, 2, 2), Color::opaque(1, 1, 1)).unwrap();
        volume.update(&mut NullObserver);
        let right = volume.octree().deepest_node(IVec3::new(8, 2, 2)).unwrap();
        assert_eq!(volume.node_state(right), NodeSyncState::Clean);

        // the cube at x=7 hides the -x face of the cube at x=8
        volume.set_voxel(IVec3::new(7, 2, 2), Color::opaque(1, 1, 1)).unwrap();
        assert_eq!(volume.node_state(right), NodeSyncState::MeshDirty);
        volume.update(&mut NullObserver);
        assert_eq!(volume.node_mesh(right).unwrap().render.vertices.len(), 20);
    }

    #[test]
    fn test_is_surface_voxel() {
        let mut volume = colored(16);
        for pos in Region::from_bounds(2, 2, 2, 4, 4, 4).unwrap().positions() {
            volume.set_voxel(pos, Color::opaque(1, 1, 1)).unwrap();
        }
        assert!(!volume.is_surface_voxel(IVec3::new(3, 3, 3)).unwrap());
        assert!(volume.is_surface_voxel(IVec3::new(2, 3, 3)).unwrap());
        assert!(!volume.is_surface_voxel(IVec3::new(9, 9, 9)).unwrap());
    }

    #[test]
    fn test_property_change_reaches_nodes() {
        let mut volume = colored(16);
        volume.set_voxel(IVec3::new(1, 1, 1), Color::opaque(1, 1, 1)).unwrap();
        let mut events: Vec<SyncEvent<Color>> = Vec::new();
        let report = volume.update(&mut events);
        assert_eq!(report.properties_changed, 2);

        volume.set_renderer_config(RendererConfig { enabled: false, ..Default::default() });
        let mut events: Vec<SyncEvent<Color>> = Vec::new();
        volume.update(&mut events);
        assert!(events.iter().all(|e| matches!(e, SyncEvent::PropertiesChanged { visible: false, .. })));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_flush_without_dataset() {
        let mut volume = colored(16);
        assert!(matches!(volume.flush(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("terrain");
        let region = Region::with_size(20, 12, 20).unwrap();
        {
            let mut volume = TerrainVolume::create_at(&path, region, config()).unwrap();
            volume.set_voxel(IVec3::new(3, 4, 5), MaterialSet::solid(1)).unwrap();
            volume.set_voxel(IVec3::new(19, 11, 19), MaterialSet::new([100, 100, 0, 0])).unwrap();
            volume.set_voxel(IVec3::new(10, 0, 0), MaterialSet::solid(0)).unwrap();
            volume.set_voxel(IVec3::new(10, 0, 0), MaterialSet::EMPTY).unwrap();
            volume.shutdown(true).unwrap();
        }

        let volume = TerrainVolume::open(&path, VolumeConfig::default()).unwrap();
        assert_eq!(*volume.enclosing_region(), region);
        assert_eq!(volume.config().base_node_size, 8);
        assert_eq!(volume.get_voxel(IVec3::new(3, 4, 5)).unwrap(), MaterialSet::solid(1));
        assert_eq!(volume.get_voxel(IVec3::new(19, 11, 19)).unwrap(), MaterialSet::new([100, 100, 0, 0]));
        assert_eq!(volume.get_voxel(IVec3::new(10, 0, 0)).unwrap(), MaterialSet::EMPTY);
        assert_eq!(volume.store().page_count(), 2);
        assert_eq!(volume.octree().node(volume.root_node().unwrap()).unwrap().solid_count(), 2);
    }

    #[test]
    fn test_discard_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let region = Region::with_size(16, 16, 16).unwrap();
        let mut volume = ColoredCubesVolume::create_at(dir.path(), region, config()).unwrap();
        volume.set_voxel(IVec3::new(1, 1, 1), Color::opaque(1, 1, 1)).unwrap();
        volume.flush().unwrap();
        volume.set_voxel(IVec3::new(2, 2, 2), Color::opaque(1, 1, 1)).unwrap();
        volume.shutdown(false).unwrap();

        let volume = ColoredCubesVolume::open(dir.path(), config()).unwrap();
        assert!(volume.get_voxel(IVec3::new(1, 1, 1)).unwrap().is_solid());
        assert!(volume.get_voxel(IVec3::new(2, 2, 2)).unwrap().is_empty());
    }

    #[test]
    fn test_save_as() {
        let dir = TempDir::new().unwrap();
        let mut volume = colored(16);
        volume.set_voxel(IVec3::new(4, 4, 4), Color::opaque(9, 9, 9)).unwrap();
        volume.save_as(dir.path()).unwrap();
        assert_eq!(volume.dataset_path(), Some(dir.path()));
        assert!(!volume.store().has_dirty_pages());

        let reopened = ColoredCubesVolume::open(dir.path(), config()).unwrap();
        assert_eq!(reopened.get_voxel(IVec3::new(4, 4, 4)).unwrap(), Color::opaque(9, 9, 9));
    }

    #[test]
    fn test_open_wrong_kind() {
        let dir = TempDir::new().unwrap();
        let region = Region::with_size(8, 8, 8).unwrap();
        ColoredCubesVolume::create_at(dir.path(), region, config()).unwrap();
        assert!(matches!(TerrainVolume::open(dir.path(), config()), Err(Error::InvalidConfig(_))));
    }
}
