//! Dataset round trips

use std::collections::BTreeSet;

use cubevol::sync::NullObserver;
use cubevol::{Color, ColoredCubesVolume, IVec3, MaterialSet, Region, TerrainVolume, VolumeConfig, VolumeRegistry};
use tempfile::TempDir;

fn config() -> VolumeConfig {
    VolumeConfig { base_node_size: 8, ..Default::default() }
}

fn node_set(volume: &ColoredCubesVolume) -> BTreeSet<([i32; 3], u8, u32)> {
    volume
        .octree()
        .iter()
        .map(|(_, node)| (node.lower_corner().to_array(), node.level(), node.solid_count()))
        .collect()
}

#[test]
fn test_reopened_volume_matches() {
    let dir = TempDir::new().unwrap();
    let region = Region::from_bounds(-12, -4, -12, 11, 19, 11).unwrap();
    let writes: Vec<(IVec3, Color)> = (0..40)
        .map(|i| {
            let pos = IVec3::new(i % 24 - 12, (i * 7) % 24 - 4, (i * 13) % 24 - 12);
            (pos, Color::opaque(i as u8 * 6, 255 - i as u8, 17))
        })
        .collect();

    let mut volume = ColoredCubesVolume::create_at(dir.path(), region, config()).unwrap();
    for (pos, color) in &writes {
        volume.set_voxel(*pos, *color).unwrap();
    }
    volume.update(&mut NullObserver);
    let nodes_before = node_set(&volume);
    assert!(nodes_before.len() > 1);
    volume.shutdown(true).unwrap();

    let mut reopened = ColoredCubesVolume::open(dir.path(), config()).unwrap();
    assert_eq!(*reopened.enclosing_region(), region);
    for pos in region.positions() {
        let expected = writes.iter().rev().find(|(p, _)| *p == pos).map(|(_, c)| *c).unwrap_or(Color::EMPTY);
        assert_eq!(reopened.get_voxel(pos).unwrap(), expected, "at {:?}", pos);
    }

    // same node set, only the timestamps differ
    assert_eq!(node_set(&reopened), nodes_before);
    while reopened.update(&mut NullObserver).had_changes() {}
}

#[test]
fn test_incremental_flush_removes_pages() {
    let dir = TempDir::new().unwrap();
    let region = Region::with_size(32, 32, 32).unwrap();
    let mut volume = TerrainVolume::create_at(dir.path(), region, config()).unwrap();
    volume.set_voxel(IVec3::new(1, 1, 1), MaterialSet::solid(0)).unwrap();
    volume.set_voxel(IVec3::new(20, 20, 20), MaterialSet::solid(2)).unwrap();
    volume.flush().unwrap();

    volume.set_voxel(IVec3::new(20, 20, 20), MaterialSet::EMPTY).unwrap();
    volume.flush().unwrap();
    drop(volume);

    let reopened = TerrainVolume::open(dir.path(), config()).unwrap();
    assert_eq!(reopened.store().page_count(), 1);
    assert_eq!(reopened.get_voxel(IVec3::new(1, 1, 1)).unwrap(), MaterialSet::solid(0));
    assert_eq!(reopened.get_voxel(IVec3::new(20, 20, 20)).unwrap(), MaterialSet::EMPTY);
}

#[test]
fn test_registry_destroy_with_and_without_persist() {
    let dir = TempDir::new().unwrap();
    let region = Region::with_size(16, 16, 16).unwrap();
    let mut registry: VolumeRegistry<Color> = VolumeRegistry::new();

    let handle = registry.create_at(dir.path(), region, config()).unwrap();
    registry.set_voxel(handle, 1, 2, 3, Color::opaque(5, 5, 5)).unwrap();
    registry.destroy(handle, true).unwrap();

    let handle = registry.open(dir.path(), config()).unwrap();
    registry.set_voxel(handle, 4, 4, 4, Color::opaque(6, 6, 6)).unwrap();
    registry.destroy(handle, false).unwrap();

    let handle = registry.open(dir.path(), config()).unwrap();
    assert_eq!(registry.get_voxel(handle, 1, 2, 3).unwrap(), Color::opaque(5, 5, 5));
    assert_eq!(registry.get_voxel(handle, 4, 4, 4).unwrap(), Color::EMPTY);
}
