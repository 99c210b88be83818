//! Voxel trait shared by every volume kind

use std::fmt::Debug;

use bytemuck::Pod;
use serde::{Deserialize, Serialize};

/// Which voxel representation a volume stores. Exactly one per volume instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeKind {
    /// Quantized RGBA cubes
    ColoredCubes,
    /// Density + material samples for smooth terrain
    SmoothTerrain,
}

/// A single voxel sample.
///
/// Implementors are plain 4-byte `Pod` values so pages can be written to disk
/// as raw bytes. `Default` must be the empty voxel.
pub trait Voxel: Pod + Default + PartialEq + Debug + Send + Sync + 'static {
    /// Representation tag recorded in dataset metadata
    const KIND: VolumeKind;

    /// Empty voxels contribute nothing to the octree or to meshes
    fn is_empty(&self) -> bool;

    fn is_solid(&self) -> bool {
        !self.is_empty()
    }

    /// Canonical form of a value written through the volume API
    fn normalized(self) -> Self {
        self
    }
}
