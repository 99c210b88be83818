//! cubevol - Octree-indexed sparse voxel volumes with incremental mesh synchronization

pub mod core;
pub mod math;
pub mod voxel;
pub mod mesh;
pub mod sync;
pub mod volume;
pub mod storage;
pub mod import;
pub mod terrain;

pub use crate::core::error::Error;
pub use crate::core::time::{Clock, Timestamp};
pub use crate::core::types::{IVec3, Result, Vec3};
pub use math::{Aabb, Region};
pub use mesh::{NodeMesh, VoxelKind};
pub use sync::{NodeSyncState, SyncEvent, SyncObserver, SyncReport};
pub use volume::{ColoredCubesVolume, TerrainVolume, Volume, VolumeConfig, VolumeHandle, VolumeRegistry};
pub use voxel::{Color, MaterialSet, NodeHandle, Voxel};
