//! Voxel data structures and operations

pub mod voxel;
pub mod color;
pub mod material;
pub mod page;
pub mod store;
pub mod octree;

pub use voxel::{Voxel, VolumeKind};
pub use color::{Color, QuantizedColor};
pub use material::{MaterialSet, MATERIALS_PER_VOXEL};
pub use page::{Page, PAGE_SIZE};
pub use store::VoxelStore;
pub use octree::{NodeHandle, Octree, OctreeNode};
