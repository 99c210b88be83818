//! Sparse octree index over voxel content

pub mod node;
pub mod tree;

pub use node::{NodeHandle, OctreeNode, octant_index, octant_offset};
pub use tree::{MarkOutcome, Octree};
