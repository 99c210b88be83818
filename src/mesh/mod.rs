//! Mesh extraction for octree nodes
//!
//! Each voxel kind brings its own extractor: colored cubes emit one quad per
//! exposed face, smooth terrain runs surface nets over the density field.
//! Extractors only read the store, so nodes can be meshed in parallel.

pub mod data;
pub mod cubic;
pub mod surface_nets;

use std::fmt::Debug;

use bytemuck::Pod;
use thiserror::Error;

use crate::core::types::{IVec3, Vec3};
use crate::math::Region;
use crate::voxel::color::Color;
use crate::voxel::material::MaterialSet;
use crate::voxel::store::VoxelStore;
use crate::voxel::voxel::Voxel;

pub use data::{CollisionMesh, ColoredCubesVertex, MeshData, NodeMesh, TerrainVertex};

/// Why a node could not be meshed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("malformed voxel at ({x}, {y}, {z})")]
    MalformedVoxel { x: i32, y: i32, z: i32 },

    #[error("mesh needs {count} vertices, limit is {limit}")]
    TooManyVertices { count: usize, limit: usize },
}

impl MeshError {
    pub(crate) fn malformed(pos: IVec3) -> Self {
        MeshError::MalformedVoxel { x: pos.x, y: pos.y, z: pos.z }
    }
}

/// Bounds applied to a single extraction
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_vertices: usize,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self { max_vertices: u32::MAX as usize }
    }
}

/// Voxel kinds that know how to mesh themselves
pub trait VoxelKind: Voxel {
    type Vertex: Pod + Debug + PartialEq + Send + Sync;

    /// Mesh the voxels of `area`. Samples outside the store read as empty.
    fn extract(
        store: &VoxelStore<Self>,
        area: &Region,
        limits: &ExtractLimits,
    ) -> Result<MeshData<Self::Vertex>, MeshError>;

    fn vertex_position(vertex: &Self::Vertex) -> Vec3;
}

impl VoxelKind for Color {
    type Vertex = ColoredCubesVertex;

    fn extract(
        store: &VoxelStore<Self>,
        area: &Region,
        limits: &ExtractLimits,
    ) -> Result<MeshData<Self::Vertex>, MeshError> {
        cubic::extract(store, area, limits)
    }

    fn vertex_position(vertex: &Self::Vertex) -> Vec3 {
        Vec3::from_array(vertex.position)
    }
}

impl VoxelKind for MaterialSet {
    type Vertex = TerrainVertex;

    fn extract(
        store: &VoxelStore<Self>,
        area: &Region,
        limits: &ExtractLimits,
    ) -> Result<MeshData<Self::Vertex>, MeshError> {
        surface_nets::extract(store, area, limits)
    }

    fn vertex_position(vertex: &Self::Vertex) -> Vec3 {
        Vec3::from_array(vertex.position)
    }
}

/// Mesh one node region. `Ok(None)` when nothing is visible.
pub fn extract_node_mesh<V: VoxelKind>(
    store: &VoxelStore<V>,
    area: &Region,
    limits: &ExtractLimits,
    with_collision: bool,
) -> Result<Option<NodeMesh<V>>, MeshError> {
    let render = V::extract(store, area, limits)?;
    if render.is_empty() {
        return Ok(None);
    }
    let collision = with_collision.then(|| CollisionMesh::from_render::<V>(&render));
    Ok(Some(NodeMesh { render, collision }))
}
