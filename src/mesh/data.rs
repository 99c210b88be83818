//! Mesh buffers produced per octree node

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;
use crate::math::Aabb;
use crate::voxel::color::QuantizedColor;

use super::VoxelKind;

/// Vertex of a colored-cubes mesh (16 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ColoredCubesVertex {
    /// Volume-space position
    pub position: [f32; 3],
    /// RGBA4444 face color
    pub color: QuantizedColor,
    pub _padding: u16,
}

impl ColoredCubesVertex {
    pub fn new(position: Vec3, color: QuantizedColor) -> Self {
        Self {
            position: position.to_array(),
            color,
            _padding: 0,
        }
    }
}

/// Vertex of a smooth terrain mesh (28 bytes)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TerrainVertex {
    /// Volume-space position
    pub position: [f32; 3],
    /// Unit outward normal
    pub normal: [f32; 3],
    /// Blended material weights
    pub materials: [u8; 4],
}

/// Indexed triangle list with a bounding box covering every vertex
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData<T> {
    pub vertices: Vec<T>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl<T> MeshData<T> {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            bounds: Aabb::EMPTY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

impl<T> Default for MeshData<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Position-only copy of a render mesh for physics consumers
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CollisionMesh {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
    pub bounds: Aabb,
}

impl CollisionMesh {
    pub fn from_render<V: VoxelKind>(render: &MeshData<V::Vertex>) -> Self {
        let positions: Vec<[f32; 3]> = render
            .vertices
            .iter()
            .map(|v| V::vertex_position(v).to_array())
            .collect();
        let bounds = Aabb::from_points(positions.iter().map(|p| Vec3::from_array(*p))).unwrap_or_default();
        Self {
            positions,
            indices: render.indices.clone(),
            bounds,
        }
    }
}

/// Everything published for one node in a single atomic swap
#[derive(Clone, Debug, PartialEq)]
pub struct NodeMesh<V: VoxelKind> {
    pub render: MeshData<V::Vertex>,
    pub collision: Option<CollisionMesh>,
}
