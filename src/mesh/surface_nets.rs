//! Surface nets over material density
//!
//! Samples sit on integer coordinates. A cell `c` spans the samples
//! `c + {0,1}^3`; every cell whose corners straddle the iso level gets one
//! vertex at the average of its edge crossings. Each sign-changing sample edge
//! is then closed by a quad joining the four cells around it.

use std::collections::HashMap;

use crate::core::types::{IVec3, Vec3};
use crate::math::Region;
use crate::voxel::material::{MATERIALS_PER_VOXEL, MaterialSet};
use crate::voxel::store::VoxelStore;

use super::data::{MeshData, TerrainVertex};
use super::{ExtractLimits, MeshError};

/// Density level separating solid from empty
pub const ISO_LEVEL: f32 = 127.5;

/// Cell corner offsets, index bits are (x, y, z)
const CORNERS: [IVec3; 8] = [
    IVec3::new(0, 0, 0),
    IVec3::new(1, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(1, 1, 0),
    IVec3::new(0, 0, 1),
    IVec3::new(1, 0, 1),
    IVec3::new(0, 1, 1),
    IVec3::new(1, 1, 1),
];

/// The 12 cell edges as corner index pairs
const EDGES: [(usize, usize); 12] = [
    (0, 1), (2, 3), (4, 5), (6, 7),
    (0, 2), (1, 3), (4, 6), (5, 7),
    (0, 4), (1, 5), (2, 6), (3, 7),
];

const AXES: [IVec3; 3] = [IVec3::X, IVec3::Y, IVec3::Z];

struct Mesher<'a> {
    store: &'a VoxelStore<MaterialSet>,
    limits: &'a ExtractLimits,
    mesh: MeshData<TerrainVertex>,
    cell_vertices: HashMap<IVec3, u32>,
}

impl Mesher<'_> {
    fn sample(&self, pos: IVec3) -> MaterialSet {
        self.store.get_or_empty(pos)
    }

    fn density(&self, pos: IVec3) -> f32 {
        self.sample(pos).weight_sum() as f32
    }

    /// Vertex index for `cell`, building the vertex on first use
    fn cell_vertex(&mut self, cell: IVec3) -> Result<u32, MeshError> {
        if let Some(&index) = self.cell_vertices.get(&cell) {
            return Ok(index);
        }
        if self.mesh.vertices.len() >= self.limits.max_vertices {
            return Err(MeshError::TooManyVertices {
                count: self.mesh.vertices.len() + 1,
                limit: self.limits.max_vertices,
            });
        }

        let samples: [MaterialSet; 8] = CORNERS.map(|offset| self.sample(cell + offset));
        let densities: [f32; 8] = samples.map(|s| s.weight_sum() as f32);

        let mut sum = Vec3::ZERO;
        let mut crossings = 0;
        for (a, b) in EDGES {
            let (da, db) = (densities[a], densities[b]);
            if (da > ISO_LEVEL) == (db > ISO_LEVEL) {
                continue;
            }
            let t = (ISO_LEVEL - da) / (db - da);
            let pa = CORNERS[a].as_vec3();
            let pb = CORNERS[b].as_vec3();
            sum += pa + (pb - pa) * t;
            crossings += 1;
        }
        let local = if crossings > 0 { sum / crossings as f32 } else { Vec3::splat(0.5) };
        let position = cell.as_vec3() + local;

        // density grows towards the inside, so the outward normal is -gradient
        let mut gradient = Vec3::ZERO;
        for (i, offset) in CORNERS.iter().enumerate() {
            let sign = offset.as_vec3() * 2.0 - Vec3::ONE;
            gradient += sign * densities[i];
        }
        let normal = (-gradient).try_normalize().unwrap_or(Vec3::Y);

        let mut totals = [0u32; MATERIALS_PER_VOXEL];
        let mut solid = 0u32;
        for s in samples.iter().filter(|s| s.weight_sum() > ISO_LEVEL as u32) {
            for (total, w) in totals.iter_mut().zip(s.weights) {
                *total += w as u32;
            }
            solid += 1;
        }
        let materials = totals.map(|t| if solid > 0 { ((t + solid / 2) / solid) as u8 } else { 0 });

        let index = self.mesh.vertices.len() as u32;
        self.mesh.bounds.expand(position);
        self.mesh.vertices.push(TerrainVertex {
            position: position.to_array(),
            normal: normal.to_array(),
            materials,
        });
        self.cell_vertices.insert(cell, index);
        Ok(index)
    }
}

/// Mesh the density surface owned by `area`.
///
/// An edge belongs to the node containing its solid endpoint, so adjacent
/// nodes never emit the same quad twice.
pub fn extract(
    store: &VoxelStore<MaterialSet>,
    area: &Region,
    limits: &ExtractLimits,
) -> Result<MeshData<TerrainVertex>, MeshError> {
    let Some(area) = area.intersection(store.region()) else {
        return Ok(MeshData::new());
    };

    // every sample a vertex of this area can read; malformed sets are always solid
    let sampled = Region::new_unchecked(area.lower() - IVec3::ONE, area.upper() + IVec3::ONE);
    if let Some((pos, _)) = store.solid_in(&sampled).find(|(_, sample)| !sample.is_valid()) {
        return Err(MeshError::malformed(pos));
    }

    let mut mesher = Mesher {
        store,
        limits,
        mesh: MeshData::new(),
        cell_vertices: HashMap::new(),
    };

    // each sign-changing edge is found from its solid endpoint, the one this area owns
    for (solid, _) in store.solid_in(&area) {
        for (axis, step) in AXES.iter().enumerate() {
            for other in [solid - *step, solid + *step] {
                if mesher.density(other) > ISO_LEVEL {
                    continue;
                }
                let p = solid.min(other);
                let p_solid = p == solid;

                let du = AXES[(axis + 1) % 3];
                let dv = AXES[(axis + 2) % 3];
                let quad = [
                    mesher.cell_vertex(p - du - dv)?,
                    mesher.cell_vertex(p - dv)?,
                    mesher.cell_vertex(p)?,
                    mesher.cell_vertex(p - du)?,
                ];
                // quad faces +axis as built; flip when the surface faces -axis
                let [a, b, c, d] = if p_solid { quad } else { [quad[0], quad[3], quad[2], quad[1]] };
                mesher.mesh.indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }
    }

    Ok(mesher.mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> VoxelStore<MaterialSet> {
        VoxelStore::new(Region::with_size(16, 16, 16).unwrap())
    }

    fn full_area() -> Region {
        Region::with_size(16, 16, 16).unwrap()
    }

    #[test]
    fn test_single_sample() {
        let mut store = store();
        let center = IVec3::new(6, 6, 6);
        store.set(center, MaterialSet::solid(2)).unwrap();
        let mesh = extract(&store, &full_area(), &ExtractLimits::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.indices.len(), 36);
        for vertex in &mesh.vertices {
            assert_eq!(vertex.materials, [0, 0, 255, 0]);
            let offset = Vec3::from_array(vertex.position) - center.as_vec3();
            // normal points away from the solid sample
            assert!(Vec3::from_array(vertex.normal).dot(offset) > 0.0);
        }
        assert!(mesh.bounds.contains_point(center.as_vec3()));
    }

    #[test]
    fn test_winding_faces_outward() {
        let mut store = store();
        for pos in Region::from_bounds(4, 4, 4, 7, 7, 7).unwrap().positions() {
            store.set(pos, MaterialSet::solid(0)).unwrap();
        }
        let mesh = extract(&store, &full_area(), &ExtractLimits::default()).unwrap();
        let center = Vec3::splat(5.5);
        assert!(!mesh.is_empty());
        for tri in mesh.indices.chunks(3) {
            let p = |i: usize| Vec3::from_array(mesh.vertices[tri[i] as usize].position);
            let normal = (p(1) - p(0)).cross(p(2) - p(0));
            let centroid = (p(0) + p(1) + p(2)) / 3.0;
            assert!(normal.dot(centroid - center) > 0.0);
        }
    }

    #[test]
    fn test_below_threshold_is_empty() {
        let mut store = store();
        store.set(IVec3::new(3, 3, 3), MaterialSet::new([100, 27, 0, 0])).unwrap();
        let mesh = extract(&store, &full_area(), &ExtractLimits::default()).unwrap();
        assert!(mesh.is_empty());
    }

    #[test]
    fn test_malformed_weights() {
        let mut store = store();
        store.set(IVec3::new(3, 3, 3), MaterialSet::new([200, 200, 0, 0])).unwrap();
        let err = extract(&store, &full_area(), &ExtractLimits::default()).unwrap_err();
        assert_eq!(err, MeshError::MalformedVoxel { x: 3, y: 3, z: 3 });
    }

    #[test]
    fn test_adjacent_areas_split_quads() {
        let mut store = store();
        store.set(IVec3::new(7, 3, 3), MaterialSet::solid(1)).unwrap();
        store.set(IVec3::new(8, 3, 3), MaterialSet::solid(1)).unwrap();
        let left = Region::from_bounds(0, 0, 0, 7, 15, 15).unwrap();
        let right = Region::from_bounds(8, 0, 0, 15, 15, 15).unwrap();
        let whole = extract(&store, &full_area(), &ExtractLimits::default()).unwrap();
        let a = extract(&store, &left, &ExtractLimits::default()).unwrap();
        let b = extract(&store, &right, &ExtractLimits::default()).unwrap();
        assert_eq!(a.indices.len() + b.indices.len(), whole.indices.len());
        assert_eq!(a.indices.len(), 5 * 6);
    }

    #[test]
    fn test_sparse_large_area() {
        let region = Region::with_size(2048, 2048, 2048).unwrap();
        let mut store = VoxelStore::new(region);
        store.set(IVec3::new(1000, 3, 1000), MaterialSet::solid(0)).unwrap();
        store.set(IVec3::new(5, 2040, 5), MaterialSet::solid(1)).unwrap();
        let mesh = extract(&store, &region, &ExtractLimits::default()).unwrap();
        assert_eq!(mesh.vertices.len(), 16);
        assert_eq!(mesh.indices.len(), 72);
    }
}
