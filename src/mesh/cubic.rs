//! Colored cube mesher: one quad per exposed voxel face

use crate::core::types::{IVec3, Vec3};
use crate::math::Region;
use crate::voxel::color::{Color, QuantizedColor};
use crate::voxel::store::VoxelStore;
use crate::voxel::voxel::Voxel;

use super::data::{ColoredCubesVertex, MeshData};
use super::{ExtractLimits, MeshError};

/// Quad corners in the face plane, counter-clockwise seen from +axis
const FACE_CORNERS: [(f32, f32); 4] = [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)];

/// Mesh every solid voxel of `area`.
///
/// Voxel `v` fills the unit cube centred on `v`. A face is emitted when the
/// neighbour across it is empty or outside the store. Quads are not welded,
/// so each carries its own 4 vertices and flat color.
pub fn extract(
    store: &VoxelStore<Color>,
    area: &Region,
    limits: &ExtractLimits,
) -> Result<MeshData<ColoredCubesVertex>, MeshError> {
    let mut mesh = MeshData::new();
    let Some(area) = area.intersection(store.region()) else {
        return Ok(mesh);
    };

    for (pos, voxel) in store.solid_in(&area) {
        let color = voxel.quantized();

        for axis in 0..3 {
            for sign in [-1, 1] {
                let mut step = IVec3::ZERO;
                step[axis] = sign;
                if store.get_or_empty(pos + step).is_solid() {
                    continue;
                }
                if mesh.vertices.len() + 4 > limits.max_vertices {
                    return Err(MeshError::TooManyVertices {
                        count: mesh.vertices.len() + 4,
                        limit: limits.max_vertices,
                    });
                }
                push_face(&mut mesh, pos, axis, sign, color);
            }
        }
    }

    Ok(mesh)
}

fn push_face(mesh: &mut MeshData<ColoredCubesVertex>, pos: IVec3, axis: usize, sign: i32, color: QuantizedColor) {
    let u = (axis + 1) % 3;
    let v = (axis + 2) % 3;
    let mut center = pos.as_vec3();
    center[axis] += 0.5 * sign as f32;

    let base = mesh.vertices.len() as u32;
    let mut corners = FACE_CORNERS;
    if sign < 0 {
        corners.reverse();
    }
    for (du, dv) in corners {
        let mut p: Vec3 = center;
        p[u] += du;
        p[v] += dv;
        mesh.bounds.expand(p);
        mesh.vertices.push(ColoredCubesVertex::new(p, color));
    }
    mesh.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}
