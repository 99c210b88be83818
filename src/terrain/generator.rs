//! Noise-based procedural terrain for volumes

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rayon::prelude::*;

use crate::core::types::{IVec3, Result};
use crate::volume::{ColoredCubesVolume, TerrainVolume};
use crate::voxel::color::Color;
use crate::voxel::material::MaterialSet;

/// Parameters controlling terrain generation
#[derive(Clone, Debug)]
pub struct TerrainParams {
    pub seed: u32,
    pub scale: f32,        // Horizontal scale (larger = smoother)
    pub height_scale: f32, // Vertical scale (max height)
    pub octaves: u32,      // FBM octaves (detail levels)
    pub persistence: f32,  // FBM persistence (0.5 typical)
    pub lacunarity: f32,   // FBM lacunarity (2.0 typical)
    pub sea_level: f32,    // Height below which columns are sand
}

impl Default for TerrainParams {
    fn default() -> Self {
        Self {
            seed: 12345,
            scale: 64.0,
            height_scale: 32.0,
            octaves: 4,
            persistence: 0.5,
            lacunarity: 2.0,
            sea_level: 8.0,
        }
    }
}

/// Material slots used for smooth terrain
pub mod materials {
    pub const GRASS: usize = 0;
    pub const DIRT: usize = 1;
    pub const ROCK: usize = 2;
    pub const SAND: usize = 3;
}

/// Procedural terrain generator using fractal Brownian motion (FBM)
pub struct TerrainGenerator {
    params: TerrainParams,
    noise: Fbm<Perlin>,
}

impl TerrainGenerator {
    pub fn new(params: TerrainParams) -> Self {
        let noise = Fbm::<Perlin>::new(params.seed)
            .set_octaves(params.octaves as usize)
            .set_persistence(params.persistence as f64)
            .set_lacunarity(params.lacunarity as f64);

        Self { params, noise }
    }

    pub fn params(&self) -> &TerrainParams {
        &self.params
    }

    /// Terrain height in voxels at column (x, z), in `0..=height_scale`
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        let nx = (x / self.params.scale) as f64;
        let nz = (z / self.params.scale) as f64;
        let normalized = (self.noise.get([nx, nz]) + 1.0) / 2.0;
        (normalized.clamp(0.0, 1.0) * self.params.height_scale as f64) as f32
    }

    /// Heights for every (x, z) column of a box, row-major in z
    fn column_heights(&self, lower: IVec3, upper: IVec3) -> Vec<(i32, i32, f32)> {
        (lower.z..=upper.z)
            .into_par_iter()
            .flat_map_iter(|z| (lower.x..=upper.x).map(move |x| (x, z)))
            .map(|(x, z)| (x, z, self.height_at(x as f32, z as f32)))
            .collect()
    }

    fn surface_color(&self, y: i32, height: f32) -> Color {
        let depth = height - y as f32;
        if height < self.params.sea_level {
            Color::opaque(219, 201, 140)
        } else if depth < 1.0 {
            Color::opaque(86, 152, 52)
        } else if depth < 4.0 {
            Color::opaque(121, 85, 58)
        } else {
            Color::opaque(128, 128, 128)
        }
    }

    /// Fill a colored-cubes volume with terrain columns. Returns voxels written.
    pub fn fill_colored(&self, volume: &mut ColoredCubesVolume) -> Result<usize> {
        let region = *volume.enclosing_region();
        let columns = self.column_heights(region.lower(), region.upper());

        let mut written = 0;
        for (x, z, height) in columns {
            let top = (region.lower().y + height.round() as i32).min(region.upper().y + 1);
            for y in region.lower().y..top {
                volume.set_voxel(IVec3::new(x, y, z), self.surface_color(y - region.lower().y, height))?;
                written += 1;
            }
        }
        log::info!("Generated {} colored voxels", written);
        Ok(written)
    }

    /// Density sample for smooth terrain; partial weights near the surface keep it smooth
    fn material_at(&self, y: f32, height: f32) -> MaterialSet {
        let density = ((height - y + 0.5).clamp(0.0, 1.0) * 255.0) as u8;
        let depth = height - y;
        let material = if height < self.params.sea_level {
            materials::SAND
        } else if depth < 1.0 {
            materials::GRASS
        } else if depth < 4.0 {
            materials::DIRT
        } else {
            materials::ROCK
        };
        let mut weights = [0; 4];
        weights[material] = density;
        MaterialSet::new(weights)
    }

    /// Fill a smooth terrain volume. Returns voxels written.
    pub fn fill_terrain(&self, volume: &mut TerrainVolume) -> Result<usize> {
        let region = *volume.enclosing_region();
        let columns = self.column_heights(region.lower(), region.upper());

        let mut written = 0;
        for (x, z, height) in columns {
            let top = (region.lower().y + height.ceil() as i32).min(region.upper().y);
            for y in region.lower().y..=top {
                let sample = self.material_at((y - region.lower().y) as f32, height);
                if sample == MaterialSet::EMPTY {
                    continue;
                }
                volume.set_voxel(IVec3::new(x, y, z), sample)?;
                written += 1;
            }
        }
        log::info!("Generated {} terrain samples", written);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Region;
    use crate::volume::VolumeConfig;
    use crate::voxel::voxel::Voxel;

    fn params() -> TerrainParams {
        TerrainParams { height_scale: 12.0, sea_level: 0.0, ..Default::default() }
    }

    #[test]
    fn test_height_range() {
        let generator = TerrainGenerator::new(params());
        for i in 0..50 {
            let h = generator.height_at(i as f32 * 3.7, i as f32 * 1.3);
            assert!((0.0..=12.0).contains(&h));
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let a = TerrainGenerator::new(params());
        let b = TerrainGenerator::new(params());
        assert_eq!(a.height_at(10.0, 20.0), b.height_at(10.0, 20.0));
    }

    #[test]
    fn test_fill_colored_follows_height() {
        let generator = TerrainGenerator::new(params());
        let region = Region::with_size(16, 16, 16).unwrap();
        let config = VolumeConfig { base_node_size: 8, ..Default::default() };
        let mut volume = ColoredCubesVolume::new(region, config).unwrap();
        let written = generator.fill_colored(&mut volume).unwrap();
        assert!(written > 0);

        let height = generator.height_at(5.0, 7.0).round() as i32;
        if height > 0 {
            assert!(volume.get_voxel(IVec3::new(5, height - 1, 7)).unwrap().is_solid());
        }
        assert!(volume.get_voxel(IVec3::new(5, height, 7)).unwrap().is_empty());
    }

    #[test]
    fn test_fill_terrain_is_valid() {
        let generator = TerrainGenerator::new(params());
        let region = Region::with_size(8, 16, 8).unwrap();
        let config = VolumeConfig { base_node_size: 8, ..Default::default() };
        let mut volume = TerrainVolume::new(region, config).unwrap();
        generator.fill_terrain(&mut volume).unwrap();
        for pos in region.positions() {
            assert!(volume.get_voxel(pos).unwrap().is_valid());
        }
        assert!(volume.root_node().is_some());
    }

    #[test]
    fn test_material_bands() {
        let generator = TerrainGenerator::new(TerrainParams { sea_level: 5.0, ..params() });
        assert_eq!(generator.material_at(0.0, 3.0).dominant_material(), materials::SAND);
        assert_eq!(generator.material_at(9.5, 10.0).dominant_material(), materials::GRASS);
        assert_eq!(generator.material_at(0.0, 10.0).dominant_material(), materials::ROCK);
        assert!(generator.material_at(12.0, 10.0).is_empty());
    }
}
