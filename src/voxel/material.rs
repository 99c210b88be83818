//! Density/material voxels for smooth terrain

use bytemuck::{Pod, Zeroable};

use super::voxel::{Voxel, VolumeKind};

/// Number of materials blended per voxel
pub const MATERIALS_PER_VOXEL: usize = 4;

/// Density above which a sample is inside the surface
pub const DENSITY_THRESHOLD: u32 = 127;

/// Per-voxel weights for up to four materials.
///
/// Density is the sum of the weights. A set whose weights sum above 255 is
/// malformed; it is stored as written and rejected at mesh extraction.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct MaterialSet {
    pub weights: [u8; MATERIALS_PER_VOXEL],
}

impl MaterialSet {
    /// Empty/air voxel
    pub const EMPTY: MaterialSet = MaterialSet { weights: [0; MATERIALS_PER_VOXEL] };

    pub const fn new(weights: [u8; MATERIALS_PER_VOXEL]) -> Self {
        Self { weights }
    }

    /// Fully solid voxel of a single material
    pub fn solid(material: usize) -> Self {
        let mut weights = [0; MATERIALS_PER_VOXEL];
        weights[material % MATERIALS_PER_VOXEL] = 255;
        Self { weights }
    }

    /// Raw weight sum, may exceed 255 for malformed sets
    pub fn weight_sum(&self) -> u32 {
        self.weights.iter().map(|&w| w as u32).sum()
    }

    /// Density clamped to the 0-255 range
    pub fn density(&self) -> u8 {
        self.weight_sum().min(255) as u8
    }

    pub fn is_valid(&self) -> bool {
        self.weight_sum() <= 255
    }

    /// Index of the heaviest material
    pub fn dominant_material(&self) -> usize {
        self.weights
            .iter()
            .enumerate()
            .max_by_key(|(i, w)| (**w, std::cmp::Reverse(*i)))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }
}

impl Voxel for MaterialSet {
    const KIND: VolumeKind = VolumeKind::SmoothTerrain;

    fn is_empty(&self) -> bool {
        self.weight_sum() <= DENSITY_THRESHOLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<MaterialSet>(), 4);
    }

    #[test]
    fn test_density_threshold() {
        assert!(MaterialSet::EMPTY.is_empty());
        assert!(MaterialSet::new([100, 27, 0, 0]).is_empty());
        assert!(MaterialSet::new([100, 28, 0, 0]).is_solid());
        assert!(MaterialSet::solid(2).is_solid());
    }

    #[test]
    fn test_validity() {
        assert!(MaterialSet::new([128, 127, 0, 0]).is_valid());
        let bad = MaterialSet::new([200, 200, 0, 0]);
        assert!(!bad.is_valid());
        assert_eq!(bad.density(), 255);
    }

    #[test]
    fn test_dominant_material() {
        assert_eq!(MaterialSet::new([10, 50, 50, 0]).dominant_material(), 1);
        assert_eq!(MaterialSet::solid(3).dominant_material(), 3);
    }
}
