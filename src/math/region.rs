//! Integer voxel regions

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use glam::I64Vec3;

use crate::core::types::{IVec3, Result};

/// Inclusive integer box in voxel coordinates.
///
/// `lower <= upper` on every axis is enforced at construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    lower: IVec3,
    upper: IVec3,
}

impl Region {
    /// Create a region from inclusive corners.
    ///
    /// Each dimension must fit in an `i32`.
    pub fn new(lower: IVec3, upper: IVec3) -> Result<Self> {
        if lower.cmpgt(upper).any() {
            return Err(Error::InvalidRegion);
        }
        let extent = upper.as_i64vec3() - lower.as_i64vec3() + I64Vec3::ONE;
        if extent.max_element() > i32::MAX as i64 {
            return Err(Error::InvalidRegion);
        }
        Ok(Self { lower, upper })
    }

    /// Caller guarantees `lower <= upper`
    pub(crate) const fn new_unchecked(lower: IVec3, upper: IVec3) -> Self {
        Self { lower, upper }
    }

    /// Create a region from the six integers used at the host boundary
    pub fn from_bounds(lx: i32, ly: i32, lz: i32, ux: i32, uy: i32, uz: i32) -> Result<Self> {
        Self::new(IVec3::new(lx, ly, lz), IVec3::new(ux, uy, uz))
    }

    /// Region of the given dimensions starting at the origin
    pub fn with_size(width: u32, height: u32, depth: u32) -> Result<Self> {
        let max = i32::MAX as u32;
        if width == 0 || height == 0 || depth == 0 || width > max || height > max || depth > max {
            return Err(Error::InvalidRegion);
        }
        Self::from_bounds(0, 0, 0, width as i32 - 1, height as i32 - 1, depth as i32 - 1)
    }

    pub fn lower(&self) -> IVec3 {
        self.lower
    }

    pub fn upper(&self) -> IVec3 {
        self.upper
    }

    /// Width/height/depth in voxels (always >= 1)
    pub fn dimensions(&self) -> IVec3 {
        self.upper - self.lower + IVec3::ONE
    }

    pub fn width(&self) -> i32 {
        self.dimensions().x
    }

    pub fn height(&self) -> i32 {
        self.dimensions().y
    }

    pub fn depth(&self) -> i32 {
        self.dimensions().z
    }

    /// Total number of voxels
    pub fn volume(&self) -> u64 {
        let d = self.dimensions().as_u64vec3();
        d.x * d.y * d.z
    }

    pub fn contains(&self, p: IVec3) -> bool {
        p.cmpge(self.lower).all() && p.cmple(self.upper).all()
    }

    /// Intersection of two regions, `None` when disjoint
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let lower = self.lower.max(other.lower);
        let upper = self.upper.min(other.upper);
        Region::new(lower, upper).ok()
    }

    /// Iterate every position in z-major, x-minor order
    pub fn positions(&self) -> impl Iterator<Item = IVec3> + '_ {
        let (lo, hi) = (self.lower, self.upper);
        (lo.z..=hi.z).flat_map(move |z| {
            (lo.y..=hi.y).flat_map(move |y| (lo.x..=hi.x).map(move |x| IVec3::new(x, y, z)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions() {
        let region = Region::from_bounds(0, 0, 0, 15, 7, 3).unwrap();
        assert_eq!(region.dimensions(), IVec3::new(16, 8, 4));
        assert_eq!(region.volume(), 16 * 8 * 4);
    }

    #[test]
    fn test_single_voxel_region() {
        let region = Region::new(IVec3::splat(3), IVec3::splat(3)).unwrap();
        assert_eq!(region.width(), 1);
        assert_eq!(region.positions().count(), 1);
    }

    #[test]
    fn test_inverted_region_rejected() {
        assert!(matches!(
            Region::from_bounds(5, 0, 0, 4, 0, 0),
            Err(Error::InvalidRegion)
        ));
        assert!(Region::with_size(0, 1, 1).is_err());
    }

    #[test]
    fn test_extent_must_fit_i32() {
        assert!(matches!(
            Region::from_bounds(i32::MIN, 0, 0, i32::MAX, 0, 0),
            Err(Error::InvalidRegion)
        ));
        assert!(Region::with_size(1 << 31, 1, 1).is_err());
        let widest = Region::from_bounds(0, 0, 0, i32::MAX - 1, 0, 0).unwrap();
        assert_eq!(widest.width(), i32::MAX);
    }

    #[test]
    fn test_contains_inclusive() {
        let region = Region::from_bounds(-2, -2, -2, 2, 2, 2).unwrap();
        assert!(region.contains(IVec3::splat(2)));
        assert!(region.contains(IVec3::splat(-2)));
        assert!(!region.contains(IVec3::new(3, 0, 0)));
    }

    #[test]
    fn test_intersection() {
        let a = Region::from_bounds(0, 0, 0, 7, 7, 7).unwrap();
        let b = Region::from_bounds(4, 4, 4, 12, 12, 12).unwrap();
        let c = Region::from_bounds(8, 8, 8, 9, 9, 9).unwrap();
        assert_eq!(a.intersection(&b), Some(Region::from_bounds(4, 4, 4, 7, 7, 7).unwrap()));
        assert_eq!(a.intersection(&c), None);
    }
}
