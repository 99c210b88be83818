//! Fixed-size voxel pages backing the store

use crate::core::types::IVec3;

use super::voxel::Voxel;

/// Edge length of a page in voxels
pub const PAGE_SIZE: i32 = 8;

/// Voxels per page
pub const PAGE_VOLUME: usize = (PAGE_SIZE * PAGE_SIZE * PAGE_SIZE) as usize;

/// Page containing `pos` (floor division, works for negative coordinates)
pub fn page_coord(pos: IVec3) -> IVec3 {
    pos.div_euclid(IVec3::splat(PAGE_SIZE))
}

/// Linear index of `pos` inside its page, x fastest
pub fn page_index(pos: IVec3) -> usize {
    let local = pos.rem_euclid(IVec3::splat(PAGE_SIZE));
    ((local.z * PAGE_SIZE + local.y) * PAGE_SIZE + local.x) as usize
}

/// 8x8x8 block of voxels, allocated only once something non-default is written
#[derive(Clone, Debug, PartialEq)]
pub struct Page<V: Voxel> {
    voxels: Box<[V]>,
    /// Number of voxels that differ from `V::default()`
    occupied: u16,
}

impl<V: Voxel> Page<V> {
    /// Page of default (empty) voxels
    pub fn new() -> Self {
        Self {
            voxels: vec![V::default(); PAGE_VOLUME].into_boxed_slice(),
            occupied: 0,
        }
    }

    /// Build a page from raw bytes as written by `as_bytes`
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != PAGE_VOLUME * std::mem::size_of::<V>() {
            return None;
        }
        let voxels: Vec<V> = bytemuck::pod_collect_to_vec(bytes);
        let occupied = voxels.iter().filter(|v| **v != V::default()).count() as u16;
        Some(Self { voxels: voxels.into_boxed_slice(), occupied })
    }

    /// Raw voxel bytes for persistence
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.voxels)
    }

    pub fn get(&self, index: usize) -> V {
        self.voxels[index]
    }

    /// Store a voxel and return the previous value
    pub fn set(&mut self, index: usize, voxel: V) -> V {
        let previous = std::mem::replace(&mut self.voxels[index], voxel);
        let default = V::default();
        match (previous == default, voxel == default) {
            (true, false) => self.occupied += 1,
            (false, true) => self.occupied -= 1,
            _ => {}
        }
        previous
    }

    /// True when every voxel is the default value
    pub fn is_default(&self) -> bool {
        self.occupied == 0
    }

    /// Iterate (index, voxel) for every non-empty voxel
    pub fn solid_voxels(&self) -> impl Iterator<Item = (usize, V)> + '_ {
        self.voxels
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_solid())
            .map(|(i, v)| (i, *v))
    }
}

impl<V: Voxel> Default for Page<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of voxel `index` inside the page at `coord`
pub fn voxel_position(coord: IVec3, index: usize) -> IVec3 {
    let i = index as i32;
    let local = IVec3::new(i % PAGE_SIZE, (i / PAGE_SIZE) % PAGE_SIZE, i / (PAGE_SIZE * PAGE_SIZE));
    coord * PAGE_SIZE + local
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voxel::color::Color;

    #[test]
    fn test_page_coord_negative() {
        assert_eq!(page_coord(IVec3::new(-1, 0, 8)), IVec3::new(-1, 0, 1));
        assert_eq!(page_index(IVec3::new(-1, 0, 0)), 7);
    }

    #[test]
    fn test_index_position_inverse() {
        let coord = IVec3::new(2, -1, 0);
        for pos in [IVec3::new(16, -8, 0), IVec3::new(23, -1, 7), IVec3::new(19, -5, 3)] {
            assert_eq!(page_coord(pos), coord);
            assert_eq!(voxel_position(coord, page_index(pos)), pos);
        }
    }

    #[test]
    fn test_occupancy_tracking() {
        let mut page = Page::<Color>::new();
        assert!(page.is_default());
        page.set(3, Color::opaque(1, 2, 3));
        // transparent but not default still counts as occupied
        page.set(4, Color::new(5, 5, 5, 0));
        assert!(!page.is_default());
        assert_eq!(page.solid_voxels().count(), 1);
        page.set(3, Color::EMPTY);
        page.set(4, Color::EMPTY);
        assert!(page.is_default());
    }

    #[test]
    fn test_bytes_roundtrip() {
        let mut page = Page::<Color>::new();
        page.set(100, Color::opaque(200, 10, 0));
        let restored = Page::<Color>::from_bytes(page.as_bytes()).unwrap();
        assert_eq!(restored, page);
        assert!(Page::<Color>::from_bytes(&[0u8; 7]).is_none());
    }
}
