//! Paged voxel storage for one volume region

use std::collections::{HashMap, HashSet};

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::Region;

use super::page::{Page, page_coord, page_index, voxel_position};
use super::voxel::Voxel;

/// Owns every voxel of a volume's region.
///
/// Pages are allocated on first write and dropped again once they return to
/// all-default content. Touched pages are remembered so persistence only writes
/// what changed since the last flush.
#[derive(Debug)]
pub struct VoxelStore<V: Voxel> {
    region: Region,
    pages: HashMap<IVec3, Page<V>>,
    /// Pages modified since the last flush (may no longer exist)
    dirty: HashSet<IVec3>,
}

impl<V: Voxel> VoxelStore<V> {
    /// Create an empty store covering `region`
    pub fn new(region: Region) -> Self {
        Self {
            region,
            pages: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    fn check(&self, pos: IVec3) -> Result<()> {
        if self.region.contains(pos) {
            Ok(())
        } else {
            Err(Error::OutOfRange { x: pos.x, y: pos.y, z: pos.z })
        }
    }

    /// Read a voxel; default when never written
    pub fn get(&self, pos: IVec3) -> Result<V> {
        self.check(pos)?;
        Ok(self.get_or_empty(pos))
    }

    /// Read a voxel, treating anything outside the region as empty
    pub fn get_or_empty(&self, pos: IVec3) -> V {
        if !self.region.contains(pos) {
            return V::default();
        }
        self.pages
            .get(&page_coord(pos))
            .map(|page| page.get(page_index(pos)))
            .unwrap_or_default()
    }

    /// Write a voxel and return the previous value
    pub fn set(&mut self, pos: IVec3, voxel: V) -> Result<V> {
        self.check(pos)?;
        let coord = page_coord(pos);
        let previous = match self.pages.get_mut(&coord) {
            Some(page) => {
                let previous = page.set(page_index(pos), voxel);
                if page.is_default() {
                    self.pages.remove(&coord);
                }
                previous
            }
            None if voxel == V::default() => return Ok(V::default()),
            None => {
                let mut page = Page::new();
                page.set(page_index(pos), voxel);
                self.pages.insert(coord, page);
                V::default()
            }
        };
        if previous != voxel {
            self.dirty.insert(coord);
        }
        Ok(previous)
    }

    /// Install a page read from storage. Does not mark it dirty.
    pub fn insert_page(&mut self, coord: IVec3, page: Page<V>) {
        if page.is_default() {
            self.pages.remove(&coord);
        } else {
            self.pages.insert(coord, page);
        }
    }

    pub fn page(&self, coord: IVec3) -> Option<&Page<V>> {
        self.pages.get(&coord)
    }

    pub fn pages(&self) -> impl Iterator<Item = (IVec3, &Page<V>)> {
        self.pages.iter().map(|(coord, page)| (*coord, page))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Coordinates of pages touched since the last `clear_dirty`
    pub fn dirty_pages(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.dirty.iter().copied()
    }

    /// Dirty pages that no longer exist and must be deleted from storage
    pub fn removed_pages(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.dirty.iter().copied().filter(|coord| !self.pages.contains_key(coord))
    }

    pub fn has_dirty_pages(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Every non-empty voxel in the store
    pub fn solid_positions(&self) -> impl Iterator<Item = IVec3> + '_ {
        self.pages.iter().flat_map(|(coord, page)| {
            page.solid_voxels().map(move |(index, _)| voxel_position(*coord, index))
        })
    }

    /// Allocated pages overlapping `area`, in z-major order.
    ///
    /// Looks up each page coordinate under small areas and filters the page map under
    /// large ones, so the cost follows whichever is smaller.
    pub fn pages_in(&self, area: &Region) -> Vec<IVec3> {
        let lower = page_coord(area.lower());
        let upper = page_coord(area.upper());
        let span = (upper - lower + IVec3::ONE).as_u64vec3();
        let mut coords: Vec<IVec3> = if span.x.saturating_mul(span.y).saturating_mul(span.z) > self.pages.len() as u64 {
            self.pages
                .keys()
                .copied()
                .filter(|c| c.cmpge(lower).all() && c.cmple(upper).all())
                .collect()
        } else {
            Region::new_unchecked(lower, upper)
                .positions()
                .filter(|c| self.pages.contains_key(c))
                .collect()
        };
        coords.sort_unstable_by_key(|c| (c.z, c.y, c.x));
        coords
    }

    /// Non-empty voxels inside `area`, page by page
    pub fn solid_in<'a>(&'a self, area: &'a Region) -> impl Iterator<Item = (IVec3, V)> + 'a {
        self.pages_in(area)
            .into_iter()
            .filter_map(move |coord| self.pages.get(&coord).map(|page| (coord, page)))
            .flat_map(move |(coord, page)| {
                page.solid_voxels()
                    .map(move |(index, voxel)| (voxel_position(coord, index), voxel))
                    .filter(move |(pos, _)| area.contains(*pos))
            })
    }
}
