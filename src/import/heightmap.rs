//! Heightmap + colormap import
//!
//! Pixel (u, v) of the heightmap becomes the column at x = u, z = v. The
//! column is filled from y = 0 up to the scaled luma value and every voxel of
//! it takes the colormap pixel at the same position.

use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::Region;
use crate::volume::{ColoredCubesVolume, VolumeConfig};
use crate::voxel::color::Color;

use super::image_error;

/// Column height for a luma value in a volume `max_height` voxels tall
fn column_height(luma: u8, max_height: u32) -> u32 {
    (luma as u32 * max_height).div_ceil(255)
}

/// Build a volume from in-memory images
pub fn volume_from_heightmap(
    heights: &GrayImage,
    colors: &RgbImage,
    max_height: u32,
    config: VolumeConfig,
) -> Result<ColoredCubesVolume> {
    if heights.dimensions() != colors.dimensions() {
        return Err(Error::Import(format!(
            "heightmap is {:?} but colormap is {:?}",
            heights.dimensions(),
            colors.dimensions()
        )));
    }
    let (width, depth) = heights.dimensions();
    let region = Region::with_size(width, max_height.max(1), depth)?;
    let mut volume = ColoredCubesVolume::new(region, config)?;

    let mut filled = 0usize;
    for (u, v, luma) in heights.enumerate_pixels() {
        let [r, g, b] = colors.get_pixel(u, v).0;
        let color = Color::opaque(r, g, b);
        for y in 0..column_height(luma.0[0], max_height) {
            volume.set_voxel(IVec3::new(u as i32, y as i32, v as i32), color)?;
            filled += 1;
        }
    }
    log::info!("Imported heightmap {}x{} ({} voxels)", width, depth, filled);
    Ok(volume)
}

/// Load both images from disk and build the volume
pub fn import_heightmap(
    heightmap: &Path,
    colormap: &Path,
    max_height: u32,
    config: VolumeConfig,
) -> Result<ColoredCubesVolume> {
    let heights = image::open(heightmap).map_err(image_error)?.to_luma8();
    let colors = image::open(colormap).map_err(image_error)?.to_rgb8();
    volume_from_heightmap(&heights, &colors, max_height, config)
}
