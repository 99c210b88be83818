//! Image-slice import
//!
//! A slice folder holds one RGBA image per z layer, ordered by file name. The
//! top image row is the highest y. Pixels with alpha below the threshold
//! stay empty.

use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::Region;
use crate::volume::{ColoredCubesVolume, VolumeConfig};
use crate::voxel::color::Color;
use crate::voxel::voxel::Voxel;

use super::image_error;

const SLICE_EXTENSIONS: [&str; 4] = ["png", "bmp", "tga", "jpg"];

/// Build a volume from in-memory slices, slice `i` at z = i
pub fn volume_from_slices(slices: &[RgbaImage], config: VolumeConfig) -> Result<ColoredCubesVolume> {
    let Some(first) = slices.first() else {
        return Err(Error::Import("no slices to import".to_string()));
    };
    let (width, height) = first.dimensions();
    if let Some((z, slice)) = slices.iter().enumerate().find(|(_, s)| s.dimensions() != (width, height)) {
        return Err(Error::Import(format!(
            "slice {} is {:?}, expected {:?}",
            z,
            slice.dimensions(),
            (width, height)
        )));
    }

    let region = Region::with_size(width, height, slices.len() as u32)?;
    let mut volume = ColoredCubesVolume::new(region, config)?;
    for (z, slice) in slices.iter().enumerate() {
        for (u, row, pixel) in slice.enumerate_pixels() {
            let color = Color::from(pixel.0);
            if color.is_empty() {
                continue;
            }
            let y = (height - 1 - row) as i32;
            volume.set_voxel(IVec3::new(u as i32, y, z as i32), color)?;
        }
    }
    log::info!("Imported {} slices of {}x{}", slices.len(), width, height);
    Ok(volume)
}

fn slice_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(folder)? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| SLICE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load every slice image in `folder` and build the volume
pub fn import_slices(folder: &Path, config: VolumeConfig) -> Result<ColoredCubesVolume> {
    let slices = slice_files(folder)?
        .iter()
        .map(|path| image::open(path).map(|img| img.to_rgba8()).map_err(image_error))
        .collect::<Result<Vec<_>>>()?;
    volume_from_slices(&slices, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use tempfile::TempDir;

    fn config() -> VolumeConfig {
        VolumeConfig { base_node_size: 8, ..Default::default() }
    }

    #[test]
    fn test_slices_orientation() {
        let mut bottom_row = RgbaImage::new(3, 2);
        bottom_row.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let mut top_row = RgbaImage::new(3, 2);
        top_row.put_pixel(2, 0, Rgba([0, 255, 0, 200]));

        let volume = volume_from_slices(&[bottom_row, top_row], config()).unwrap();
        assert_eq!(volume.enclosing_region().dimensions(), IVec3::new(3, 2, 2));
        assert_eq!(volume.get_voxel(IVec3::new(1, 0, 0)).unwrap(), Color::opaque(255, 0, 0));
        assert_eq!(volume.get_voxel(IVec3::new(2, 1, 1)).unwrap(), Color::opaque(0, 255, 0));
        assert!(volume.get_voxel(IVec3::new(2, 0, 1)).unwrap().is_empty());
    }

    #[test]
    fn test_mismatched_slices() {
        let result = volume_from_slices(&[RgbaImage::new(2, 2), RgbaImage::new(3, 2)], config());
        assert!(matches!(result, Err(Error::Import(_))));
        assert!(matches!(volume_from_slices(&[], config()), Err(Error::Import(_))));
    }

    #[test]
    fn test_import_folder() {
        let dir = TempDir::new().unwrap();
        for z in 0..3u8 {
            let img = RgbaImage::from_pixel(4, 4, Rgba([z * 50, 0, 0, 255]));
            img.save(dir.path().join(format!("slice_{:03}.png", z))).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let volume = import_slices(dir.path(), config()).unwrap();
        assert_eq!(volume.enclosing_region().depth(), 3);
        assert_eq!(volume.get_voxel(IVec3::new(0, 0, 2)).unwrap(), Color::opaque(100, 0, 0));
    }
}
