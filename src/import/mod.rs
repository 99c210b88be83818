//! Building colored-cube volumes from image data

pub mod heightmap;
pub mod slices;

pub use heightmap::{import_heightmap, volume_from_heightmap};
pub use slices::{import_slices, volume_from_slices};

use crate::core::error::Error;

pub(crate) fn image_error(err: image::ImageError) -> Error {
    Error::Import(err.to_string())
}
