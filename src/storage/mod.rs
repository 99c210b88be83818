//! Persistent storage of volumes

pub mod disk_io;

pub use disk_io::{Dataset, VolumeMetadata, FORMAT_VERSION};
