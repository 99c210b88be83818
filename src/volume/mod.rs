//! Volumes and the handle registry

pub mod config;
pub mod volume;
pub mod registry;

pub use config::{ColliderConfig, RendererConfig, VolumeConfig};
pub use volume::{ColoredCubesVolume, TerrainVolume, Volume};
pub use registry::{VolumeHandle, VolumeRegistry};
