//! Per-volume configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::time::Timestamp;
use crate::core::types::Result;

/// How nodes of a volume should be drawn.
///
/// `modified` is stamped by the owning volume whenever the config is replaced,
/// so property sync can tell which nodes still carry old settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub enabled: bool,
    pub cast_shadows: bool,
    pub receive_shadows: bool,
    pub show_wireframe: bool,
    #[serde(skip)]
    pub modified: Timestamp,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cast_shadows: true,
            receive_shadows: true,
            show_wireframe: false,
            modified: 0,
        }
    }
}

/// Whether nodes take part in physics
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColliderConfig {
    pub enabled: bool,
    #[serde(skip)]
    pub modified: Timestamp,
}

impl Default for ColliderConfig {
    fn default() -> Self {
        Self { enabled: true, modified: 0 }
    }
}

/// Configuration for one volume instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Edge length of leaf nodes in voxels (power of two, at least 2)
    pub base_node_size: u32,
    /// Mesh extractions allowed per `update` call
    pub max_node_syncs_per_tick: usize,
    /// Build a collision mesh next to every render mesh
    pub use_collision_mesh: bool,
    /// Subtrees with this many solid voxels or fewer render as a single node (0 = off)
    pub lod_collapse_voxels: u32,
    /// Extraction fails for nodes that would need more vertices than this
    pub max_vertices_per_node: usize,
    /// Run the extraction jobs of a tick on the rayon pool
    pub parallel_extraction: bool,
    pub renderer: RendererConfig,
    pub collider: ColliderConfig,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            base_node_size: 16,
            max_node_syncs_per_tick: 4,
            use_collision_mesh: true,
            lod_collapse_voxels: 0,
            max_vertices_per_node: 1 << 20,
            parallel_extraction: true,
            renderer: RendererConfig::default(),
            collider: ColliderConfig::default(),
        }
    }
}

impl VolumeConfig {
    /// Reject settings the octree or extractors cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.base_node_size < 2 || !self.base_node_size.is_power_of_two() {
            return Err(Error::InvalidConfig(format!(
                "base_node_size must be a power of two >= 2, got {}",
                self.base_node_size
            )));
        }
        if self.max_node_syncs_per_tick == 0 {
            return Err(Error::InvalidConfig("max_node_syncs_per_tick must be at least 1".to_string()));
        }
        if self.max_vertices_per_node == 0 || self.max_vertices_per_node > u32::MAX as usize {
            return Err(Error::InvalidConfig(format!(
                "max_vertices_per_node out of range: {}",
                self.max_vertices_per_node
            )));
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }
}
