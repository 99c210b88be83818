//! Error types for cubevol

use thiserror::Error;

use crate::voxel::octree::NodeHandle;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    /// Coordinate outside the volume's enclosing region
    #[error("voxel ({x}, {y}, {z}) is outside the volume region")]
    OutOfRange { x: i32, y: i32, z: i32 },

    /// Operation on a destroyed or unknown volume/node handle
    #[error("invalid handle")]
    InvalidHandle,

    /// Malformed voxel data or oversized output for a single node
    #[error("mesh extraction failed for node {node:?}: {reason}")]
    ExtractionFailure { node: NodeHandle, reason: String },

    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("invalid region: lower corner exceeds upper corner")]
    InvalidRegion,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("import error: {0}")]
    Import(String),
}

impl Error {
    /// Whether this error leaves the volume untouched and the call can be retried
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::OutOfRange { .. } | Error::ExtractionFailure { .. } | Error::Storage(_)
        )
    }
}
