//! Incremental mirroring of the octree to renderer and collider consumers

pub mod state;
pub mod events;
pub mod scheduler;

pub use state::{NodeSyncState, SyncState};
pub use events::{FnObserver, NullObserver, SyncEvent, SyncObserver};
pub use scheduler::{SyncReport, SyncScheduler};
