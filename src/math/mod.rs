//! Mathematical utilities and data structures

pub mod aabb;
pub mod region;

pub use aabb::Aabb;
pub use region::Region;
