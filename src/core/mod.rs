//! Core crate types and utilities

pub mod types;
pub mod error;
pub mod logging;
pub mod time;

pub use types::*;
pub use error::Error;
pub use time::{Clock, Timestamp};
