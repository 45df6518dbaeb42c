//! Configuration and error handling shared across the crate.

pub mod config;
pub mod error;

pub use config::HashConfig;
pub use error::{SpatialError, SpatialResult};
