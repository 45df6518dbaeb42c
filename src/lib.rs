//! SpatialHash Core - 2-D Spatial Hash Engine
//!
//! A fixed-size spatial hash over point entities with swap-compacted storage,
//! incremental re-bucketing and distance-ranked radius queries. The engine is
//! usable directly from Rust, across a C ABI (`ffi`), and optionally from Python.

pub mod core;
pub mod ffi;
pub mod spatial;

#[cfg(feature = "python")]
use pyo3::prelude::*;

// Re-export key types
pub use core::config::HashConfig;
pub use core::error::{SpatialError, SpatialResult};
pub use spatial::{
    EngineStatus, Entity, GridStats, Placement, Position, QueryRequest, QueryResultItem,
    SpatialEngine,
};

/// Initialize tracing for the library.
#[cfg_attr(feature = "python", pyfunction)]
#[cfg_attr(feature = "python", pyo3(signature = (level=None)))]
pub fn setup_logging(level: Option<String>) {
    let filter = level.unwrap_or_else(|| "info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .try_init();
}

/// Python module initialization
#[cfg(feature = "python")]
#[pymodule]
fn spatialhash_core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<spatial::py_api::PySpatialHash>()?;
    m.add_function(wrap_pyfunction!(setup_logging, m)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_logging_is_repeatable() {
        setup_logging(Some("debug".to_string()));
        setup_logging(None);
        crate::ffi::InitLogging();
    }
}
