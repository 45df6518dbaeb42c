use super::{Entity, Position, SpatialEngine};
use crate::core::config::HashConfig;
use crate::core::error::SpatialError;
use pyo3::exceptions::{PyIndexError, PyMemoryError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py(err: SpatialError) -> PyErr {
    match err {
        SpatialError::InvalidArgument(_) => PyValueError::new_err(err.to_string()),
        SpatialError::OutOfRange { .. } => PyIndexError::new_err(err.to_string()),
        SpatialError::InvalidState { .. } => PyRuntimeError::new_err(err.to_string()),
        SpatialError::AllocationFailure(_) => PyMemoryError::new_err(err.to_string()),
    }
}

#[pyclass(name = "SpatialHash")]
pub struct PySpatialHash {
    engine: SpatialEngine,
}

#[pymethods]
impl PySpatialHash {
    #[new]
    #[pyo3(signature = (table_size=64, cell_size=10.0))]
    pub fn new(table_size: u32, cell_size: f32) -> Self {
        Self {
            engine: SpatialEngine::new(HashConfig::new(table_size, cell_size)),
        }
    }

    /// Bucket `(id, x, y)` tuples. Allowed once per instance.
    pub fn start(&mut self, entities: Vec<(u32, f32, f32)>) -> PyResult<()> {
        let entities: Vec<Entity> = entities
            .into_iter()
            .map(|(id, x, y)| Entity::new(id, x, y))
            .collect();
        self.engine.start(&entities).map_err(to_py)
    }

    /// Re-bucket the first `count` entries (all of them by default). Returns how many moved.
    #[pyo3(signature = (count=None))]
    pub fn update(&mut self, count: Option<usize>) -> PyResult<usize> {
        let count = match count {
            Some(count) => count,
            None => self.engine.len().map_err(to_py)?,
        };
        self.engine.update(count).map_err(to_py)
    }

    pub fn set_position(&mut self, index: usize, x: f32, y: f32) -> PyResult<()> {
        self.engine
            .set_position(index, Position::new(x, y))
            .map_err(to_py)
    }

    /// Remove by index; the last entry takes its place. Returns the removed id.
    pub fn remove(&mut self, index: usize) -> PyResult<u32> {
        self.engine.remove(index).map(|e| e.id).map_err(to_py)
    }

    /// `[(id, x, y, distance)]`, nearest first.
    pub fn query(
        &self,
        x: f32,
        y: f32,
        radius: f32,
        max_results: usize,
    ) -> PyResult<Vec<(u32, f32, f32, f32)>> {
        let hits = self
            .engine
            .query(Position::new(x, y), radius, max_results)
            .map_err(to_py)?;
        Ok(hits
            .into_iter()
            .map(|h| (h.entity.id, h.entity.position.x, h.entity.position.y, h.distance))
            .collect())
    }

    pub fn stop(&mut self) -> PyResult<()> {
        self.engine.stop().map_err(to_py)
    }

    pub fn __len__(&self) -> PyResult<usize> {
        self.engine.len().map_err(to_py)
    }

    pub fn status(&self) -> String {
        self.engine.status().to_string()
    }

    /// Grid occupancy as JSON.
    pub fn stats_json(&self) -> PyResult<String> {
        let stats = self.engine.stats().map_err(to_py)?;
        serde_json::to_string(&stats).map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }
}
