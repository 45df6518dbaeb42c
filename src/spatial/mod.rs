//! Spatial Hash Engine
//!
//! Bounded-radius neighbor search over 2-D point entities. Entities live in a dense
//! store; a fixed-size hash table maps grid cells to store indices.

pub mod engine;
pub mod grid;
pub mod query;
pub mod store;
pub mod types;
pub mod scale_test;
#[cfg(feature = "python")]
pub mod py_api;

pub use engine::{EngineStatus, Placement, SpatialEngine};
pub use grid::{CellSpan, GridIndex, GridStats};
pub use store::{EntryStore, Slot};
pub use types::{CellKey, Entity, Position, QueryRequest, QueryResultItem};
