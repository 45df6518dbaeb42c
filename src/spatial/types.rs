//! Plain data records passed in and out of the engine.

use serde::{Deserialize, Serialize};

/// A point in the 2-D plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Position { x, y }
    }

    #[inline]
    pub fn distance(&self, other: Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A caller-identified point entity. Ids need not be unique.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: u32,
    pub position: Position,
}

impl Entity {
    pub fn new(id: u32, x: f32, y: f32) -> Self {
        Entity {
            id,
            position: Position::new(x, y),
        }
    }
}

/// Discretized `(column, row)` coordinate of a grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub cx: i32,
    pub cy: i32,
}

impl CellKey {
    pub fn new(cx: i32, cy: i32) -> Self {
        CellKey { cx, cy }
    }
}

/// One hit of a radius query.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryResultItem {
    pub entity: Entity,
    /// Euclidean distance from the query center at the time of the query.
    pub distance: f32,
}

/// Parameters of a single radius query, used for batched queries.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub center: Position,
    pub radius: f32,
    pub max_results: usize,
}

impl QueryRequest {
    pub fn new(center: Position, radius: f32, max_results: usize) -> Self {
        QueryRequest {
            center,
            radius,
            max_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(500.0, 500.0);
        let b = Position::new(505.0, 505.0);
        assert!((a.distance(b) - 7.071_068).abs() < 1e-4);
        assert_eq!(a.distance(a), 0.0);
    }

    #[test]
    fn finiteness() {
        assert!(Position::new(1.0, -3.0).is_finite());
        assert!(!Position::new(f32::NAN, 0.0).is_finite());
        assert!(!Position::new(0.0, f32::NEG_INFINITY).is_finite());
    }
}
