//! Query Planner
//!
//! Stateless radius search over the grid: bound the circle by a cell rectangle,
//! collect the entries filed in it, keep the ones truly inside the circle, then
//! rank by distance (ties by id) and cut to the result budget.

use std::cmp::Ordering;

use super::grid::GridIndex;
use super::store::EntryStore;
use super::types::{Position, QueryResultItem};

/// Ascending distance, then ascending id.
#[inline]
fn rank(a: &QueryResultItem, b: &QueryResultItem) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.entity.id.cmp(&b.entity.id))
}

/// Arguments are assumed validated by the engine.
pub fn plan(
    grid: &GridIndex,
    store: &EntryStore,
    center: Position,
    radius: f32,
    max_results: usize,
) -> Vec<QueryResultItem> {
    if max_results == 0 || store.is_empty() {
        return Vec::new();
    }

    let span = grid.cells_overlapping(center, radius);
    let slots = store.slots();
    let mut hits = Vec::new();

    // corner cells of the rectangle over-select, hence the exact check
    grid.for_each_in_span(span, |index| {
        let entity = slots[index as usize].entity;
        let distance = entity.position.distance(center);
        if distance <= radius {
            hits.push(QueryResultItem { entity, distance });
        }
    });

    if hits.len() > max_results {
        hits.select_nth_unstable_by(max_results - 1, rank);
        hits.truncate(max_results);
    }
    hits.sort_unstable_by(rank);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::HashConfig;
    use crate::spatial::types::Entity;

    fn build(entities: &[Entity], config: HashConfig) -> (GridIndex, EntryStore) {
        let mut grid = GridIndex::new(&config).unwrap();
        let store = EntryStore::create(entities).unwrap();
        for (i, slot) in store.iter().enumerate() {
            let key = grid.cell_key_of(slot.entity.position);
            grid.insert(key, i as u32).unwrap();
        }
        (grid, store)
    }

    fn ids(hits: &[QueryResultItem]) -> Vec<u32> {
        hits.iter().map(|h| h.entity.id).collect()
    }

    #[test]
    fn filters_corner_cells_by_exact_distance() {
        let entities = [
            Entity::new(1, 0.0, 0.0),
            Entity::new(2, 9.0, 9.0), // inside the bounding square, outside the circle
            Entity::new(3, 6.0, 0.0),
        ];
        let (grid, store) = build(&entities, HashConfig::new(8, 5.0));
        let hits = plan(&grid, &store, Position::new(0.0, 0.0), 10.0, 10);
        assert_eq!(ids(&hits), vec![1, 3]);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let (grid, store) = build(&[Entity::new(7, 3.0, 4.0)], HashConfig::new(8, 1.0));
        let hits = plan(&grid, &store, Position::new(0.0, 0.0), 5.0, 1);
        assert_eq!(ids(&hits), vec![7]);
        assert_eq!(hits[0].distance, 5.0);
    }

    #[test]
    fn ties_break_by_id_and_budget_truncates() {
        let entities = [
            Entity::new(40, 1.0, 0.0),
            Entity::new(10, 0.0, 1.0),
            Entity::new(30, -1.0, 0.0),
            Entity::new(20, 0.0, -1.0),
            Entity::new(5, 0.5, 0.0),
        ];
        let (grid, store) = build(&entities, HashConfig::new(4, 1.0));
        let center = Position::new(0.0, 0.0);

        let all = plan(&grid, &store, center, 2.0, 10);
        assert_eq!(ids(&all), vec![5, 10, 20, 30, 40]);

        let top = plan(&grid, &store, center, 2.0, 3);
        assert_eq!(ids(&top), vec![5, 10, 20]);
    }

    #[test]
    fn zero_budget_is_empty() {
        let (grid, store) = build(&[Entity::new(1, 0.0, 0.0)], HashConfig::default());
        assert!(plan(&grid, &store, Position::default(), 1.0, 0).is_empty());
    }

    #[test]
    fn colliding_cells_are_not_mixed_up() {
        // one bucket: every cell collides
        let entities = [Entity::new(1, 0.5, 0.5), Entity::new(2, 100.5, 100.5)];
        let (grid, store) = build(&entities, HashConfig::new(1, 1.0));
        let hits = plan(&grid, &store, Position::new(0.0, 0.0), 2.0, 10);
        assert_eq!(ids(&hits), vec![1]);
    }
}
