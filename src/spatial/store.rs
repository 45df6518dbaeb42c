//! Entry Store
//!
//! Dense, index-addressable storage for every entity in the engine. Entities live
//! here rather than in the hash table so buckets hold only small indices and the
//! table stays cache friendly. Removal swaps the last slot into the hole, so the
//! store never has gaps.

use super::types::{CellKey, Entity, Position};
use crate::core::error::{SpatialError, SpatialResult};

/// An entity plus the bookkeeping needed to find it again in its bucket in O(1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Slot {
    pub entity: Entity,
    /// Cell the entity is currently bucketed under.
    pub cell: CellKey,
    /// Position of this slot's index inside its bucket.
    pub bucket_position: u32,
}

/// Outcome of a swap-compacting removal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Removed {
    pub slot: Slot,
    /// Former index of the slot that was moved into the freed index, if any.
    pub relocated_from: Option<usize>,
}

#[derive(Debug, Default)]
pub struct EntryStore {
    slots: Vec<Slot>,
}

impl EntryStore {
    /// Copy `entities` into a fresh store. Bookkeeping is filled in by the grid.
    pub fn create(entities: &[Entity]) -> SpatialResult<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(entities.len())?;
        slots.extend(entities.iter().map(|&entity| Slot {
            entity,
            cell: CellKey::default(),
            bucket_position: 0,
        }));
        Ok(EntryStore { slots })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> SpatialResult<Entity> {
        self.slot(index).map(|s| s.entity)
    }

    pub fn slot(&self, index: usize) -> SpatialResult<&Slot> {
        let len = self.slots.len();
        self.slots
            .get(index)
            .ok_or(SpatialError::OutOfRange { index, len })
    }

    pub fn slot_mut(&mut self, index: usize) -> SpatialResult<&mut Slot> {
        let len = self.slots.len();
        self.slots
            .get_mut(index)
            .ok_or(SpatialError::OutOfRange { index, len })
    }

    pub fn position_of(&self, index: usize) -> SpatialResult<Position> {
        self.slot(index).map(|s| s.entity.position)
    }

    /// Moves the entity without touching grid membership.
    pub fn set_position(&mut self, index: usize, position: Position) -> SpatialResult<()> {
        self.slot_mut(index)?.entity.position = position;
        Ok(())
    }

    /// Swap-remove the slot at `index`.
    ///
    /// Any index previously handed out for the last slot now refers to `index`.
    pub fn remove(&mut self, index: usize) -> SpatialResult<Removed> {
        let len = self.slots.len();
        if index >= len {
            return Err(SpatialError::OutOfRange { index, len });
        }
        let last = len - 1;
        let slot = self.slots.swap_remove(index);
        Ok(Removed {
            slot,
            relocated_from: (index != last).then_some(last),
        })
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn iter(&self) -> impl Iterator<Item = &Slot> + '_ {
        self.slots.iter()
    }

    /// First index whose entity carries `id`.
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.slots.iter().position(|s| s.entity.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_of(n: u32) -> EntryStore {
        let entities: Vec<Entity> = (0..n).map(|i| Entity::new(i + 100, i as f32, 0.0)).collect();
        EntryStore::create(&entities).unwrap()
    }

    #[test]
    fn get_and_bounds() {
        let store = store_of(3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(1).unwrap().id, 101);
        assert_eq!(
            store.get(3).unwrap_err(),
            SpatialError::OutOfRange { index: 3, len: 3 }
        );
    }

    #[test]
    fn remove_swaps_last_into_hole() {
        let mut store = store_of(4);
        let removed = store.remove(1).unwrap();
        assert_eq!(removed.slot.entity.id, 101);
        assert_eq!(removed.relocated_from, Some(3));
        assert_eq!(store.len(), 3);
        assert_eq!(store.get(1).unwrap().id, 103);
        assert_eq!(store.index_of(103), Some(1));
        assert_eq!(store.index_of(101), None);
    }

    #[test]
    fn removing_last_relocates_nothing() {
        let mut store = store_of(2);
        let removed = store.remove(1).unwrap();
        assert_eq!(removed.relocated_from, None);
        let removed = store.remove(0).unwrap();
        assert_eq!(removed.relocated_from, None);
        assert!(store.is_empty());
        assert!(store.remove(0).is_err());
    }

    #[test]
    fn set_position_changes_geometry_only() {
        let mut store = store_of(1);
        let cell = store.slot(0).unwrap().cell;
        store.set_position(0, Position::new(42.0, 7.0)).unwrap();
        assert_eq!(store.position_of(0).unwrap(), Position::new(42.0, 7.0));
        assert_eq!(store.slot(0).unwrap().cell, cell);
        assert!(store.set_position(5, Position::default()).is_err());
    }
}
