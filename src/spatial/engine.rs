//! Spatial Engine
//!
//! Owns an [`EntryStore`] and a [`GridIndex`] as one unit and keeps them in sync.
//! Every mutation of store indices or bucket positions goes through here, so the
//! index-to-bucket invariant holds after each call:
//!
//! * every slot's `cell` equals `cell_key_of(position)` (outside of `set_position`
//!   until the next `update`),
//! * the bucket entry at `(cell, bucket_position)` points back at the slot's index.

use std::fmt;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use super::grid::{BucketEntry, GridIndex, GridStats};
use super::query;
use super::store::EntryStore;
use super::types::{CellKey, Entity, Position, QueryRequest, QueryResultItem};
use crate::core::config::HashConfig;
use crate::core::error::{SpatialError, SpatialResult};

/// Lifecycle of an engine handle: `Unbuilt → Active → Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum EngineStatus {
    Unbuilt,
    Active,
    Stopped,
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Unbuilt => write!(f, "unbuilt"),
            EngineStatus::Active => write!(f, "active"),
            EngineStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Where an entry currently sits in the hash table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub cell: CellKey,
    pub bucket: u32,
    pub bucket_position: u32,
}

struct Partition {
    store: EntryStore,
    grid: GridIndex,
}

enum Lifecycle {
    Unbuilt,
    Active(Partition),
    Stopped,
}

/// A 2-D spatial hash over a dense, swap-compacted entity store.
///
/// Not internally synchronized: one caller at a time per engine. Separate engines
/// share nothing and may be driven from separate threads.
pub struct SpatialEngine {
    config: HashConfig,
    lifecycle: Lifecycle,
}

impl SpatialEngine {
    pub fn new(config: HashConfig) -> Self {
        SpatialEngine {
            config,
            lifecycle: Lifecycle::Unbuilt,
        }
    }

    /// Create and start in one step.
    pub fn build(entities: &[Entity], config: HashConfig) -> SpatialResult<Self> {
        let mut engine = Self::new(config);
        engine.start(entities)?;
        Ok(engine)
    }

    pub fn status(&self) -> EngineStatus {
        match self.lifecycle {
            Lifecycle::Unbuilt => EngineStatus::Unbuilt,
            Lifecycle::Active(_) => EngineStatus::Active,
            Lifecycle::Stopped => EngineStatus::Stopped,
        }
    }

    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    fn active(&self, operation: &'static str) -> SpatialResult<&Partition> {
        match &self.lifecycle {
            Lifecycle::Active(partition) => Ok(partition),
            _ => Err(SpatialError::InvalidState {
                operation,
                status: self.status(),
            }),
        }
    }

    fn active_mut(&mut self, operation: &'static str) -> SpatialResult<&mut Partition> {
        let status = self.status();
        match &mut self.lifecycle {
            Lifecycle::Active(partition) => Ok(partition),
            _ => Err(SpatialError::InvalidState { operation, status }),
        }
    }

    // ── Build / teardown ────────────────────────────────────────────────────

    /// Copy `entities` into the store and bucket every one of them.
    pub fn start(&mut self, entities: &[Entity]) -> SpatialResult<()> {
        if !matches!(self.lifecycle, Lifecycle::Unbuilt) {
            return Err(SpatialError::InvalidState {
                operation: "start",
                status: self.status(),
            });
        }
        self.config.validate()?;
        if u32::try_from(entities.len()).is_err() {
            return Err(SpatialError::invalid(format!(
                "{} entities exceed the u32 index space",
                entities.len()
            )));
        }
        if let Some(bad) = entities.iter().position(|e| !e.position.is_finite()) {
            return Err(SpatialError::invalid(format!(
                "entity at index {} has a non-finite position",
                bad
            )));
        }

        let mut store = EntryStore::create(entities)?;
        let mut grid = GridIndex::new(&self.config)?;
        for index in 0..store.len() {
            let slot = store.slot_mut(index)?;
            let cell = grid.cell_key_of(slot.entity.position);
            slot.bucket_position = grid.insert(cell, index as u32)?;
            slot.cell = cell;
        }

        let stats = grid.stats();
        info!(
            "[SpatialHash] Built {} entries into {}/{} buckets (cell size {}, longest chain {})",
            stats.entries, stats.occupied_buckets, stats.table_size, stats.cell_size, stats.longest_chain
        );
        self.lifecycle = Lifecycle::Active(Partition { store, grid });
        Ok(())
    }

    /// Release all storage. Every later call fails with `InvalidState`.
    pub fn stop(&mut self) -> SpatialResult<()> {
        let partition = self.active("stop")?;
        info!("[SpatialHash] Stopped with {} live entries", partition.store.len());
        self.lifecycle = Lifecycle::Stopped;
        Ok(())
    }

    // ── Entry access ────────────────────────────────────────────────────────

    pub fn len(&self) -> SpatialResult<usize> {
        Ok(self.active("len")?.store.len())
    }

    pub fn is_empty(&self) -> SpatialResult<bool> {
        Ok(self.active("is_empty")?.store.is_empty())
    }

    pub fn get(&self, index: usize) -> SpatialResult<Entity> {
        self.active("get")?.store.get(index)
    }

    pub fn position_of(&self, index: usize) -> SpatialResult<Position> {
        self.active("position_of")?.store.position_of(index)
    }

    /// Move an entity without re-bucketing it; call [`update`](Self::update) afterwards.
    pub fn set_position(&mut self, index: usize, position: Position) -> SpatialResult<()> {
        check_finite(position)?;
        self.active_mut("set_position")?
            .store
            .set_position(index, position)
    }

    /// Overwrite the positions of the first `positions.len()` entries, index-aligned.
    /// Nothing is written unless every position is finite and in range.
    pub fn sync_positions(&mut self, positions: &[Position]) -> SpatialResult<()> {
        let partition = self.active_mut("sync_positions")?;
        let len = partition.store.len();
        if positions.len() > len {
            return Err(SpatialError::invalid(format!(
                "{} positions for {} live entries",
                positions.len(),
                len
            )));
        }
        positions.iter().copied().try_for_each(check_finite)?;
        for (index, &position) in positions.iter().enumerate() {
            partition.store.set_position(index, position)?;
        }
        Ok(())
    }

    /// Move an entity and re-bucket it immediately. Returns whether it changed cell.
    pub fn reposition(&mut self, index: usize, position: Position) -> SpatialResult<bool> {
        check_finite(position)?;
        let partition = self.active_mut("reposition")?;
        partition.store.slot(index)?;
        let cell = partition.grid.cell_key_of(position);
        partition.grid.reserve([cell])?;
        partition.store.set_position(index, position)?;
        partition.rebucket(index, cell)
    }

    /// First live index carrying `id`. Indices shift on every removal; ids do not.
    pub fn index_of(&self, id: u32) -> SpatialResult<Option<usize>> {
        Ok(self.active("index_of")?.store.index_of(id))
    }

    pub fn entities(&self) -> SpatialResult<Vec<Entity>> {
        Ok(self
            .active("entities")?
            .store
            .iter()
            .map(|s| s.entity)
            .collect())
    }

    pub fn placement(&self, index: usize) -> SpatialResult<Placement> {
        let partition = self.active("placement")?;
        let slot = partition.store.slot(index)?;
        Ok(Placement {
            cell: slot.cell,
            bucket: partition.grid.bucket_of(slot.cell) as u32,
            bucket_position: slot.bucket_position,
        })
    }

    // ── Update / remove ─────────────────────────────────────────────────────

    /// Re-bucket the first `count` entries whose position left their cell.
    ///
    /// `count` mirrors the live entry count; anything larger is rejected before
    /// the index is touched. Returns how many entries changed cell.
    pub fn update(&mut self, count: usize) -> SpatialResult<usize> {
        let partition = self.active_mut("update")?;
        let len = partition.store.len();
        if count > len {
            return Err(SpatialError::invalid(format!(
                "update count {} exceeds {} live entries",
                count, len
            )));
        }

        let mut moves = Vec::new();
        for (index, slot) in partition.store.slots()[..count].iter().enumerate() {
            let cell = partition.grid.cell_key_of(slot.entity.position);
            if cell != slot.cell {
                moves.try_reserve(1)?;
                moves.push((index, cell));
            }
        }
        // all growth happens up front so the moves below cannot fail halfway
        partition.grid.reserve(moves.iter().map(|&(_, cell)| cell))?;

        for &(index, cell) in &moves {
            partition.rebucket(index, cell)?;
            debug!(
                "[SpatialHash] {} was moved to cell ({}, {})",
                partition.store.get(index)?.id,
                cell.cx,
                cell.cy
            );
        }
        Ok(moves.len())
    }

    /// Remove the entry at `index`, returning it.
    ///
    /// The last entry is swapped into `index`, so every index obtained before
    /// this call is stale afterwards. Use ids for stable identity.
    pub fn remove(&mut self, index: usize) -> SpatialResult<Entity> {
        let partition = self.active_mut("remove")?;
        let slot = *partition.store.slot(index)?;

        if let Some(moved) = partition
            .grid
            .remove_from_bucket(slot.cell, slot.bucket_position)?
        {
            partition.store.slot_mut(moved as usize)?.bucket_position = slot.bucket_position;
        }

        let removed = partition.store.remove(index)?;
        if removed.relocated_from.is_some() {
            let relocated = *partition.store.slot(index)?;
            partition
                .grid
                .rewrite(relocated.cell, relocated.bucket_position, index as u32)?;
        }
        Ok(removed.slot.entity)
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// Up to `max_results` entities within `radius` of `center`, nearest first,
    /// equal distances ordered by ascending id.
    pub fn query(
        &self,
        center: Position,
        radius: f32,
        max_results: usize,
    ) -> SpatialResult<Vec<QueryResultItem>> {
        let partition = self.active("query")?;
        check_finite(center)?;
        if !(radius > 0.0) {
            return Err(SpatialError::invalid(format!(
                "radius must be positive, got {}",
                radius
            )));
        }
        Ok(query::plan(
            &partition.grid,
            &partition.store,
            center,
            radius,
            max_results,
        ))
    }

    /// Answer independent queries in parallel.
    pub fn query_many(&self, requests: &[QueryRequest]) -> Vec<SpatialResult<Vec<QueryResultItem>>> {
        requests
            .par_iter()
            .map(|r| self.query(r.center, r.radius, r.max_results))
            .collect()
    }

    // ── Housekeeping ────────────────────────────────────────────────────────

    pub fn stats(&self) -> SpatialResult<GridStats> {
        Ok(self.active("stats")?.grid.stats())
    }

    pub fn shrink_to_fit(&mut self) -> SpatialResult<()> {
        self.active_mut("shrink_to_fit")?.grid.shrink_to_fit();
        Ok(())
    }

    /// Audit the index-to-bucket invariant. False unless active and consistent.
    pub fn is_consistent(&self) -> bool {
        let Ok(partition) = self.active("is_consistent") else {
            return false;
        };
        partition.grid.len() == partition.store.len()
            && partition.store.iter().enumerate().all(|(index, slot)| {
                slot.cell == partition.grid.cell_key_of(slot.entity.position)
                    && partition.grid.entry_at(slot.cell, slot.bucket_position)
                        == Some(BucketEntry {
                            cell: slot.cell,
                            index: index as u32,
                        })
            })
    }
}

impl fmt::Debug for SpatialEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialEngine")
            .field("config", &self.config)
            .field("status", &self.status())
            .field("len", &self.len().ok())
            .finish()
    }
}

impl Partition {
    /// Move `index` into the bucket of `cell`. Capacity for `cell` must be reserved.
    fn rebucket(&mut self, index: usize, cell: CellKey) -> SpatialResult<bool> {
        let slot = *self.store.slot(index)?;
        if cell == slot.cell {
            return Ok(false);
        }

        // insert before removing: a failed insert leaves the old membership intact
        let mut bucket_position = self.grid.insert(cell, index as u32)?;
        match self.grid.remove_from_bucket(slot.cell, slot.bucket_position)? {
            // old and new cell share a bucket and the new entry was the tail
            Some(moved) if moved as usize == index => bucket_position = slot.bucket_position,
            Some(moved) => {
                self.store.slot_mut(moved as usize)?.bucket_position = slot.bucket_position
            }
            None => {}
        }

        let slot = self.store.slot_mut(index)?;
        slot.cell = cell;
        slot.bucket_position = bucket_position;
        Ok(true)
    }
}

fn check_finite(position: Position) -> SpatialResult<()> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(SpatialError::invalid(format!(
            "position ({}, {}) is not finite",
            position.x, position.y
        )))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
