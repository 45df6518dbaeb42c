// grid.rs: Grid Index.
//
// Cell key = floor(position / cell_size) on each axis.
// Hash: Fibonacci hashing (Knuth), reduced to `table_size` buckets by mask when the
// table is a power of two, by modulo otherwise.
// Collisions chain inside the bucket; every bucket entry carries its true cell key.
// Buckets are never pruned eagerly and the table never grows.

use std::collections::HashMap;

use serde::Serialize;

use super::types::{CellKey, Position};
use crate::core::config::HashConfig;
use crate::core::error::{SpatialError, SpatialResult};

/// One entry index filed under the cell it was bucketed for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BucketEntry {
    pub cell: CellKey,
    pub index: u32,
}

/// Inclusive rectangle of cell keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CellSpan {
    pub min: CellKey,
    pub max: CellKey,
}

impl CellSpan {
    /// Number of cells covered. Saturates instead of overflowing for huge spans.
    pub fn cell_count(&self) -> u64 {
        let w = (self.max.cx as i64 - self.min.cx as i64 + 1).max(0) as u64;
        let h = (self.max.cy as i64 - self.min.cy as i64 + 1).max(0) as u64;
        w.saturating_mul(h)
    }

    #[inline]
    pub fn contains(&self, key: CellKey) -> bool {
        (self.min.cx..=self.max.cx).contains(&key.cx) && (self.min.cy..=self.max.cy).contains(&key.cy)
    }

    /// Row-major walk over every cell in the span.
    pub fn cells(&self) -> impl Iterator<Item = CellKey> + '_ {
        (self.min.cy..=self.max.cy)
            .flat_map(move |cy| (self.min.cx..=self.max.cx).map(move |cx| CellKey::new(cx, cy)))
    }
}

/// Occupancy snapshot, mostly useful to spot long chains under heavy clustering.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GridStats {
    pub table_size: u32,
    pub cell_size: f32,
    pub entries: usize,
    pub occupied_buckets: usize,
    pub longest_chain: usize,
}

/// Spatial hash table of entry indices.
#[derive(Debug)]
pub struct GridIndex {
    buckets: Vec<Vec<BucketEntry>>,
    table_size: usize,
    mask: Option<usize>, // table_size - 1, only for powers of two
    cell_size: f32,
    bucket_capacity: usize,
    entries: usize,
}

impl GridIndex {
    pub fn new(config: &HashConfig) -> SpatialResult<Self> {
        config.validate()?;
        let table_size = config.table_size as usize;

        let mut buckets = Vec::new();
        buckets.try_reserve_exact(table_size)?;
        buckets.resize_with(table_size, Vec::new);

        Ok(GridIndex {
            buckets,
            table_size,
            mask: table_size.is_power_of_two().then(|| table_size - 1),
            cell_size: config.cell_size,
            bucket_capacity: config.bucket_capacity.max(1),
            entries: 0,
        })
    }

    /// Fibonacci hash of a cell key, reduced to a bucket number.
    #[inline(always)]
    pub fn bucket_of(&self, key: CellKey) -> usize {
        let mixed = (key.cx as u32 as u64).wrapping_mul(2654435761)
            ^ (key.cy as u32 as u64).wrapping_mul(2246822519);
        let h = mixed.wrapping_mul(11400714819323198485) >> 32;
        match self.mask {
            Some(mask) => h as usize & mask,
            None => (h % self.table_size as u64) as usize,
        }
    }

    #[inline(always)]
    pub fn cell_key_of(&self, position: Position) -> CellKey {
        CellKey::new(
            (position.x / self.cell_size).floor() as i32,
            (position.y / self.cell_size).floor() as i32,
        )
    }

    /// Append `index` to the bucket of `key`; returns its position in that bucket.
    pub fn insert(&mut self, key: CellKey, index: u32) -> SpatialResult<u32> {
        let reserve = self.bucket_capacity;
        let h = self.bucket_of(key);
        let bucket = &mut self.buckets[h];
        let position = u32::try_from(bucket.len())
            .map_err(|_| SpatialError::AllocationFailure(format!("bucket {} is full", h)))?;
        if bucket.capacity() == 0 {
            bucket.try_reserve_exact(reserve)?;
        } else {
            bucket.try_reserve(1)?;
        }
        bucket.push(BucketEntry { cell: key, index });
        self.entries += 1;
        Ok(position)
    }

    /// Make room for one more entry per listed cell, so the following inserts
    /// into those cells cannot fail.
    pub fn reserve(&mut self, cells: impl IntoIterator<Item = CellKey>) -> SpatialResult<()> {
        let mut per_bucket: HashMap<usize, usize> = HashMap::new();
        for cell in cells {
            *per_bucket.entry(self.bucket_of(cell)).or_insert(0) += 1;
        }
        for (h, additional) in per_bucket {
            let bucket = &mut self.buckets[h];
            if bucket.capacity() == 0 {
                bucket.try_reserve_exact(additional.max(self.bucket_capacity))?;
            } else {
                bucket.try_reserve(additional)?;
            }
        }
        Ok(())
    }

    /// Swap-pop the entry at `bucket_position` in the bucket of `key`.
    ///
    /// Returns the entry index that moved into `bucket_position`, whose own
    /// bookkeeping the caller must patch.
    pub fn remove_from_bucket(
        &mut self,
        key: CellKey,
        bucket_position: u32,
    ) -> SpatialResult<Option<u32>> {
        let h = self.bucket_of(key);
        let bucket = &mut self.buckets[h];
        let pos = bucket_position as usize;
        if pos >= bucket.len() {
            return Err(SpatialError::OutOfRange {
                index: pos,
                len: bucket.len(),
            });
        }
        debug_assert_eq!(bucket[pos].cell, key, "bucket entry filed under another cell");

        bucket.swap_remove(pos);
        self.entries -= 1;
        Ok(bucket.get(pos).map(|moved| moved.index))
    }

    /// Point the entry at `bucket_position` at a new store index.
    pub fn rewrite(&mut self, key: CellKey, bucket_position: u32, index: u32) -> SpatialResult<()> {
        let h = self.bucket_of(key);
        let bucket = &mut self.buckets[h];
        let len = bucket.len();
        let entry = bucket
            .get_mut(bucket_position as usize)
            .ok_or(SpatialError::OutOfRange {
                index: bucket_position as usize,
                len,
            })?;
        entry.index = index;
        Ok(())
    }

    pub fn entry_at(&self, key: CellKey, bucket_position: u32) -> Option<BucketEntry> {
        self.buckets[self.bucket_of(key)]
            .get(bucket_position as usize)
            .copied()
    }

    /// Smallest cell rectangle bounding the circle at `center` with `radius`.
    pub fn cells_overlapping(&self, center: Position, radius: f32) -> CellSpan {
        CellSpan {
            min: self.cell_key_of(Position::new(center.x - radius, center.y - radius)),
            max: self.cell_key_of(Position::new(center.x + radius, center.y + radius)),
        }
    }

    /// Entry indices filed under exactly `key`.
    pub fn cell_entries(&self, key: CellKey) -> impl Iterator<Item = u32> + '_ {
        self.buckets[self.bucket_of(key)]
            .iter()
            .filter(move |e| e.cell == key)
            .map(|e| e.index)
    }

    /// Calls `callback(index)` once for every entry whose cell lies in `span`.
    ///
    /// Spans wider than the table are answered with one pass over all buckets
    /// instead of one bucket probe per cell.
    pub fn for_each_in_span<F>(&self, span: CellSpan, mut callback: F)
    where
        F: FnMut(u32),
    {
        if span.cell_count() > self.table_size as u64 {
            for entry in self.buckets.iter().flatten() {
                if span.contains(entry.cell) {
                    callback(entry.index);
                }
            }
        } else {
            for cell in span.cells() {
                for index in self.cell_entries(cell) {
                    callback(index);
                }
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    pub fn table_size(&self) -> u32 {
        self.table_size as u32
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    pub fn stats(&self) -> GridStats {
        GridStats {
            table_size: self.table_size as u32,
            cell_size: self.cell_size,
            entries: self.entries,
            occupied_buckets: self.buckets.iter().filter(|b| !b.is_empty()).count(),
            longest_chain: self.buckets.iter().map(Vec::len).max().unwrap_or(0),
        }
    }

    /// Give back the storage of emptied buckets.
    pub fn shrink_to_fit(&mut self) {
        for bucket in self.buckets.iter_mut().filter(|b| b.is_empty()) {
            bucket.shrink_to_fit();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
