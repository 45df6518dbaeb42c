//! Native Boundary
//!
//! `extern "C"` entry points over a process-wide registry of engines. Handles are
//! non-zero `u32` values; `0` is the null handle returned when `Start` fails.
//! Stopped engines stay registered so that later calls on their handle report
//! `InvalidState` instead of looking like an unknown handle, and a registered
//! handle is never issued twice.
//!
//! Every call other than `Start` reports failure to the caller: status-returning
//! calls return `0` on success and [`SpatialError::status_code`] otherwise, and
//! `Query` carries the same code in [`QueryResultSet::status`]. Results go out
//! through caller pointers only on success.
#![allow(non_snake_case)]

pub mod wire;

use std::collections::HashMap;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};
use tracing::warn;

use crate::core::config::HashConfig;
use crate::core::error::{SpatialError, SpatialResult};
use crate::spatial::{EngineStatus, Entity, Position, QueryResultItem, SpatialEngine};
use wire::{RawEntity, RawPosition, RawQueryItem};

pub const STATUS_OK: u32 = 0;

/// Engine-owned query results. Release with [`ReleaseQueryResult`].
///
/// `count` and `items` keep the layout of the observed result set; `status`
/// follows them. A failed query has `status != 0`, `count == 0` and null `items`;
/// a query with no hits has `status == 0` and the same empty payload.
#[repr(C)]
#[derive(Debug)]
pub struct QueryResultSet {
    pub count: u32,
    pub items: *mut RawQueryItem,
    pub status: u32,
}

impl QueryResultSet {
    fn empty(status: u32) -> Self {
        QueryResultSet {
            count: 0,
            items: ptr::null_mut(),
            status,
        }
    }

    fn from_items(items: &[QueryResultItem]) -> Self {
        if items.is_empty() {
            return Self::empty(STATUS_OK);
        }
        let boxed: Box<[RawQueryItem]> = items
            .iter()
            .map(|item| RawQueryItem::from(item).to_le())
            .collect();
        let count = boxed.len() as u32;
        QueryResultSet {
            count,
            items: Box::into_raw(boxed) as *mut RawQueryItem,
            status: STATUS_OK,
        }
    }
}

// ── Registry ────────────────────────────────────────────────────────────────

type SharedEngine = Arc<Mutex<SpatialEngine>>;

struct Registry {
    next: AtomicU32,
    engines: RwLock<HashMap<u32, SharedEngine>>,
}

impl Registry {
    fn new(first: u32) -> Self {
        Registry {
            next: AtomicU32::new(first),
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// File `engine` under the next free non-zero handle. The counter wraps;
    /// handles still in the map, tombstones included, are skipped.
    fn register(&self, engine: SpatialEngine) -> Option<u32> {
        let mut engines = self.engines.write();
        // len + 2 consecutive candidates always hold a free non-zero handle
        let attempts = engines.len().saturating_add(2);
        for _ in 0..attempts {
            let handle = self.next.fetch_add(1, Ordering::Relaxed);
            if handle != 0 && !engines.contains_key(&handle) {
                engines.insert(handle, Arc::new(Mutex::new(engine)));
                return Some(handle);
            }
        }
        None
    }

    fn lookup(&self, handle: u32, operation: &'static str) -> SpatialResult<SharedEngine> {
        self.engines
            .read()
            .get(&handle)
            .cloned()
            .ok_or(SpatialError::InvalidState {
                operation,
                status: EngineStatus::Unbuilt,
            })
    }
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry::new(1))
}

/// Run `f` against the engine behind `handle`. The registry lock is released
/// before `f` runs, so distinct handles never contend.
fn with_engine<R>(
    handle: u32,
    operation: &'static str,
    f: impl FnOnce(&mut SpatialEngine) -> SpatialResult<R>,
) -> SpatialResult<R> {
    let engine = registry().lookup(handle, operation)?;
    let mut guard = engine.lock();
    f(&mut guard)
}

fn status(operation: &str, handle: u32, result: SpatialResult<()>) -> u32 {
    match result {
        Ok(()) => STATUS_OK,
        Err(e) => {
            warn!("[SpatialHash] {} on handle {} rejected: {}", operation, handle, e);
            e.status_code()
        }
    }
}

fn non_null<T>(ptr: *const T, what: &str) -> SpatialResult<()> {
    if ptr.is_null() {
        Err(SpatialError::invalid(format!("null {} pointer", what)))
    } else {
        Ok(())
    }
}

/// Decode `count` little-endian caller records from a possibly unaligned buffer.
unsafe fn read_entities(count: u32, entries: *const RawEntity) -> SpatialResult<Vec<Entity>> {
    if count == 0 {
        return Ok(Vec::new());
    }
    non_null(entries, "entry buffer")?;
    let len = (count as usize)
        .checked_mul(wire::ENTITY_SIZE)
        .ok_or_else(|| SpatialError::invalid("entry count overflows the address space"))?;
    let bytes = unsafe { std::slice::from_raw_parts(entries as *const u8, len) };
    Ok(wire::decode_entities(bytes)?
        .into_iter()
        .map(Entity::from)
        .collect())
}

/// Copy encoded records to a caller buffer with room for them.
unsafe fn write_bytes<T>(bytes: &[u8], out: *mut T) {
    if bytes.is_empty() {
        return;
    }
    unsafe { ptr::copy_nonoverlapping(bytes.as_ptr(), out as *mut u8, bytes.len()) };
}

// ── Build / teardown ────────────────────────────────────────────────────────

/// Build an engine with the default cell size.
///
/// # Safety
/// `entries` must point to `count` readable 20-byte records, or be null when
/// `count` is 0.
#[no_mangle]
pub unsafe extern "C" fn Start(count: u32, entries: *const RawEntity, table_size: u32) -> u32 {
    let cell_size = HashConfig::default().cell_size;
    unsafe { StartWithCellSize(count, entries, table_size, cell_size) }
}

/// # Safety
/// Same contract as [`Start`].
#[no_mangle]
pub unsafe extern "C" fn StartWithCellSize(
    count: u32,
    entries: *const RawEntity,
    table_size: u32,
    cell_size: f32,
) -> u32 {
    let built = unsafe { read_entities(count, entries) }.and_then(|entities| {
        SpatialEngine::build(&entities, HashConfig::new(table_size, cell_size))
    });
    match built {
        Ok(engine) => registry().register(engine).unwrap_or_else(|| {
            warn!("[SpatialHash] Start rejected: no free handle");
            0
        }),
        Err(e) => {
            warn!("[SpatialHash] Start rejected: {}", e);
            0
        }
    }
}

#[no_mangle]
pub extern "C" fn Stop(handle: u32) -> u32 {
    status("Stop", handle, with_engine(handle, "stop", |engine| engine.stop()))
}

// ── Mutation ────────────────────────────────────────────────────────────────

#[no_mangle]
pub extern "C" fn Update(count: u32, handle: u32) -> u32 {
    let result = with_engine(handle, "update", |engine| {
        engine.update(count as usize).map(|_| ())
    });
    status("Update", handle, result)
}

#[no_mangle]
pub extern "C" fn SetPosition(index: u32, position: RawPosition, handle: u32) -> u32 {
    let result = with_engine(handle, "set_position", |engine| {
        engine.set_position(index as usize, Position::from(position))
    });
    status("SetPosition", handle, result)
}

/// Publish positions the caller changed in its own entry buffer.
///
/// # Safety
/// `entries` must point to `count` readable 20-byte records, or be null when
/// `count` is 0.
#[no_mangle]
pub unsafe extern "C" fn SyncPositions(count: u32, entries: *const RawEntity, handle: u32) -> u32 {
    let result = unsafe { read_entities(count, entries) }.and_then(|entities| {
        let positions: Vec<Position> = entities.iter().map(|e| e.position).collect();
        with_engine(handle, "sync_positions", |engine| {
            engine.sync_positions(&positions)
        })
    });
    status("SyncPositions", handle, result)
}

#[no_mangle]
pub extern "C" fn Remove(index: u32, handle: u32) -> u32 {
    let result = with_engine(handle, "remove", |engine| {
        engine.remove(index as usize).map(|_| ())
    });
    status("Remove", handle, result)
}

// ── Queries ─────────────────────────────────────────────────────────────────

/// Nearest entities first. Check [`QueryResultSet::status`] before reading.
#[no_mangle]
pub extern "C" fn Query(
    position: RawPosition,
    radius: f32,
    max_results: u32,
    handle: u32,
) -> QueryResultSet {
    let result = with_engine(handle, "query", |engine| {
        engine.query(Position::from(position), radius, max_results as usize)
    });
    match result {
        Ok(items) => QueryResultSet::from_items(&items),
        Err(e) => {
            warn!("[SpatialHash] Query on handle {} rejected: {}", handle, e);
            QueryResultSet::empty(e.status_code())
        }
    }
}

#[no_mangle]
pub extern "C" fn ExtGetCloseEntries(
    position: RawPosition,
    radius: f32,
    max_results: u32,
    handle: u32,
) -> QueryResultSet {
    Query(position, radius, max_results, handle)
}

/// Query into a caller-owned buffer. `written` receives the hit count.
///
/// # Safety
/// `out` must have room for `max_results` 16-byte records (it may be null when
/// `max_results` is 0). `written` must point to a writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn QueryInto(
    position: RawPosition,
    radius: f32,
    max_results: u32,
    handle: u32,
    out: *mut RawQueryItem,
    written: *mut u32,
) -> u32 {
    let result = non_null(written, "written")
        .and_then(|_| match max_results {
            0 => Ok(()),
            _ => non_null(out, "output buffer"),
        })
        .and_then(|_| {
            with_engine(handle, "query", |engine| {
                engine.query(Position::from(position), radius, max_results as usize)
            })
        })
        .map(|items| unsafe {
            write_bytes(&wire::encode_query_items(&items), out);
            written.write_unaligned(items.len() as u32);
        });
    status("QueryInto", handle, result)
}

/// Free a set returned by [`Query`]. Releasing an empty set is a no-op.
///
/// # Safety
/// `set` must come from [`Query`] or [`ExtGetCloseEntries`] and must not be
/// released twice.
#[no_mangle]
pub unsafe extern "C" fn ReleaseQueryResult(set: QueryResultSet) {
    if set.items.is_null() {
        return;
    }
    let slice = ptr::slice_from_raw_parts_mut(set.items, set.count as usize);
    drop(unsafe { Box::from_raw(slice) });
}

// ── Inspection ──────────────────────────────────────────────────────────────

/// Copy up to `capacity` live entries, in index order, into `out`, and the number
/// copied into `written`. The reserved words carry each entry's bucket position
/// and bucket.
///
/// # Safety
/// `out` must have room for `capacity` 20-byte records (it may be null when
/// `capacity` is 0). `written` must point to a writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn ReadEntries(
    handle: u32,
    out: *mut RawEntity,
    capacity: u32,
    written: *mut u32,
) -> u32 {
    let result = non_null(written, "written")
        .and_then(|_| match capacity {
            0 => Ok(()),
            _ => non_null(out, "output buffer"),
        })
        .and_then(|_| {
            with_engine(handle, "read_entries", |engine| {
                let entities = engine.entities()?;
                entities
                    .into_iter()
                    .take(capacity as usize)
                    .enumerate()
                    .map(|(index, entity)| -> SpatialResult<RawEntity> {
                        Ok(RawEntity::with_placement(entity, engine.placement(index)?))
                    })
                    .collect::<SpatialResult<Vec<RawEntity>>>()
            })
        })
        .map(|raws| unsafe {
            write_bytes(&wire::encode_entities(&raws), out);
            written.write_unaligned(raws.len() as u32);
        });
    status("ReadEntries", handle, result)
}

/// Live entry count into `count`.
///
/// # Safety
/// `count` must point to a writable `u32`.
#[no_mangle]
pub unsafe extern "C" fn EntryCount(handle: u32, count: *mut u32) -> u32 {
    let result = non_null(count, "count")
        .and_then(|_| with_engine(handle, "len", |engine| engine.len()))
        .map(|len| unsafe { count.write_unaligned(len as u32) });
    status("EntryCount", handle, result)
}

#[no_mangle]
pub extern "C" fn ExtGetEnteredSize() -> u32 {
    wire::ENTITY_SIZE as u32
}

#[no_mangle]
pub extern "C" fn InitLogging() {
    crate::setup_logging(None);
}
