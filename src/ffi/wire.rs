//! Fixed-layout records exchanged across the native boundary.
//!
//! | Record          | Layout                                 | Size |
//! |-----------------|----------------------------------------|------|
//! | `RawPosition`   | `f32 x, f32 y`                         | 8 B  |
//! | `RawEntity`     | `u32 id, f32 x, f32 y, u32 a, u32 b`   | 20 B |
//! | `RawQueryItem`  | `u32 id, f32 x, f32 y, f32 distance`   | 16 B |
//!
//! The records are `#[repr(C)]` with no padding, so pointers to them can cross
//! the C ABI directly. The byte codec below always speaks little-endian, and
//! every entry point in [`crate::ffi`] reads and writes caller buffers through it.

use bytemuck::{Pod, Zeroable};

use crate::core::error::{SpatialError, SpatialResult};
use crate::spatial::{Entity, Placement, Position, QueryResultItem};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RawPosition {
    pub x: f32,
    pub y: f32,
}

/// Input record. On input the reserved words are ignored; on export they hold
/// the bucket position and the bucket number of the entry.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RawEntity {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub reserved_a: u32,
    pub reserved_b: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct RawQueryItem {
    pub id: u32,
    pub x: f32,
    pub y: f32,
    pub distance: f32,
}

pub const POSITION_SIZE: usize = 8;
pub const ENTITY_SIZE: usize = 20;
pub const QUERY_ITEM_SIZE: usize = 16;

const _: () = assert!(std::mem::size_of::<RawPosition>() == POSITION_SIZE);
const _: () = assert!(std::mem::size_of::<RawEntity>() == ENTITY_SIZE);
const _: () = assert!(std::mem::size_of::<RawQueryItem>() == QUERY_ITEM_SIZE);

// Converting to and from little-endian is the same swap (a no-op on LE hosts).
#[inline]
fn le_u32(v: u32) -> u32 {
    v.to_le()
}

#[inline]
fn le_f32(v: f32) -> f32 {
    f32::from_bits(v.to_bits().to_le())
}

impl RawEntity {
    pub fn with_placement(entity: Entity, placement: Placement) -> Self {
        RawEntity {
            reserved_a: placement.bucket_position,
            reserved_b: placement.bucket,
            ..RawEntity::from(entity)
        }
    }

    pub(crate) fn to_le(self) -> Self {
        RawEntity {
            id: le_u32(self.id),
            x: le_f32(self.x),
            y: le_f32(self.y),
            reserved_a: le_u32(self.reserved_a),
            reserved_b: le_u32(self.reserved_b),
        }
    }
}

impl RawQueryItem {
    pub(crate) fn to_le(self) -> Self {
        RawQueryItem {
            id: le_u32(self.id),
            x: le_f32(self.x),
            y: le_f32(self.y),
            distance: le_f32(self.distance),
        }
    }
}

impl From<RawPosition> for Position {
    fn from(raw: RawPosition) -> Self {
        Position::new(raw.x, raw.y)
    }
}

impl From<RawEntity> for Entity {
    fn from(raw: RawEntity) -> Self {
        Entity::new(raw.id, raw.x, raw.y)
    }
}

impl From<Entity> for RawEntity {
    fn from(entity: Entity) -> Self {
        RawEntity {
            id: entity.id,
            x: entity.position.x,
            y: entity.position.y,
            reserved_a: 0,
            reserved_b: 0,
        }
    }
}

impl From<&QueryResultItem> for RawQueryItem {
    fn from(item: &QueryResultItem) -> Self {
        RawQueryItem {
            id: item.entity.id,
            x: item.entity.position.x,
            y: item.entity.position.y,
            distance: item.distance,
        }
    }
}

/// Read host-order records from a possibly unaligned byte buffer.
fn read_native<T: Pod>(bytes: &[u8], size: usize) -> Vec<T> {
    bytes
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned::<T>)
        .collect()
}

fn check_len(bytes: &[u8], size: usize, what: &str) -> SpatialResult<()> {
    if bytes.len() % size != 0 {
        return Err(SpatialError::invalid(format!(
            "{} bytes is not a whole number of {}-byte {} records",
            bytes.len(),
            size,
            what
        )));
    }
    Ok(())
}

pub fn decode_entities(bytes: &[u8]) -> SpatialResult<Vec<RawEntity>> {
    check_len(bytes, ENTITY_SIZE, "entity")?;
    Ok(read_native::<RawEntity>(bytes, ENTITY_SIZE)
        .into_iter()
        .map(RawEntity::to_le)
        .collect())
}

pub fn encode_entities(entities: &[RawEntity]) -> Vec<u8> {
    let le: Vec<RawEntity> = entities.iter().map(|e| e.to_le()).collect();
    bytemuck::cast_slice(le.as_slice()).to_vec()
}

pub fn decode_query_items(bytes: &[u8]) -> SpatialResult<Vec<RawQueryItem>> {
    check_len(bytes, QUERY_ITEM_SIZE, "query item")?;
    Ok(read_native::<RawQueryItem>(bytes, QUERY_ITEM_SIZE)
        .into_iter()
        .map(RawQueryItem::to_le)
        .collect())
}

pub fn encode_query_items(items: &[QueryResultItem]) -> Vec<u8> {
    let le: Vec<RawQueryItem> = items.iter().map(|i| RawQueryItem::from(i).to_le()).collect();
    bytemuck::cast_slice(le.as_slice()).to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::CellKey;

    #[test]
    fn entity_bytes_are_little_endian() {
        let raw = RawEntity {
            id: 1,
            x: 1.0,
            y: -2.0,
            reserved_a: 100110,
            reserved_b: 7999,
        };
        let bytes = encode_entities(&[raw]);
        assert_eq!(bytes.len(), ENTITY_SIZE);
        assert_eq!(&bytes[0..4], &[1, 0, 0, 0]);
        assert_eq!(&bytes[4..8], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[8..12], &(-2.0f32).to_le_bytes());
        assert_eq!(&bytes[12..16], &100110u32.to_le_bytes());
        assert_eq!(&bytes[16..20], &7999u32.to_le_bytes());

        assert_eq!(decode_entities(&bytes).unwrap(), vec![raw]);
    }

    #[test]
    fn reserved_words_are_ignored_on_input() {
        let raw = RawEntity {
            id: 9,
            x: 3.0,
            y: 4.0,
            reserved_a: 100110,
            reserved_b: 7999,
        };
        assert_eq!(Entity::from(raw), Entity::new(9, 3.0, 4.0));
    }

    #[test]
    fn truncated_buffers_are_rejected() {
        assert!(decode_entities(&[0u8; 21]).is_err());
        assert!(decode_query_items(&[0u8; 15]).is_err());
        assert!(decode_entities(&[]).unwrap().is_empty());
    }

    #[test]
    fn query_items_encode_distance_last() {
        let item = QueryResultItem {
            entity: Entity::new(2, 505.0, 505.0),
            distance: 7.071_068,
        };
        let bytes = encode_query_items(&[item]);
        assert_eq!(bytes.len(), QUERY_ITEM_SIZE);
        assert_eq!(&bytes[12..16], &7.071_068f32.to_le_bytes());

        let decoded = decode_query_items(&bytes).unwrap();
        assert_eq!(decoded[0].id, 2);
        assert_eq!(decoded[0].distance, 7.071_068);
    }

    #[test]
    fn placement_fills_reserved_words() {
        let placement = Placement {
            cell: CellKey::new(50, 50),
            bucket: 5,
            bucket_position: 2,
        };
        let raw = RawEntity::with_placement(Entity::new(4, 1.0, 2.0), placement);
        assert_eq!((raw.id, raw.reserved_a, raw.reserved_b), (4, 2, 5));
    }
}
