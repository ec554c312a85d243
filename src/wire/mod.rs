//! Wire-format primitives: tags, varints, zig-zag, fixed-width integers and
//! length-delimited records.
//!
//! The `consume_*` functions mirror the shape of Go's `encoding/protowire`
//! package: they take a byte slice and return `(value, bytes_consumed)`,
//! which keeps the higher-level unmarshaler a simple loop over advancing
//! slices rather than a stateful cursor object.

mod fixed;
mod tag;
mod varint;

pub use fixed::{append_fixed32, append_fixed64, consume_fixed32, consume_fixed64};
pub use tag::{append_tag, consume_field, consume_tag, size_tag, DEFAULT_RECURSION_LIMIT};
pub use varint::{
    append_varint, consume_varint, size_varint, zigzag32_decode, zigzag32_encode,
    zigzag64_decode, zigzag64_encode,
};

use crate::error::WireError;

/// One of the six wire types carried in the low 3 bits of a tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    Varint = 0,
    Fixed64 = 1,
    Len = 2,
    SGroup = 3,
    EGroup = 4,
    Fixed32 = 5,
}

impl WireType {
    #[inline]
    pub fn from_u8(raw: u8) -> Result<Self, WireError> {
        match raw {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Fixed64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::SGroup),
            4 => Ok(WireType::EGroup),
            5 => Ok(WireType::Fixed32),
            // 6 and 7 are reserved and never assigned a meaning.
            _ => Err(WireError::ReservedWireType),
        }
    }
}

/// Smallest legal protobuf field number.
pub const MIN_FIELD_NUMBER: u32 = 1;
/// Largest legal protobuf field number (29 bits).
pub const MAX_FIELD_NUMBER: u32 = (1 << 29) - 1;
/// Start of the reserved field-number range; never generated, rejected on read by callers
/// that care (the wire layer itself does not refuse to decode them, matching upstream).
pub const RESERVED_FIELD_NUMBER_START: u32 = 19000;
pub const RESERVED_FIELD_NUMBER_END: u32 = 19999;

/// Reads a length-delimited payload: a varint length `L` followed by `L` bytes.
/// Returns the payload slice (aliased into `buf`) and the number of bytes consumed
/// including the length prefix.
pub fn consume_bytes(buf: &[u8]) -> Result<(&[u8], usize), WireError> {
    let (len, n) = consume_varint(buf)?;
    let len = usize::try_from(len).map_err(|_| WireError::Truncated)?;
    let rest = &buf[n..];
    if rest.len() < len {
        return Err(WireError::Truncated);
    }
    Ok((&rest[..len], n + len))
}
