use bytes::BufMut;

use crate::error::WireError;
use crate::wire::{consume_varint, size_varint, WireType};

/// Default recursion budget used by [`consume_field`] when the caller has no
/// sharper limit of its own (the unmarshaler normally threads its own
/// `recursion_limit` option through instead of relying on this default).
pub const DEFAULT_RECURSION_LIMIT: u32 = 100;

#[inline]
pub fn append_tag(buf: &mut impl BufMut, number: u32, wire_type: WireType) {
    append_varint_tag(buf, ((number as u64) << 3) | wire_type as u64);
}

#[inline]
fn append_varint_tag(buf: &mut impl BufMut, tag: u64) {
    crate::wire::append_varint(buf, tag);
}

#[inline]
pub fn size_tag(number: u32) -> usize {
    size_varint((number as u64) << 3)
}

/// Reads a tag, returning the field number, wire type, and bytes consumed.
/// Rejects wire types 6/7 and a field number of zero.
#[inline]
pub fn consume_tag(buf: &[u8]) -> Result<((u32, WireType), usize), WireError> {
    let (raw, n) = consume_varint(buf)?;
    let number = u32::try_from(raw >> 3).map_err(|_| WireError::MalformedVarint)?;
    if number == 0 {
        return Err(WireError::MalformedVarint);
    }
    let wire_type = WireType::from_u8((raw & 0x7) as u8)?;
    Ok(((number, wire_type), n))
}

/// Advances past an entire wire record (tag + payload), including recursing
/// through a `SGROUP .. EGROUP` pair whose field numbers must match.
/// Returns `(field_number, wire_type, total_bytes_consumed)`.
pub fn consume_field(
    buf: &[u8],
    recursion_limit: u32,
) -> Result<(u32, WireType, usize), WireError> {
    let ((number, wire_type), tag_n) = consume_tag(buf)?;
    let body_n = skip_body(&buf[tag_n..], number, wire_type, recursion_limit)?;
    Ok((number, wire_type, tag_n + body_n))
}

fn skip_body(
    buf: &[u8],
    number: u32,
    wire_type: WireType,
    recursion_limit: u32,
) -> Result<usize, WireError> {
    match wire_type {
        WireType::Varint => consume_varint(buf).map(|(_, n)| n),
        WireType::Fixed64 => {
            if buf.len() < 8 {
                Err(WireError::Truncated)
            } else {
                Ok(8)
            }
        }
        WireType::Fixed32 => {
            if buf.len() < 4 {
                Err(WireError::Truncated)
            } else {
                Ok(4)
            }
        }
        WireType::Len => {
            let (len, n) = consume_varint(buf)?;
            let len = usize::try_from(len).map_err(|_| WireError::Truncated)?;
            if buf.len() - n < len {
                Err(WireError::Truncated)
            } else {
                Ok(n + len)
            }
        }
        WireType::SGroup => {
            if recursion_limit == 0 {
                return Err(WireError::RecursionLimit);
            }
            let mut pos = 0usize;
            loop {
                let ((inner_number, inner_wire_type), tag_n) = consume_tag(&buf[pos..])?;
                pos += tag_n;
                if inner_wire_type == WireType::EGroup {
                    if inner_number != number {
                        return Err(WireError::GroupMismatch);
                    }
                    return Ok(pos);
                }
                pos += skip_body(&buf[pos..], inner_number, inner_wire_type, recursion_limit - 1)?;
            }
        }
        WireType::EGroup => Err(WireError::GroupMismatch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn tag_round_trips() {
        let mut buf = BytesMut::new();
        append_tag(&mut buf, 1, WireType::Varint);
        let ((number, wire_type), n) = consume_tag(&buf).unwrap();
        assert_eq!(number, 1);
        assert_eq!(wire_type, WireType::Varint);
        assert_eq!(n, buf.len());
    }

    #[test]
    fn rejects_field_number_zero() {
        // tag = (0 << 3) | 0
        assert!(matches!(consume_tag(&[0x00]), Err(WireError::MalformedVarint)));
    }

    #[test]
    fn rejects_reserved_wire_type() {
        // field 1, wire type 6 (reserved)
        let tag = (1u64 << 3) | 6;
        let mut buf = BytesMut::new();
        crate::wire::append_varint(&mut buf, tag);
        assert!(matches!(consume_tag(&buf), Err(WireError::ReservedWireType)));
    }

    #[test]
    fn consume_field_skips_group() {
        // group: `optional group G = 3 { optional int32 x = 1; }`
        // message { G = {x=7} } <-> wire `1B 08 07 1C`
        let wire = [0x1b, 0x08, 0x07, 0x1c];
        let (number, wire_type, n) = consume_field(&wire, DEFAULT_RECURSION_LIMIT).unwrap();
        assert_eq!(number, 3);
        assert_eq!(wire_type, WireType::SGroup);
        assert_eq!(n, wire.len());
    }

    #[test]
    fn consume_field_mismatched_group_fails() {
        // SGROUP field 3, but EGROUP claims field 4.
        let wire = [0x1b, 0x08, 0x07, 0x24];
        assert!(matches!(
            consume_field(&wire, DEFAULT_RECURSION_LIMIT),
            Err(WireError::GroupMismatch)
        ));
    }
}
