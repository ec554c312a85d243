use bytes::BufMut;

use crate::error::WireError;

/// Appends `value` to `buf` as a little-endian base-128 varint (1-10 bytes).
#[inline]
pub fn append_varint(buf: &mut impl BufMut, mut value: u64) {
    loop {
        if value < 0x80 {
            buf.put_u8(value as u8);
            return;
        }
        buf.put_u8(((value & 0x7f) | 0x80) as u8);
        value >>= 7;
    }
}

/// Reads a varint from the front of `buf`, returning the decoded value and
/// the number of bytes consumed. Rejects encodings that run past 10 bytes
/// (the most a 64-bit varint can ever need) as malformed.
#[inline]
pub fn consume_varint(buf: &[u8]) -> Result<(u64, usize), WireError> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    for (i, &byte) in buf.iter().enumerate().take(10) {
        if i == 9 && byte & 0x80 != 0 {
            // A 10-byte varint has no room for another continuation bit.
            return Err(WireError::MalformedVarint);
        }
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok((result, i + 1));
        }
        shift += 7;
    }
    if buf.len() < 10 {
        Err(WireError::Truncated)
    } else {
        Err(WireError::MalformedVarint)
    }
}

/// Number of bytes `append_varint` would write for `value`.
///
/// Computed the same way the reference C++ implementation does: one more
/// than `(bitlen - 1) / 7` for a nonzero value, 1 for zero.
#[inline]
pub fn size_varint(value: u64) -> usize {
    // `value | 1` avoids a zero-check branch: leading_zeros(1) == 63, which
    // collapses to the same answer (1 byte) as the explicit zero case.
    (((value | 1).leading_zeros() ^ 63) as usize * 9 + 73) / 64
}

#[inline]
pub fn zigzag32_encode(n: i32) -> u32 {
    ((n << 1) ^ (n >> 31)) as u32
}

#[inline]
pub fn zigzag32_decode(n: u32) -> i32 {
    ((n >> 1) as i32) ^ -((n & 1) as i32)
}

#[inline]
pub fn zigzag64_encode(n: i64) -> u64 {
    ((n << 1) ^ (n >> 63)) as u64
}

#[inline]
pub fn zigzag64_decode(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    fn round_trip(value: u64) {
        let mut buf = BytesMut::new();
        append_varint(&mut buf, value);
        let (decoded, n) = consume_varint(&buf).unwrap();
        assert_eq!(decoded, value);
        assert_eq!(n, buf.len());
        assert_eq!(n, size_varint(value));
    }

    #[test]
    fn round_trips_boundaries() {
        for shift in 0..64 {
            round_trip(1u64 << shift);
        }
        round_trip(0);
        round_trip(u64::MAX);
    }

    #[test]
    fn size_varint_matches_reference() {
        assert_eq!(size_varint(0), 1);
        assert_eq!(size_varint(0x7f), 1);
        assert_eq!(size_varint(0x80), 2);
        assert_eq!(size_varint(1 << 14), 3);
        assert_eq!(size_varint(u64::MAX), 10);
    }

    #[test]
    fn rejects_overlong_encoding() {
        let overlong = [0xffu8; 10];
        assert!(matches!(
            consume_varint(&overlong),
            Err(WireError::MalformedVarint)
        ));
    }

    #[test]
    fn rejects_truncated_input() {
        let truncated = [0x80u8, 0x80];
        assert!(matches!(
            consume_varint(&truncated),
            Err(WireError::Truncated)
        ));
    }

    #[test]
    fn zigzag_round_trips() {
        for n in [0i32, -1, 1, i32::MIN, i32::MAX] {
            assert_eq!(zigzag32_decode(zigzag32_encode(n)), n);
        }
        for n in [0i64, -1, 1, i64::MIN, i64::MAX] {
            assert_eq!(zigzag64_decode(zigzag64_encode(n)), n);
        }
    }

    #[test]
    fn scalar_basic_example() {
        // optional int32 x = 1; message { x = 150 } <-> wire `08 96 01`
        let mut buf = BytesMut::new();
        append_varint(&mut buf, 150);
        assert_eq!(&buf[..], &[0x96, 0x01]);
    }
}
