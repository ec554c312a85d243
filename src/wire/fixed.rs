use bytes::BufMut;

use crate::error::WireError;

#[inline]
pub fn append_fixed32(buf: &mut impl BufMut, value: u32) {
    buf.put_u32_le(value);
}

#[inline]
pub fn append_fixed64(buf: &mut impl BufMut, value: u64) {
    buf.put_u64_le(value);
}

#[inline]
pub fn consume_fixed32(buf: &[u8]) -> Result<(u32, usize), WireError> {
    if buf.len() < 4 {
        return Err(WireError::Truncated);
    }
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[..4]);
    Ok((u32::from_le_bytes(bytes), 4))
}

#[inline]
pub fn consume_fixed64(buf: &[u8]) -> Result<(u64, usize), WireError> {
    if buf.len() < 8 {
        return Err(WireError::Truncated);
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[..8]);
    Ok((u64::from_le_bytes(bytes), 8))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn fixed32_round_trips() {
        let mut buf = BytesMut::new();
        append_fixed32(&mut buf, 0xdead_beef);
        let (v, n) = consume_fixed32(&buf).unwrap();
        assert_eq!(v, 0xdead_beef);
        assert_eq!(n, 4);
    }

    #[test]
    fn fixed64_round_trips() {
        let mut buf = BytesMut::new();
        append_fixed64(&mut buf, 0x0123_4567_89ab_cdef);
        let (v, n) = consume_fixed64(&buf).unwrap();
        assert_eq!(v, 0x0123_4567_89ab_cdef);
        assert_eq!(n, 8);
    }

    #[test]
    fn fixed32_truncated() {
        assert!(matches!(consume_fixed32(&[1, 2]), Err(WireError::Truncated)));
    }
}
