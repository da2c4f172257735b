//! Varint encoding
//!
//! LEB128 encoding of `u64` values, seven bits per byte, least significant
//! group first.

use crate::stream::{Reader, Writer};

/// Longest encoding of a `u64`.
pub const MAX_VARINT64_LEN: usize = 10;

/// Appends the encoding of `value` to `dest`.
pub fn encode_varint64(mut value: u64, dest: &mut Vec<u8>) {
    while value >= 0x80 {
        dest.push((value as u8) | 0x80);
        value >>= 7;
    }
    dest.push(value as u8);
}

/// Number of bytes `encode_varint64` produces for `value`.
pub fn varint64_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Parses a varint at the start of `src`, returning the value and its
/// encoded length.
pub fn decode_varint64(src: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, &byte) in src.iter().take(MAX_VARINT64_LEN).enumerate() {
        if i == MAX_VARINT64_LEN - 1 && byte > 1 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

pub fn write_varint64<W: Writer + ?Sized>(dest: &mut W, value: u64) -> bool {
    let mut buf = Vec::with_capacity(MAX_VARINT64_LEN);
    encode_varint64(value, &mut buf);
    dest.write(&buf)
}

/// Reads a varint. Returns `None` at end of data or on a malformed
/// encoding; `src.healthy()` tells the two apart from a source failure.
pub fn read_varint64<R: Reader + ?Sized>(src: &mut R) -> Option<u64> {
    // Fast path: the whole encoding is buffered.
    if src.pull(1, MAX_VARINT64_LEN) {
        if let Some((value, length)) = decode_varint64(src.chunk()) {
            src.move_cursor(length);
            return Some(value);
        }
    }
    let mut value = 0u64;
    for i in 0..MAX_VARINT64_LEN {
        let byte = src.read_byte()?;
        if i == MAX_VARINT64_LEN - 1 && byte > 1 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some(value);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::SliceReader;

    #[test]
    fn test_known_encodings() {
        let mut out = Vec::new();
        encode_varint64(300, &mut out);
        assert_eq!(out, [0xac, 0x02]);
        assert_eq!(varint64_len(300), 2);
        assert_eq!(varint64_len(0), 1);
        assert_eq!(varint64_len(u64::MAX), MAX_VARINT64_LEN);
        assert_eq!(decode_varint64(&out), Some((300, 2)));
    }

    #[test]
    fn test_overlong_encoding_is_rejected() {
        let mut bytes = vec![0xff; 9];
        bytes.push(0x02);
        assert_eq!(decode_varint64(&bytes), None);
        assert_eq!(decode_varint64(&[0x80, 0x80]), None);
    }

    #[test]
    fn test_reads_from_stream() {
        let mut bytes = Vec::new();
        for value in [0, 1, 127, 128, u64::MAX] {
            encode_varint64(value, &mut bytes);
        }
        let mut reader = SliceReader::new(bytes);
        for value in [0, 1, 127, 128, u64::MAX] {
            assert_eq!(read_varint64(&mut reader), Some(value));
        }
        assert_eq!(read_varint64(&mut reader), None);
        assert!(reader.healthy());
    }
}
