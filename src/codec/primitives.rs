//! Primitive codec - varint and length-prefixed reads/writes.
//!
//! Unsigned integers use LEB128 varint encoding: little-endian groups of
//! 7 bits with the high bit as a continuation marker. Small numbers use
//! fewer bytes (0-127 one byte, 128-16383 two bytes, and so on). Strings
//! and byte slices are varint-length-prefixed. Fixed-width variants write
//! big-endian words for callers that know their values will be large.
//!
//! Writes go to any [`BufMut`] and cannot fail; reads come from any
//! [`Buf`] and enforce the protocol bounds:
//!
//! - string length <= 1 MiB
//! - byte-slice length <= 1 GiB
//! - varint shift <= 63 bits
//!
//! # Example
//!
//! ```
//! use tagwire::codec::primitives::{read_varint, write_varint};
//!
//! let mut buf = Vec::new();
//! write_varint(&mut buf, 300);
//! assert_eq!(buf, [0xAC, 0x02]);
//! assert_eq!(read_varint(&mut &buf[..]).unwrap(), 300);
//! ```

use bytes::{Buf, BufMut};

use crate::error::{Result, WireError};

/// Maximum length of a length-prefixed string (1 MiB).
pub const MAX_STRING_LEN: u64 = 1 << 20;

/// Maximum length of a length-prefixed byte slice (1 GiB).
pub const MAX_BYTES_LEN: u64 = 1 << 30;

fn short_read() -> WireError {
    WireError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "short read",
    ))
}

/// Read a single byte, failing on an exhausted buffer.
pub fn read_u8<B: Buf>(buf: &mut B) -> Result<u8> {
    if !buf.has_remaining() {
        return Err(short_read());
    }
    Ok(buf.get_u8())
}

/// Write an unsigned integer using varint encoding.
pub fn write_varint<B: BufMut>(buf: &mut B, mut v: u64) {
    while v >= 0x80 {
        buf.put_u8(v as u8 | 0x80);
        v >>= 7;
    }
    buf.put_u8(v as u8);
}

/// Read a varint-encoded unsigned integer.
///
/// Fails with [`WireError::VarintOverflow`] when the continuation runs
/// past 63 bits of shift (more than 10 encoded bytes).
pub fn read_varint<B: Buf>(buf: &mut B) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;

    loop {
        let b = read_u8(buf)?;
        if shift >= 64 {
            return Err(WireError::VarintOverflow);
        }
        result |= u64::from(b & 0x7F) << shift;
        if b & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Write a u32 using varint encoding.
pub fn write_u32_varint<B: BufMut>(buf: &mut B, v: u32) {
    write_varint(buf, u64::from(v));
}

/// Read a varint-encoded u32.
pub fn read_u32_varint<B: Buf>(buf: &mut B) -> Result<u32> {
    let v = read_varint(buf)?;
    u32::try_from(v).map_err(|_| WireError::VarintOverflow)
}

/// Write a u64 using varint encoding.
pub fn write_u64_varint<B: BufMut>(buf: &mut B, v: u64) {
    write_varint(buf, v);
}

/// Read a varint-encoded u64.
pub fn read_u64_varint<B: Buf>(buf: &mut B) -> Result<u64> {
    read_varint(buf)
}

/// Write a length-prefixed string (varint length + raw octets).
pub fn write_string<B: BufMut>(buf: &mut B, s: &str) {
    write_varint(buf, s.len() as u64);
    buf.put_slice(s.as_bytes());
}

/// Read a length-prefixed string.
///
/// The octets are not required to be valid UTF-8; invalid sequences are
/// replaced rather than rejected.
pub fn read_string<B: Buf>(buf: &mut B) -> Result<String> {
    let len = read_varint(buf)?;
    if len > MAX_STRING_LEN {
        return Err(WireError::InvalidStringLen);
    }
    if len == 0 {
        return Ok(String::new());
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(short_read());
    }
    let mut b = vec![0u8; len];
    buf.copy_to_slice(&mut b);
    Ok(String::from_utf8_lossy(&b).into_owned())
}

/// Write a length-prefixed byte slice (varint length + raw octets).
pub fn write_bytes<B: BufMut>(buf: &mut B, b: &[u8]) {
    write_varint(buf, b.len() as u64);
    buf.put_slice(b);
}

/// Read a length-prefixed byte slice.
pub fn read_bytes<B: Buf>(buf: &mut B) -> Result<Vec<u8>> {
    let len = read_varint(buf)?;
    if len > MAX_BYTES_LEN {
        return Err(WireError::InvalidBytesLen);
    }
    let len = len as usize;
    if buf.remaining() < len {
        return Err(short_read());
    }
    let mut b = vec![0u8; len];
    buf.copy_to_slice(&mut b);
    Ok(b)
}

/// Write a u32 in big-endian format (always 4 bytes).
pub fn write_u32_fixed<B: BufMut>(buf: &mut B, v: u32) {
    buf.put_u32(v);
}

/// Read a fixed-size big-endian u32.
pub fn read_u32_fixed<B: Buf>(buf: &mut B) -> Result<u32> {
    if buf.remaining() < 4 {
        return Err(short_read());
    }
    Ok(buf.get_u32())
}

/// Write a u64 in big-endian format (always 8 bytes).
pub fn write_u64_fixed<B: BufMut>(buf: &mut B, v: u64) {
    buf.put_u64(v);
}

/// Read a fixed-size big-endian u64.
pub fn read_u64_fixed<B: Buf>(buf: &mut B) -> Result<u64> {
    if buf.remaining() < 8 {
        return Err(short_read());
    }
    Ok(buf.get_u64())
}

/// Write a boolean as a single byte (0 or 1).
pub fn write_bool<B: BufMut>(buf: &mut B, v: bool) {
    buf.put_u8(u8::from(v));
}

/// Read a boolean from a single byte.
pub fn read_bool<B: Buf>(buf: &mut B) -> Result<bool> {
    Ok(read_u8(buf)? == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_single_byte_values() {
        for v in [0u64, 1, 127] {
            let mut buf = Vec::new();
            write_varint(&mut buf, v);
            assert_eq!(buf.len(), 1, "value {v} should encode in one byte");
            assert_eq!(read_varint(&mut &buf[..]).unwrap(), v);
        }
    }

    #[test]
    fn test_varint_boundaries() {
        for v in [128u64, 16383, 16384, 1 << 20, u64::from(u32::MAX), u64::MAX] {
            let mut buf = Vec::new();
            write_varint(&mut buf, v);
            assert_eq!(read_varint(&mut &buf[..]).unwrap(), v);
        }
    }

    #[test]
    fn test_varint_max_encodes_in_ten_bytes() {
        let mut buf = Vec::new();
        write_varint(&mut buf, u64::MAX);
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_varint_overflow() {
        // Eleven continuation bytes push the shift past 63.
        let buf = [0xFFu8; 11];
        let result = read_varint(&mut &buf[..]);
        assert!(matches!(result, Err(WireError::VarintOverflow)));
    }

    #[test]
    fn test_varint_truncated_is_io_error() {
        let buf = [0x80u8]; // continuation bit set, nothing follows
        let result = read_varint(&mut &buf[..]);
        assert!(matches!(result, Err(WireError::Io(_))));
    }

    #[test]
    fn test_u32_varint_rejects_wider_values() {
        let mut buf = Vec::new();
        write_varint(&mut buf, u64::from(u32::MAX) + 1);
        let result = read_u32_varint(&mut &buf[..]);
        assert!(matches!(result, Err(WireError::VarintOverflow)));
    }

    #[test]
    fn test_string_roundtrip() {
        let mut buf = Vec::new();
        write_string(&mut buf, "john.doe@example.com");
        assert_eq!(read_string(&mut &buf[..]).unwrap(), "john.doe@example.com");
    }

    #[test]
    fn test_empty_string() {
        let mut buf = Vec::new();
        write_string(&mut buf, "");
        assert_eq!(buf, [0x00]);
        assert_eq!(read_string(&mut &buf[..]).unwrap(), "");
    }

    #[test]
    fn test_string_length_bound() {
        let mut buf = Vec::new();
        write_varint(&mut buf, MAX_STRING_LEN + 1);
        let result = read_string(&mut &buf[..]);
        assert!(matches!(result, Err(WireError::InvalidStringLen)));
    }

    #[test]
    fn test_string_truncated_body() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 10);
        buf.extend_from_slice(b"abc");
        let result = read_string(&mut &buf[..]);
        assert!(matches!(result, Err(WireError::Io(_))));
    }

    #[test]
    fn test_bytes_roundtrip() {
        let data = vec![0xDE, 0xAD, 0xBE, 0xEF];
        let mut buf = Vec::new();
        write_bytes(&mut buf, &data);
        assert_eq!(read_bytes(&mut &buf[..]).unwrap(), data);
    }

    #[test]
    fn test_empty_bytes() {
        let mut buf = Vec::new();
        write_bytes(&mut buf, &[]);
        assert!(read_bytes(&mut &buf[..]).unwrap().is_empty());
    }

    #[test]
    fn test_bytes_length_bound() {
        let mut buf = Vec::new();
        write_varint(&mut buf, MAX_BYTES_LEN + 1);
        let result = read_bytes(&mut &buf[..]);
        assert!(matches!(result, Err(WireError::InvalidBytesLen)));
    }

    #[test]
    fn test_bool_roundtrip() {
        let mut buf = Vec::new();
        write_bool(&mut buf, true);
        write_bool(&mut buf, false);
        assert_eq!(buf, [0x01, 0x00]);
        let mut r = &buf[..];
        assert!(read_bool(&mut r).unwrap());
        assert!(!read_bool(&mut r).unwrap());
    }

    #[test]
    fn test_fixed_width_roundtrip() {
        let mut buf = Vec::new();
        write_u32_fixed(&mut buf, 0xDEADBEEF);
        write_u64_fixed(&mut buf, 0x0102030405060708);
        assert_eq!(buf.len(), 12);
        // Big-endian byte order on the wire.
        assert_eq!(&buf[..4], [0xDE, 0xAD, 0xBE, 0xEF]);

        let mut r = &buf[..];
        assert_eq!(read_u32_fixed(&mut r).unwrap(), 0xDEADBEEF);
        assert_eq!(read_u64_fixed(&mut r).unwrap(), 0x0102030405060708);
    }

    #[test]
    fn test_fixed_width_short_read() {
        let buf = [0u8; 3];
        assert!(matches!(
            read_u32_fixed(&mut &buf[..]),
            Err(WireError::Io(_))
        ));
        assert!(matches!(
            read_u64_fixed(&mut &buf[..]),
            Err(WireError::Io(_))
        ));
    }

    #[test]
    fn test_mixed_sequence() {
        let mut buf = Vec::new();
        write_string(&mut buf, "user");
        write_bool(&mut buf, true);
        write_u32_varint(&mut buf, 42);
        write_bytes(&mut buf, b"blob");

        let mut r = &buf[..];
        assert_eq!(read_string(&mut r).unwrap(), "user");
        assert!(read_bool(&mut r).unwrap());
        assert_eq!(read_u32_varint(&mut r).unwrap(), 42);
        assert_eq!(read_bytes(&mut r).unwrap(), b"blob");
        assert!(r.is_empty());
    }

    #[test]
    fn test_non_utf8_string_is_not_rejected() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 2);
        buf.extend_from_slice(&[0xFF, 0xFE]);
        // Arbitrary octets decode without an error.
        assert!(read_string(&mut &buf[..]).is_ok());
    }
}
