//! This module provides a set of shared, low-level utility functions used
//! throughout the fieldpack core.
//!
//! Its primary responsibilities include:
//! 1.  Reading big-endian primitives from a `Cursor<&[u8]>`, failing with a
//!     `CorruptStream` error instead of panicking on truncated input.
//! 2.  Appending big-endian primitives to an output `Vec<u8>`.

use std::io::Cursor;

use crate::error::FieldPackError;

//==================================================================================
// 1. Read Helpers
//==================================================================================

/// Takes exactly `len` bytes from the cursor, advancing it.
pub fn read_bytes<'a>(
    cursor: &mut Cursor<&'a [u8]>,
    len: usize,
    what: &str,
) -> Result<&'a [u8], FieldPackError> {
    let buf: &'a [u8] = cursor.get_ref();
    let start = cursor.position() as usize;
    let end = start
        .checked_add(len)
        .filter(|&end| end <= buf.len())
        .ok_or_else(|| FieldPackError::truncated(what))?;
    cursor.set_position(end as u64);
    Ok(&buf[start..end])
}

fn read_array<const N: usize>(
    cursor: &mut Cursor<&[u8]>,
    what: &str,
) -> Result<[u8; N], FieldPackError> {
    let bytes = read_bytes(cursor, N, what)?;
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

pub fn read_u8(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u8, FieldPackError> {
    Ok(read_array::<1>(cursor, what)?[0])
}

pub fn read_i16(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<i16, FieldPackError> {
    Ok(i16::from_be_bytes(read_array(cursor, what)?))
}

pub fn read_u16(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u16, FieldPackError> {
    Ok(u16::from_be_bytes(read_array(cursor, what)?))
}

pub fn read_i32(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<i32, FieldPackError> {
    Ok(i32::from_be_bytes(read_array(cursor, what)?))
}

pub fn read_i64(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<i64, FieldPackError> {
    Ok(i64::from_be_bytes(read_array(cursor, what)?))
}

pub fn read_f32(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<f32, FieldPackError> {
    Ok(f32::from_be_bytes(read_array(cursor, what)?))
}

pub fn read_f64(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<f64, FieldPackError> {
    Ok(f64::from_be_bytes(read_array(cursor, what)?))
}

/// Reads a signed 32-bit length field and checks it is usable as a count.
pub fn read_len(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<usize, FieldPackError> {
    let raw = read_i32(cursor, what)?;
    usize::try_from(raw)
        .map_err(|_| FieldPackError::CorruptStream(format!("negative {} ({})", what, raw)))
}

/// Returns the bytes not yet consumed by the cursor.
pub fn remaining_slice<'a>(cursor: &Cursor<&'a [u8]>) -> &'a [u8] {
    let buf: &'a [u8] = cursor.get_ref();
    let pos = (cursor.position() as usize).min(buf.len());
    &buf[pos..]
}

//==================================================================================
// 2. Write Helpers
//==================================================================================

pub fn write_i32(output_buf: &mut Vec<u8>, value: i32) {
    output_buf.extend_from_slice(&value.to_be_bytes());
}

/// Writes a length as a signed 32-bit field, rejecting lengths past `i32::MAX`.
pub fn write_len(output_buf: &mut Vec<u8>, len: usize) -> Result<(), FieldPackError> {
    let value = i32::try_from(len).map_err(|_| FieldPackError::ArrayTooLong {
        len,
        max: i32::MAX as usize,
    })?;
    write_i32(output_buf, value);
    Ok(())
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_helpers_are_big_endian() {
        let bytes = [0x00, 0x00, 0x01, 0x02, 0xFF, 0xFE, 0x07];
        let mut cursor = Cursor::new(&bytes[..]);
        assert_eq!(read_i32(&mut cursor, "int").unwrap(), 0x0102);
        assert_eq!(read_i16(&mut cursor, "short").unwrap(), -2);
        assert_eq!(read_u8(&mut cursor, "byte").unwrap(), 7);
        assert!(remaining_slice(&cursor).is_empty());
    }

    #[test]
    fn test_truncated_read_is_corrupt_stream() {
        let bytes = [0x00, 0x01];
        let mut cursor = Cursor::new(&bytes[..]);
        let err = read_i32(&mut cursor, "count").unwrap_err();
        assert!(matches!(err, FieldPackError::CorruptStream(_)));
        assert!(err.to_string().contains("count"));
        // A failed read does not advance the cursor.
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn test_negative_length_rejected() {
        let mut buf = Vec::new();
        write_i32(&mut buf, -5);
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(
            read_len(&mut cursor, "length"),
            Err(FieldPackError::CorruptStream(_))
        ));
    }
}
