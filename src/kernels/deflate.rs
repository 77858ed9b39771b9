//! This module contains the kernels that wrap a packed byte block in a zlib
//! (DEFLATE) stream.
//!
//! It is the default backend of the wrapped quantized float record. The record
//! header already carries the uncompressed length, so these kernels do not add
//! a length prefix of their own; `decode` checks the inflated size against the
//! length the caller read from the header.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::FieldPackError;

//==================================================================================
// 1. Public API
//==================================================================================

/// Deflates `input_bytes` at `level` (0-9) into a zlib stream.
pub fn encode(input_bytes: &[u8], level: u32) -> Result<Vec<u8>, FieldPackError> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(input_bytes.len() / 2 + 16),
        Compression::new(level.min(9)),
    );
    encoder.write_all(input_bytes)?;
    // `finish` is essential to flush the final block and the adler32 trailer.
    Ok(encoder.finish()?)
}

/// Inflates a zlib stream, which must expand to exactly `expected_len` bytes.
pub fn decode(input_bytes: &[u8], expected_len: usize) -> Result<Vec<u8>, FieldPackError> {
    let mut decoder = ZlibDecoder::new(input_bytes);
    let mut output_buf = Vec::with_capacity(expected_len);
    // Read one byte past the expected size so oversized streams are caught
    // without inflating all of them.
    decoder
        .by_ref()
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output_buf)?;

    if output_buf.len() != expected_len {
        return Err(FieldPackError::CorruptStream(format!(
            "inflated size does not match header: expected {} bytes, stream holds {}",
            expected_len,
            if output_buf.len() > expected_len {
                "more".to_string()
            } else {
                output_buf.len().to_string()
            }
        )));
    }
    Ok(output_buf)
}

//==================================================================================
// 2. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deflate_roundtrip_simple_text() {
        let original_bytes =
            b"packed coordinates, packed coordinates, packed coordinates, packed normals".to_vec();
        let compressed_bytes = encode(&original_bytes, 9).unwrap();
        assert!(compressed_bytes.len() < original_bytes.len());
        // zlib header: deflate method, 32K window
        assert_eq!(compressed_bytes[0], 0x78);

        let decompressed_bytes = decode(&compressed_bytes, original_bytes.len()).unwrap();
        assert_eq!(original_bytes, decompressed_bytes);
    }

    #[test]
    fn test_deflate_empty_input() {
        let compressed_bytes = encode(&[], 6).unwrap();
        assert_eq!(decode(&compressed_bytes, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_length_mismatch_is_corrupt() {
        let original_bytes = vec![7u8; 500];
        let compressed_bytes = encode(&original_bytes, 1).unwrap();
        assert!(matches!(
            decode(&compressed_bytes, 499),
            Err(FieldPackError::CorruptStream(_))
        ));
        assert!(matches!(
            decode(&compressed_bytes, 501),
            Err(FieldPackError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_garbage_input_is_error() {
        assert!(decode(&[1, 2, 3, 4, 5], 10).is_err());
    }
}
