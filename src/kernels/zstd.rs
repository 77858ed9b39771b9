//! This module contains the kernels that wrap a packed byte block in a
//! Zstandard frame, the alternate backend of the wrapped quantized float record.
//!
//! Like the deflate kernels, no length prefix is added here: the record header
//! carries the uncompressed length and `decode` verifies it. This module is a
//! safe, panic-free wrapper around the `zstd` crate.

use std::io::{Read, Write};
use zstd::stream::read::Decoder;
use zstd::stream::Encoder;

use crate::error::FieldPackError;

//==================================================================================
// 1. Public API
//==================================================================================

/// Compresses `input_bytes` into a single Zstandard frame.
pub fn encode(input_bytes: &[u8], level: i32) -> Result<Vec<u8>, FieldPackError> {
    let mut output_buf = Vec::with_capacity(input_bytes.len() / 2 + 16);

    let mut encoder = Encoder::new(&mut output_buf, level)
        .map_err(|e| FieldPackError::ZstdError(e.to_string()))?;
    encoder
        .write_all(input_bytes)
        .map_err(|e| FieldPackError::ZstdError(e.to_string()))?;

    // `finish` is essential to finalize the Zstd frame.
    encoder
        .finish()
        .map_err(|e| FieldPackError::ZstdError(e.to_string()))?;
    Ok(output_buf)
}

/// Decompresses a frame, which must expand to exactly `expected_len` bytes.
pub fn decode(input_bytes: &[u8], expected_len: usize) -> Result<Vec<u8>, FieldPackError> {
    let decoder =
        Decoder::new(input_bytes).map_err(|e| FieldPackError::ZstdError(e.to_string()))?;
    let mut output_buf = Vec::with_capacity(expected_len);
    // One byte past the expected size is enough to detect an oversized frame.
    decoder
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output_buf)
        .map_err(|e| FieldPackError::ZstdError(e.to_string()))?;

    if output_buf.len() != expected_len {
        return Err(FieldPackError::CorruptStream(format!(
            "zstd frame size does not match header: expected {} bytes, frame holds {}",
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
