// In: src/error.rs

//! This module defines the single, unified error type for the entire fieldpack library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldPackError {
    // =========================================================================
    // === Bit-Level Stream Errors
    // =========================================================================
    #[error("Insufficient bits: requested {requested}, only {remaining} remaining")]
    InsufficientBits { requested: usize, remaining: usize },

    #[error("Bit packer out of capacity: {requested} bits requested, capacity is {capacity} bits")]
    OutOfCapacity { requested: usize, capacity: usize },

    #[error("Invalid bit width {0}: must be within 0..=32")]
    InvalidBitWidth(u32),

    #[error("Corrupt stream: {0}")]
    CorruptStream(String),

    // =========================================================================
    // === High-Level, Semantic Errors
    // =========================================================================
    #[error("Unsupported field type: {0}")]
    UnsupportedFieldType(String),

    #[error("Invalid float parameters: exponent {exponent} (max 8), mantissa {mantissa} (max 23)")]
    InvalidFloatParams { exponent: u32, mantissa: u32 },

    #[error("Lossy clamp rejected in strict mode for value {value}")]
    ClampRejected { value: f32 },

    #[error("Array of length {len} exceeds the encodable maximum of {max}")]
    ArrayTooLong { len: usize, max: usize },

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Huffman tag length {0} exceeds the 31-bit limit")]
    TagTooLong(u32),

    #[error("Internal logic error (this is a bug): {0}")]
    InternalError(String),

    // =========================================================================
    // === External Error Wrappers
    // =========================================================================
    /// An error originating from the underlying I/O subsystem or the zlib stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zstd operation failed: {0}")]
    ZstdError(String),

    /// An error from the Serde JSON library, raised while loading a `CodecConfig`.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

impl FieldPackError {
    /// Shorthand for the truncated-input flavour of `CorruptStream`.
    pub(crate) fn truncated(what: &str) -> Self {
        FieldPackError::CorruptStream(format!("truncated input while reading {}", what))
    }
}
