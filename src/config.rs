// In: src/config.rs

//! The single source of truth for all fieldpack codec configuration.
//!
//! `CodecConfig` is created once at the application boundary (in code, or parsed
//! from a JSON document) and then passed down to the `ArrayCompressor` and the
//! field encoders as a shared, read-only `Arc<CodecConfig>`.
//!
//! Nothing in here affects the wire format on its own: every choice a decoder
//! needs (float widths, spans, Huffman tables) is written into the stream.

use serde::{Deserialize, Serialize};

use crate::error::FieldPackError;

//==================================================================================
// I. Core Configuration Enums
//==================================================================================

/// How multi-valued float fields are compressed by the `CompressedFieldEncoder`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FloatStrategy {
    /// **Default:** tolerance-driven exponent/mantissa quantization, codes packed
    /// at a fixed width.
    #[default]
    Quantized,

    /// Quantized codes fed through the Huffman-compressed array envelope.
    QuantizedHuffman,

    /// Quantized codes wrapped in a zlib (or zstd) stream.
    Wrapped,

    /// Decimal scaling to integers followed by range coding. Lossless for values
    /// with at most eight decimal digits.
    DecimalRange,

    /// No compression: big-endian IEEE-754 values.
    Raw,
}

/// The error bound handed to the float parameter search.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum Tolerance {
    /// A fixed absolute error bound.
    Absolute(f32),

    /// A percentage of the largest XYZ extent of the array being compressed.
    PercentOfBounds(f32),
}

impl Default for Tolerance {
    fn default() -> Self {
        Tolerance::Absolute(1e-4)
    }
}

/// Strategy used to pick the delta span of integer arrays.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum SpanDetection {
    /// **Default:** look for a repeating marker value (the `-1` face terminator of
    /// index lists) at a consistent stride within the first `window` elements.
    Marker {
        #[serde(default = "default_marker")]
        marker: i32,
        #[serde(default = "default_window")]
        window: usize,
    },

    /// Always use the given span.
    Fixed { span: u8 },

    /// Never delta code.
    Disabled,
}

impl Default for SpanDetection {
    fn default() -> Self {
        SpanDetection::Marker {
            marker: default_marker(),
            window: default_window(),
        }
    }
}

/// Backend used for the wrapped float record body.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum WrapCodec {
    /// **Default:** zlib-framed DEFLATE at `CodecConfig::deflate_level`.
    #[default]
    Deflate,

    /// A Zstandard frame at the given level.
    Zstd {
        #[serde(default = "default_zstd_level")]
        level: i32,
    },
}

//==================================================================================
// II. The Unified CodecConfig
//==================================================================================

/// The single, unified configuration for the codec.
/// This struct is created once and shared throughout the system via an `Arc`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct CodecConfig {
    #[serde(default)]
    pub float_strategy: FloatStrategy,

    #[serde(default)]
    pub tolerance: Tolerance,

    /// Round mantissas to nearest when quantizing; truncate otherwise.
    #[serde(default = "default_true")]
    pub rounding: bool,

    /// If true, a float that has to be clamped into the quantized exponent range
    /// fails the call with `ClampRejected` instead of being logged and clamped.
    #[serde(default)]
    pub strict_clamping: bool,

    #[serde(default)]
    pub span_detection: SpanDetection,

    #[serde(default)]
    pub wrap_codec: WrapCodec,

    /// zlib level for the `Deflate` wrap backend (0-9).
    #[serde(default = "default_deflate_level")]
    pub deflate_level: u32,

    /// Integer arrays shorter than this are written with the raw fallback
    /// envelope rather than a Huffman table.
    #[serde(default = "default_huffman_min_len")]
    pub huffman_min_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            float_strategy: FloatStrategy::default(),
            tolerance: Tolerance::default(),
            rounding: true,
            strict_clamping: false,
            span_detection: SpanDetection::default(),
            wrap_codec: WrapCodec::default(),
            deflate_level: default_deflate_level(),
            huffman_min_len: default_huffman_min_len(),
        }
    }
}

impl CodecConfig {
    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, FieldPackError> {
        let config: CodecConfig = serde_json::from_str(json)?;
        if config.deflate_level > 9 {
            return Err(FieldPackError::ValueOutOfRange(format!(
                "deflate_level {} is outside 0..=9",
                config.deflate_level
            )));
        }
        Ok(config)
    }
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}

fn default_marker() -> i32 {
    -1
}

fn default_window() -> usize {
    20
}

fn default_zstd_level() -> i32 {
    3
}

fn default_deflate_level() -> u32 {
    9
}

fn default_huffman_min_len() -> usize {
    2
}

//==================================================================================
// III. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_yields_defaults() {
        let config = CodecConfig::from_json("{}").unwrap();
        assert_eq!(config, CodecConfig::default());
        assert_eq!(config.span_detection, SpanDetection::Marker { marker: -1, window: 20 });
        assert_eq!(config.deflate_level, 9);
    }

    #[test]
    fn test_json_overrides() {
        let json = r#"{
            "float_strategy": "wrapped",
            "tolerance": { "percent_of_bounds": 0.5 },
            "rounding": false,
            "span_detection": { "strategy": "fixed", "span": 3 },
            "wrap_codec": { "codec": "zstd" }
        }"#;
        let config = CodecConfig::from_json(json).unwrap();
        assert_eq!(config.float_strategy, FloatStrategy::Wrapped);
        assert_eq!(config.tolerance, Tolerance::PercentOfBounds(0.5));
        assert!(!config.rounding);
        assert_eq!(config.span_detection, SpanDetection::Fixed { span: 3 });
        assert_eq!(config.wrap_codec, WrapCodec::Zstd { level: 3 });
    }

    #[test]
    fn test_invalid_deflate_level_rejected() {
        let err = CodecConfig::from_json(r#"{ "deflate_level": 12 }"#).unwrap_err();
        assert!(matches!(err, FieldPackError::ValueOutOfRange(_)));
    }

    #[test]
    fn test_malformed_json_is_serde_error() {
        let err = CodecConfig::from_json("{ not json").unwrap_err();
        assert!(matches!(err, FieldPackError::SerdeJson(_)));
    }
}
