//! This module contains the array-level strategy layer.
//!
//! The kernels know how to pack bits; this layer decides *what* to pack. It picks
//! delta spans, float widths and envelopes, writes the documented records, and
//! keeps the per-compressor statistics.
//!
//! ```text
//!   i32 / i16 / i8 array ──> SpanDetector ──> delta ──> shift ──> HuffmanTable ──> envelope
//!                                                    └─(short array)──────────────> raw envelope
//!
//!   f32 array ──> tolerance ──> find_float_params ──> FixedFloatCodec ──┬──> packed codes
//!                                                                       ├──> Huffman envelope
//!                                                                       └──> zlib / zstd body
//!
//!   f32 array ──> decimal scale ──> range codec
//! ```

pub mod array;
pub mod span;

pub use array::{
    calc_tolerance, decompress_byte_array_huffman, decompress_float_array,
    decompress_int_array_huffman, decompress_short_array_huffman, dequantize_float_array,
    dequantize_float_array_huffman, dequantize_float_array_wrapped, dequantize_vector,
    range_decompress_int_array, ArrayCompressor, CompressionStats,
};
pub use span::{detector_for, FixedSpan, MarkerSpanDetector, NoSpan, SpanDetector};
