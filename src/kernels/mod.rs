//! This module contains the pure, stateless compression kernels.
//!
//! Each kernel is a leaf: it knows nothing about field shapes, configuration or
//! statistics. The `pipeline` layer composes them into the documented records.
//!
//! 1.  `bitstream`: MSB-first bit packer/unpacker every other kernel writes through.
//! 2.  `fixed_float`: reduced-width float codes and the tolerance-driven width search.
//! 3.  `huffman`: per-array Huffman tables, dictionary I/O and tag streams.
//! 4.  `range` / `delta`: minimum-width integer packing with optional span deltas.
//! 5.  `deflate` / `zstd`: general-purpose byte wrappers.

pub mod bitstream;
pub mod deflate;
pub mod delta;
pub mod fixed_float;
pub mod huffman;
pub mod range;
pub mod zstd;

pub use bitstream::{BitPacker, BitUnpacker};
pub use fixed_float::{EncodeOutcome, FixedFloatCodec, FloatParams};
pub use huffman::HuffmanTable;
