//! This file is the root of the `fieldpack` Rust crate.
//!
//! `fieldpack` compresses the numeric field values of a scene graph (coordinates,
//! normals, colors, face indices) into a compact, bit-packed binary form. The
//! crate is organised in three layers:
//! 1.  `kernels`: pure codecs (bit stream, fixed-width floats, Huffman, range and
//!     delta coding, zlib/zstd wrapping).
//! 2.  `pipeline`: the array-level facade that picks spans and strategies and
//!     writes the documented wire records.
//! 3.  `bridge`: the field-level API keyed on [`FieldShape`], consumed by the
//!     surrounding scene-graph layer.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod bridge;
pub mod config;
pub mod kernels;
pub mod pipeline;

mod error;
mod traits;
mod types;
mod utils;

//==================================================================================
// 2. Public Re-exports
//==================================================================================
pub use bridge::{BinaryFieldEncoder, CompressedFieldEncoder, FieldCodec, FieldValue};
pub use config::CodecConfig;
pub use error::FieldPackError;
pub use observability::enable_verbose_logging;
pub use pipeline::{ArrayCompressor, CompressionStats};
pub use traits::WireInt;
pub use types::{FieldShape, ScalarKind};
