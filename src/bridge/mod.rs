// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the field-level API of the fieldpack library. The scene-graph
// layer (out of this crate) hands it a `FieldShape` and a `FieldValue`; the bridge
// checks that the two agree and routes the value to the right encoding. It never
// interprets what a field means to the scene graph.
//
// Data Flow (Compression):
//
//   1. [Caller]                 -> (sink: &mut Vec<u8>, FieldShape, &FieldValue)
//         |
//         `-> validate_value: the value variant and length must fit the shape
//         |
//   2. [FieldCodec impl]
//         |
//         |-> BinaryFieldEncoder:     raw big-endian values (MF lengths as int32)
//         |
//         `-> CompressedFieldEncoder: MFInt32            -> Huffman envelope
//                                     MF float shapes    -> CodecConfig::float_strategy
//                                     everything else    -> BinaryFieldEncoder
//
// Data Flow (Decompression):
//
//   1. [Caller]                 -> (source: &mut Cursor<&[u8]>, FieldShape)
//         |
//   2. [FieldCodec impl]        -> reads exactly one field value, leaves the cursor
//         |                        after it
//         `-> Returns `Result<FieldValue, FieldPackError>`
//
// The shape is the only dispatch key; nothing about the chosen encoding is written
// to the stream beyond what each record carries itself, so the decoding side must
// use the same encoder type and `CodecConfig`.
//
// ====================================================================================
pub mod binary;
pub mod compressed;

use std::io::Cursor;

use crate::error::FieldPackError;
use crate::types::{FieldShape, ScalarKind};

pub use binary::BinaryFieldEncoder;
pub use compressed::CompressedFieldEncoder;

//==================================================================================
// 1. Field Values
//==================================================================================

/// A scene-graph field value as the codec sees it.
///
/// Tuple shapes (`SFVec3f`, `MFRotation`, ...) use the flat list variants with
/// the components interleaved.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i32),
    Ints(Vec<i32>),
    Float(f32),
    Floats(Vec<f32>),
    Double(f64),
    Doubles(Vec<f64>),
    Long(i64),
    Longs(Vec<i64>),
    Bool(bool),
    Bools(Vec<bool>),
    Str(String),
    Strs(Vec<String>),
}

impl FieldValue {
    /// Name of the variant, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Int(_) => "Int",
            FieldValue::Ints(_) => "Ints",
            FieldValue::Float(_) => "Float",
            FieldValue::Floats(_) => "Floats",
            FieldValue::Double(_) => "Double",
            FieldValue::Doubles(_) => "Doubles",
            FieldValue::Long(_) => "Long",
            FieldValue::Longs(_) => "Longs",
            FieldValue::Bool(_) => "Bool",
            FieldValue::Bools(_) => "Bools",
            FieldValue::Str(_) => "Str",
            FieldValue::Strs(_) => "Strs",
        }
    }
}

//==================================================================================
// 2. The Codec Trait
//==================================================================================

/// A field-level encoder/decoder pair.
pub trait FieldCodec {
    /// Appends `value`, laid out as `shape`, to `sink`.
    fn compress(
        &mut self,
        sink: &mut Vec<u8>,
        shape: FieldShape,
        value: &FieldValue,
    ) -> Result<(), FieldPackError>;

    /// Reads one value of `shape` from `source`.
    fn decompress(
        &self,
        source: &mut Cursor<&[u8]>,
        shape: FieldShape,
    ) -> Result<FieldValue, FieldPackError>;

    /// True when every value of `shape` decodes bit-for-bit identical to its input.
    fn is_lossless(&self, shape: FieldShape) -> bool;
}

//==================================================================================
// 3. Shape Checks
//==================================================================================

/// Checks that `value` can be written as `shape`.
pub(crate) fn validate_value(shape: FieldShape, value: &FieldValue) -> Result<(), FieldPackError> {
    use FieldValue::*;
    let single = !shape.is_multi() && shape.components() == 1;
    let fits = match (shape.scalar_kind(), value) {
        (ScalarKind::Int32, Int(_)) => single,
        (ScalarKind::Int32, Ints(_)) => shape.is_multi(),
        (ScalarKind::Float32, Float(_)) => single,
        (ScalarKind::Float32, Floats(v)) => list_fits(shape, v.len()),
        (ScalarKind::Float64, Double(_)) => single,
        (ScalarKind::Float64, Doubles(v)) => list_fits(shape, v.len()),
        (ScalarKind::Int64, Long(_)) => single,
        (ScalarKind::Int64, Longs(_)) => shape.is_multi(),
        (ScalarKind::Boolean, Bool(_)) => single,
        (ScalarKind::Boolean, Bools(_)) => shape.is_multi(),
        (ScalarKind::Utf8, Str(_)) => single,
        (ScalarKind::Utf8, Strs(_)) => shape.is_multi(),
        _ => false,
    };
    if fits {
        Ok(())
    } else {
        Err(FieldPackError::UnsupportedFieldType(format!(
            "{} value cannot be written as {}",
            value.kind_name(),
            shape
        )))
    }
}

/// A flat list fits a tuple shape when it holds whole tuples (exactly one for
/// `SF` shapes).
fn list_fits(shape: FieldShape, len: usize) -> bool {
    if shape.is_multi() {
        len % shape.components() == 0
    } else {
        shape.components() > 1 && len == shape.components()
    }
}

/// Checks a decoded list length against the tuple width of `shape`.
pub(crate) fn check_decoded_len(shape: FieldShape, len: usize) -> Result<(), FieldPackError> {
    if len % shape.components() != 0 {
        return Err(FieldPackError::CorruptStream(format!(
            "{} values do not form whole {} tuples",
            len, shape
        )));
    }
    Ok(())
}
