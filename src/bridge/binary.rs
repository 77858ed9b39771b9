//! The uncompressed field encoder.
//!
//! Values are written big-endian in their native width. `MF` shapes carry an
//! `int32` count of scalars (not tuples) in front of the values; `SF` shapes,
//! tuples included, carry no length. Booleans take one byte, strings a `u16`
//! byte length followed by UTF-8.

use std::io::Cursor;

use crate::bridge::{check_decoded_len, validate_value, FieldCodec, FieldValue};
use crate::error::FieldPackError;
use crate::types::{FieldShape, ScalarKind};
use crate::utils::{
    read_bytes, read_f32, read_f64, read_i32, read_i64, read_len, read_u16, read_u8, write_i32,
    write_len,
};

/// Writes and reads raw field values.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryFieldEncoder;

impl BinaryFieldEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl FieldCodec for BinaryFieldEncoder {
    fn compress(
        &mut self,
        sink: &mut Vec<u8>,
        shape: FieldShape,
        value: &FieldValue,
    ) -> Result<(), FieldPackError> {
        validate_value(shape, value)?;
        let multi = shape.is_multi();
        match value {
            FieldValue::Int(v) => write_i32(sink, *v),
            FieldValue::Ints(v) => {
                write_len(sink, v.len())?;
                v.iter().for_each(|&x| write_i32(sink, x));
            }
            FieldValue::Float(v) => sink.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Floats(v) => write_f32_list(sink, v, multi)?,
            FieldValue::Double(v) => sink.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Doubles(v) => {
                if multi {
                    write_len(sink, v.len())?;
                }
                v.iter().for_each(|x| sink.extend_from_slice(&x.to_be_bytes()));
            }
            FieldValue::Long(v) => sink.extend_from_slice(&v.to_be_bytes()),
            FieldValue::Longs(v) => {
                write_len(sink, v.len())?;
                v.iter().for_each(|x| sink.extend_from_slice(&x.to_be_bytes()));
            }
            FieldValue::Bool(v) => sink.push(*v as u8),
            FieldValue::Bools(v) => {
                write_len(sink, v.len())?;
                sink.extend(v.iter().map(|&b| b as u8));
            }
            FieldValue::Str(v) => write_utf(sink, v)?,
            FieldValue::Strs(v) => {
                write_len(sink, v.len())?;
                for s in v {
                    write_utf(sink, s)?;
                }
            }
        }
        Ok(())
    }

    fn decompress(
        &self,
        source: &mut Cursor<&[u8]>,
        shape: FieldShape,
    ) -> Result<FieldValue, FieldPackError> {
        let multi = shape.is_multi();
        let single = !multi && shape.components() == 1;
        let value = match shape.scalar_kind() {
            ScalarKind::Int32 if single => FieldValue::Int(read_i32(source, "SFInt32")?),
            ScalarKind::Int32 => {
                let len = read_len(source, "MFInt32 length")?;
                FieldValue::Ints(read_list(source, len, 4, "MFInt32 values", |c| {
                    read_i32(c, "int32")
                })?)
            }
            ScalarKind::Float32 if single => FieldValue::Float(read_f32(source, "float")?),
            ScalarKind::Float32 => FieldValue::Floats(read_f32_list(source, shape)?),
            ScalarKind::Float64 if single => FieldValue::Double(read_f64(source, "double")?),
            ScalarKind::Float64 => {
                let len = list_len(source, shape)?;
                FieldValue::Doubles(read_list(source, len, 8, "double values", |c| {
                    read_f64(c, "double")
                })?)
            }
            ScalarKind::Int64 if single => FieldValue::Long(read_i64(source, "SFLong")?),
            ScalarKind::Int64 => {
                let len = read_len(source, "MFLong length")?;
                FieldValue::Longs(read_list(source, len, 8, "MFLong values", |c| {
                    read_i64(c, "int64")
                })?)
            }
            ScalarKind::Boolean if single => FieldValue::Bool(read_u8(source, "SFBool")? != 0),
            ScalarKind::Boolean => {
                let len = read_len(source, "MFBool length")?;
                let raw = read_bytes(source, len, "MFBool values")?;
                FieldValue::Bools(raw.iter().map(|&b| b != 0).collect())
            }
            ScalarKind::Utf8 if single => FieldValue::Str(read_utf(source)?),
            ScalarKind::Utf8 => {
                let len = read_len(source, "MFString length")?;
                // Every string costs at least its two length bytes.
                let remaining = source.get_ref().len().saturating_sub(source.position() as usize);
                if len.saturating_mul(2) > remaining {
                    return Err(FieldPackError::truncated("MFString values"));
                }
                FieldValue::Strs((0..len).map(|_| read_utf(source)).collect::<Result<_, _>>()?)
            }
        };
        Ok(value)
    }

    fn is_lossless(&self, _shape: FieldShape) -> bool {
        true
    }
}

//==================================================================================
// Shared Helpers
//==================================================================================

/// Writes a float list, prefixed with its length when `with_len`.
pub(crate) fn write_f32_list(
    sink: &mut Vec<u8>,
    values: &[f32],
    with_len: bool,
) -> Result<(), FieldPackError> {
    if with_len {
        write_len(sink, values.len())?;
    }
    values.iter().for_each(|x| sink.extend_from_slice(&x.to_be_bytes()));
    Ok(())
}

/// Reads a float list of `shape` as written by `write_f32_list`.
pub(crate) fn read_f32_list(
    source: &mut Cursor<&[u8]>,
    shape: FieldShape,
) -> Result<Vec<f32>, FieldPackError> {
    let len = list_len(source, shape)?;
    read_list(source, len, 4, "float values", |c| read_f32(c, "float"))
}

/// The scalar count of a list: read from the stream for `MF` shapes, the tuple
/// width for `SF` shapes.
fn list_len(source: &mut Cursor<&[u8]>, shape: FieldShape) -> Result<usize, FieldPackError> {
    if !shape.is_multi() {
        return Ok(shape.components());
    }
    let len = read_len(source, "list length")?;
    check_decoded_len(shape, len)?;
    Ok(len)
}

/// Reads `len` fixed-width elements, checking the whole span is present first.
fn read_list<T>(
    source: &mut Cursor<&[u8]>,
    len: usize,
    width: usize,
    what: &str,
    read_one: impl Fn(&mut Cursor<&[u8]>) -> Result<T, FieldPackError>,
) -> Result<Vec<T>, FieldPackError> {
    let byte_len = len
        .checked_mul(width)
        .ok_or_else(|| FieldPackError::CorruptStream(format!("{} length {} overflows", what, len)))?;
    let raw = read_bytes(source, byte_len, what)?;
    let mut cursor = Cursor::new(raw);
    (0..len).map(|_| read_one(&mut cursor)).collect()
}

fn write_utf(sink: &mut Vec<u8>, value: &str) -> Result<(), FieldPackError> {
    let len = u16::try_from(value.len()).map_err(|_| {
        FieldPackError::ValueOutOfRange(format!(
            "string of {} bytes exceeds the 65535-byte limit",
            value.len()
        ))
    })?;
    sink.extend_from_slice(&len.to_be_bytes());
    sink.extend_from_slice(value.as_bytes());
    Ok(())
}

fn read_utf(source: &mut Cursor<&[u8]>) -> Result<String, FieldPackError> {
    let len = read_u16(source, "string length")? as usize;
    let raw = read_bytes(source, len, "string bytes")?;
    String::from_utf8(raw.to_vec())
        .map_err(|e| FieldPackError::CorruptStream(format!("invalid UTF-8 string: {}", e)))
}
