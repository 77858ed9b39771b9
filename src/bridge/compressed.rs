//! The compressing field encoder.
//!
//! `MFInt32` values go through the Huffman integer envelope (so face index lists
//! pick up their `-1` stride), multi-valued float shapes through the record
//! selected by `CodecConfig::float_strategy`. Every other shape is written by
//! the `BinaryFieldEncoder`.

use std::io::Cursor;
use std::sync::Arc;

use crate::bridge::binary::{read_f32_list, write_f32_list};
use crate::bridge::{check_decoded_len, validate_value, BinaryFieldEncoder, FieldCodec, FieldValue};
use crate::config::{CodecConfig, FloatStrategy};
use crate::error::FieldPackError;
use crate::pipeline::array::{
    decompress_float_array, decompress_int_array_huffman, dequantize_float_array,
    dequantize_float_array_huffman, dequantize_float_array_wrapped, ArrayCompressor,
};
use crate::types::{FieldShape, ScalarKind};
use crate::utils::{read_bytes, read_len, write_len};

/// Field encoder backed by an `ArrayCompressor`.
pub struct CompressedFieldEncoder {
    compressor: ArrayCompressor,
    binary: BinaryFieldEncoder,
}

impl Default for CompressedFieldEncoder {
    fn default() -> Self {
        Self::new(Arc::new(CodecConfig::default()))
    }
}

impl CompressedFieldEncoder {
    pub fn new(config: Arc<CodecConfig>) -> Self {
        Self::with_compressor(ArrayCompressor::new(config))
    }

    /// Wraps an existing compressor, e.g. one with a custom span detector.
    pub fn with_compressor(compressor: ArrayCompressor) -> Self {
        Self {
            compressor,
            binary: BinaryFieldEncoder::new(),
        }
    }

    pub fn config(&self) -> &CodecConfig {
        self.compressor.config()
    }

    /// The underlying compressor, for its statistics.
    pub fn compressor(&self) -> &ArrayCompressor {
        &self.compressor
    }

    pub fn compressor_mut(&mut self) -> &mut ArrayCompressor {
        &mut self.compressor
    }

    fn compress_floats(
        &mut self,
        sink: &mut Vec<u8>,
        shape: FieldShape,
        values: &[f32],
    ) -> Result<(), FieldPackError> {
        let strategy = self.config().float_strategy;
        match strategy {
            FloatStrategy::Quantized => {
                self.compressor.quantize_float_array(sink, values)?;
            }
            FloatStrategy::QuantizedHuffman => {
                self.compressor.quantize_float_array_huffman(sink, values)?;
            }
            FloatStrategy::Wrapped => {
                // The wrapped body has no length of its own.
                let mut record = Vec::new();
                self.compressor.quantize_float_array_wrapped(&mut record, values)?;
                write_len(sink, record.len())?;
                sink.extend_from_slice(&record);
            }
            FloatStrategy::DecimalRange => {
                self.compressor
                    .compress_float_array(sink, true, shape.components(), values)?;
            }
            FloatStrategy::Raw => write_f32_list(sink, values, true)?,
        }
        Ok(())
    }

    fn decompress_floats(
        &self,
        source: &mut Cursor<&[u8]>,
        shape: FieldShape,
    ) -> Result<Vec<f32>, FieldPackError> {
        let values = match self.config().float_strategy {
            FloatStrategy::Quantized => dequantize_float_array(source)?,
            FloatStrategy::QuantizedHuffman => dequantize_float_array_huffman(source)?,
            FloatStrategy::Wrapped => {
                let len = read_len(source, "wrapped record length")?;
                let record = read_bytes(source, len, "wrapped record")?;
                dequantize_float_array_wrapped(record, self.config().wrap_codec)?
            }
            FloatStrategy::DecimalRange => {
                decompress_float_array(source, true, shape.components())?
            }
            FloatStrategy::Raw => return read_f32_list(source, shape),
        };
        check_decoded_len(shape, values.len())?;
        Ok(values)
    }
}

/// Shapes this encoder compresses rather than passing to the binary encoder.
fn is_compressed_shape(shape: FieldShape) -> bool {
    shape.is_multi() && matches!(shape.scalar_kind(), ScalarKind::Int32 | ScalarKind::Float32)
}

impl FieldCodec for CompressedFieldEncoder {
    fn compress(
        &mut self,
        sink: &mut Vec<u8>,
        shape: FieldShape,
        value: &FieldValue,
    ) -> Result<(), FieldPackError> {
        validate_value(shape, value)?;
        match value {
            FieldValue::Ints(data) if is_compressed_shape(shape) => {
                self.compressor.compress_int_array_huffman(sink, data)
            }
            FieldValue::Floats(data) if is_compressed_shape(shape) => {
                self.compress_floats(sink, shape, data)
            }
            _ => self.binary.compress(sink, shape, value),
        }
    }

    fn decompress(
        &self,
        source: &mut Cursor<&[u8]>,
        shape: FieldShape,
    ) -> Result<FieldValue, FieldPackError> {
        if !is_compressed_shape(shape) {
            return self.binary.decompress(source, shape);
        }
        match shape.scalar_kind() {
            ScalarKind::Int32 => Ok(FieldValue::Ints(decompress_int_array_huffman(source)?)),
            _ => Ok(FieldValue::Floats(self.decompress_floats(source, shape)?)),
        }
    }

    fn is_lossless(&self, shape: FieldShape) -> bool {
        !is_compressed_shape(shape)
            || shape.scalar_kind() == ScalarKind::Int32
            || self.config().float_strategy == FloatStrategy::Raw
    }
}
