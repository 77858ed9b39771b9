//! This module contains the `ArrayCompressor`, the array-level facade over the
//! kernels, together with the matching stateless decoders.
//!
//! Every `compress`/`quantize` method appends exactly one documented record to
//! the caller's `output_buf`; every decoder reads exactly one record from a
//! `Cursor` and leaves it positioned after that record. The wrapped float record
//! is the exception: its body has no length of its own, so it is decoded from a
//! slice holding exactly the record.
//!
//! The compressor is the only stateful piece of the crate. It holds the shared
//! configuration, the span detector it was built from, and the per-instance
//! `CompressionStats`.

use std::io::Cursor;
use std::sync::Arc;

use crate::config::{CodecConfig, Tolerance, WrapCodec};
use crate::error::FieldPackError;
use crate::kernels::bitstream::{BitPacker, BitUnpacker};
use crate::kernels::delta::{self, DeltaRing};
use crate::kernels::fixed_float::{find_float_params_array, FixedFloatCodec, FloatParams};
use crate::kernels::huffman::HuffmanTable;
use crate::kernels::{deflate, range, zstd};
use crate::pipeline::span::{detector_for, SpanDetector, MAX_SPAN};
use crate::traits::WireInt;
use crate::utils::{read_bytes, read_i32, read_len, read_u8, remaining_slice, write_i32, write_len};

/// Tolerance used by `calc_tolerance` for arrays without a full XYZ triple.
const TINY_ARRAY_TOLERANCE: f32 = 1e-7;
/// Tolerance used by `calc_tolerance` when every extent is zero.
const FLAT_ARRAY_TOLERANCE: f32 = 1e-5;

//==================================================================================
// 1. Statistics
//==================================================================================

/// Per-compressor diagnostics, accumulated across calls until reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionStats {
    /// Bytes written by `HuffmanTable::write_dict`, summed over all tables.
    pub huffman_dict_bytes: u64,
    pub huffman_tables: u64,
    /// `range_bits_histogram[b]` counts range blocks written at `b` bits per element.
    pub range_bits_histogram: Vec<u64>,
    /// Floats clamped into a quantized exponent range.
    pub float_clamps: u64,
    /// Integer arrays written with the raw (non-Huffman) envelope.
    pub fallback_envelopes: u64,
}

impl Default for CompressionStats {
    fn default() -> Self {
        Self {
            huffman_dict_bytes: 0,
            huffman_tables: 0,
            range_bits_histogram: vec![0; 33],
            float_clamps: 0,
            fallback_envelopes: 0,
        }
    }
}

impl CompressionStats {
    fn record_range_bits(&mut self, bits: u32) {
        if let Some(slot) = self.range_bits_histogram.get_mut(bits as usize) {
            *slot += 1;
        }
    }

    /// Total number of range blocks recorded in the histogram.
    pub fn range_blocks(&self) -> u64 {
        self.range_bits_histogram.iter().sum()
    }

    /// One-line summary; the range spread lists only non-empty bit widths.
    pub fn summary(&self) -> String {
        let spread: Vec<String> = self
            .range_bits_histogram
            .iter()
            .enumerate()
            .filter(|(_, &n)| n > 0)
            .map(|(bits, n)| format!("{}b:{}", bits, n))
            .collect();
        format!(
            "huffman tables={} dict bytes={} | fallback envelopes={} | float clamps={} | range spread [{}]",
            self.huffman_tables,
            self.huffman_dict_bytes,
            self.fallback_envelopes,
            self.float_clamps,
            spread.join(" ")
        )
    }

    /// Writes `summary` at info level.
    pub fn log_summary(&self) {
        log::info!("{}", self.summary());
    }
}

//==================================================================================
// 2. Tolerance Helper
//==================================================================================

/// Returns `fraction` of the largest X/Y/Z extent of an interleaved XYZ array.
///
/// Arrays shorter than one triple get `1e-7`; a zero extent gets `1e-5`.
pub fn calc_tolerance(coords: &[f32], fraction: f32) -> f32 {
    if coords.len() < 3 {
        return TINY_ARRAY_TOLERANCE;
    }
    let mut min = [f32::INFINITY; 3];
    let mut max = [f32::NEG_INFINITY; 3];
    for triple in coords.chunks_exact(3) {
        for axis in 0..3 {
            min[axis] = min[axis].min(triple[axis]);
            max[axis] = max[axis].max(triple[axis]);
        }
    }
    let extent = (0..3)
        .map(|axis| max[axis] - min[axis])
        .fold(0.0f32, f32::max);

    let tolerance = extent * fraction;
    if tolerance == 0.0 || !tolerance.is_finite() {
        FLAT_ARRAY_TOLERANCE
    } else {
        tolerance
    }
}

//==================================================================================
// 3. The Compressor
//==================================================================================

/// The array compression facade.
pub struct ArrayCompressor {
    config: Arc<CodecConfig>,
    detector: Box<dyn SpanDetector + Send + Sync>,
    stats: CompressionStats,
}

impl Default for ArrayCompressor {
    fn default() -> Self {
        Self::new(Arc::new(CodecConfig::default()))
    }
}

impl ArrayCompressor {
    pub fn new(config: Arc<CodecConfig>) -> Self {
        let detector = detector_for(&config.span_detection);
        Self {
            config,
            detector,
            stats: CompressionStats::default(),
        }
    }

    /// Replaces the span detector built from the configuration.
    pub fn with_detector(mut self, detector: Box<dyn SpanDetector + Send + Sync>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &Arc<CodecConfig> {
        &self.config
    }

    pub fn stats(&self) -> &CompressionStats {
        &self.stats
    }

    /// Returns the accumulated statistics and starts a fresh set.
    pub fn reset_stats(&mut self) -> CompressionStats {
        std::mem::take(&mut self.stats)
    }

    /// The tolerance the configuration asks for when quantizing `values`.
    pub fn tolerance_for(&self, values: &[f32]) -> f32 {
        match self.config.tolerance {
            Tolerance::Absolute(t) => t,
            Tolerance::PercentOfBounds(fraction) => calc_tolerance(values, fraction),
        }
    }

    //------------------------------------------------------------------------------
    // Huffman envelopes
    //------------------------------------------------------------------------------

    /// Writes `data` as a Huffman-compressed array envelope, delta coded when the
    /// span detector finds a stride.
    pub fn compress_int_array_huffman(
        &mut self,
        output_buf: &mut Vec<u8>,
        data: &[i32],
    ) -> Result<(), FieldPackError> {
        self.compress_huffman(output_buf, data, true)
    }

    pub fn compress_short_array_huffman(
        &mut self,
        output_buf: &mut Vec<u8>,
        data: &[i16],
    ) -> Result<(), FieldPackError> {
        self.compress_huffman(output_buf, data, true)
    }

    pub fn compress_byte_array_huffman(
        &mut self,
        output_buf: &mut Vec<u8>,
        data: &[i8],
    ) -> Result<(), FieldPackError> {
        self.compress_huffman(output_buf, data, true)
    }

    fn compress_huffman<T: WireInt>(
        &mut self,
        output_buf: &mut Vec<u8>,
        data: &[T],
        detect_span: bool,
    ) -> Result<(), FieldPackError> {
        if data.is_empty() || data.len() < self.config.huffman_min_len {
            return self.write_raw_envelope(output_buf, data);
        }

        let widened: Vec<i32> = data.iter().map(|&v| v.widen()).collect();
        let span = if detect_span {
            self.detector.detect(&widened).min(MAX_SPAN)
        } else {
            0
        };
        let values = if span > 0 {
            delta::encode(&widened, span)
        } else {
            widened
        };

        let min = values.iter().copied().min().unwrap_or(0);
        let shift = min.wrapping_neg();
        let shifted: Vec<i32> = values.iter().map(|v| v.wrapping_add(shift)).collect();

        let mut table = HuffmanTable::new();
        table.add_all(&shifted);
        match table.compute_tags() {
            Ok(()) => {}
            Err(FieldPackError::TagTooLong(depth)) => {
                log::warn!(
                    "huffman tags for {} {} values need {} bits; writing raw envelope",
                    data.len(),
                    T::NAME,
                    depth
                );
                return self.write_raw_envelope(output_buf, data);
            }
            Err(e) => return Err(e),
        }

        write_envelope_header(output_buf, true, span)?;
        write_i32(output_buf, shift);
        write_len(output_buf, shifted.len())?;
        let dict_bytes = table.write_dict(output_buf)?;
        let payload = table.encode_values(&shifted)?;
        write_len(output_buf, payload.len())?;
        output_buf.extend_from_slice(&payload);

        self.stats.huffman_tables += 1;
        self.stats.huffman_dict_bytes += dict_bytes as u64;
        log_metric!(
            "event" = "huffman_envelope",
            "outcome" = "huffman",
            "type" = T::NAME,
            "span" = span,
            "symbols" = table.len(),
            "dict_bytes" = dict_bytes,
            "payload_bytes" = payload.len()
        );
        Ok(())
    }

    /// Writes `data` uncoded at its native width behind a cleared Huffman flag.
    fn write_raw_envelope<T: WireInt>(
        &mut self,
        output_buf: &mut Vec<u8>,
        data: &[T],
    ) -> Result<(), FieldPackError> {
        write_envelope_header(output_buf, false, 0)?;
        write_len(output_buf, data.len())?;
        for &v in data {
            v.write_raw(output_buf);
        }
        self.stats.fallback_envelopes += 1;
        log_metric!("event" = "huffman_envelope", "outcome" = "raw_fallback", "type" = T::NAME, "len" = data.len());
        Ok(())
    }

    //------------------------------------------------------------------------------
    // Range coding
    //------------------------------------------------------------------------------

    /// Range-compresses `data`, recording the chosen width in the statistics.
    pub fn range_compress_int_array(
        &mut self,
        output_buf: &mut Vec<u8>,
        delta: bool,
        span: usize,
        data: &[i32],
    ) -> Result<u32, FieldPackError> {
        let bits = range::range_compress_int_array(output_buf, delta, span, data)?;
        self.stats.record_range_bits(bits);
        log_metric!("event" = "range_block", "len" = data.len(), "span" = span, "bits" = bits);
        Ok(bits)
    }

    /// Decimal-scales `values` and range-compresses the result.
    pub fn compress_float_array(
        &mut self,
        output_buf: &mut Vec<u8>,
        delta: bool,
        span: usize,
        values: &[f32],
    ) -> Result<u32, FieldPackError> {
        let bits = range::compress_float_array(output_buf, delta, span, values)?;
        self.stats.record_range_bits(bits);
        log_metric!("event" = "decimal_range_block", "len" = values.len(), "bits" = bits);
        Ok(bits)
    }

    //------------------------------------------------------------------------------
    // Quantized floats
    //------------------------------------------------------------------------------

    /// Writes `byte e, byte m, int32 count` and the packed codes, with widths
    /// chosen for the configured tolerance.
    pub fn quantize_float_array(
        &mut self,
        output_buf: &mut Vec<u8>,
        values: &[f32],
    ) -> Result<FloatParams, FieldPackError> {
        let (params, codec) = self.search_params(values)?;
        let codes = self.encode_codes(&codec, values)?;
        let packed = pack_codes(&codes, codec.code_bits())?;

        write_float_params(output_buf, &params);
        write_len(output_buf, values.len())?;
        output_buf.extend_from_slice(&packed);
        Ok(params)
    }

    /// Writes `byte e, byte m` followed by the codes in a Huffman envelope.
    pub fn quantize_float_array_huffman(
        &mut self,
        output_buf: &mut Vec<u8>,
        values: &[f32],
    ) -> Result<FloatParams, FieldPackError> {
        let (params, codec) = self.search_params(values)?;
        let codes: Vec<i32> = self
            .encode_codes(&codec, values)?
            .into_iter()
            .map(|c| c as i32)
            .collect();

        write_float_params(output_buf, &params);
        self.compress_huffman(output_buf, &codes, false)?;
        Ok(params)
    }

    /// Writes `byte e, byte m, int32 rawPackedLen, int32 count` and the packed
    /// codes compressed with the configured wrap backend.
    pub fn quantize_float_array_wrapped(
        &mut self,
        output_buf: &mut Vec<u8>,
        values: &[f32],
    ) -> Result<FloatParams, FieldPackError> {
        let (params, codec) = self.search_params(values)?;
        let codes = self.encode_codes(&codec, values)?;
        let packed = pack_codes(&codes, codec.code_bits())?;

        let body = match self.config.wrap_codec {
            WrapCodec::Deflate => deflate::encode(&packed, self.config.deflate_level)?,
            WrapCodec::Zstd { level } => zstd::encode(&packed, level)?,
        };

        write_float_params(output_buf, &params);
        write_len(output_buf, packed.len())?;
        write_len(output_buf, values.len())?;
        output_buf.extend_from_slice(&body);
        log_metric!(
            "event" = "wrap_floats",
            "codec" = format!("{:?}", self.config.wrap_codec),
            "raw_bytes" = packed.len(),
            "wrapped_bytes" = body.len()
        );
        Ok(params)
    }

    /// Packs `values` at caller-chosen widths with no header.
    ///
    /// Each code is `exponent_bits + mantissa_bits` wide, plus one when `signed`.
    /// Without the sign bit negative values come back as their magnitude.
    pub fn quantize_vector(
        &mut self,
        output_buf: &mut Vec<u8>,
        exponent_bits: u32,
        mantissa_bits: u32,
        signed: bool,
        values: &[f32],
    ) -> Result<(), FieldPackError> {
        let codec = FixedFloatCodec::new(exponent_bits, mantissa_bits)?;
        let bits = vector_code_bits(&codec, signed);
        let codes = self.encode_codes(&codec, values)?;
        output_buf.extend_from_slice(&pack_codes(&codes, bits)?);
        Ok(())
    }

    fn search_params(
        &self,
        values: &[f32],
    ) -> Result<(FloatParams, FixedFloatCodec), FieldPackError> {
        let tolerance = self.tolerance_for(values);
        let params = find_float_params_array(values, tolerance);
        let codec = FixedFloatCodec::from_params(params)?;
        log_metric!(
            "event" = "float_params",
            "len" = values.len(),
            "tolerance" = tolerance,
            "exponent_bits" = params.exponent_bits,
            "mantissa_bits" = params.mantissa_bits
        );
        Ok((params, codec))
    }

    fn encode_codes(
        &mut self,
        codec: &FixedFloatCodec,
        values: &[f32],
    ) -> Result<Vec<u32>, FieldPackError> {
        let mut codes = Vec::with_capacity(values.len());
        for &value in values {
            let outcome = codec.encode(value, self.config.rounding);
            if outcome.clamped {
                if self.config.strict_clamping {
                    return Err(FieldPackError::ClampRejected { value });
                }
                self.stats.float_clamps += 1;
                log::warn!(
                    "float {} clamped into e={} m={} range",
                    value,
                    codec.exponent_bits(),
                    codec.mantissa_bits()
                );
            }
            codes.push(outcome.code);
        }
        Ok(codes)
    }
}

//==================================================================================
// 4. Decoders
//==================================================================================

pub fn decompress_int_array_huffman(
    cursor: &mut Cursor<&[u8]>,
) -> Result<Vec<i32>, FieldPackError> {
    decompress_huffman(cursor)
}

pub fn decompress_short_array_huffman(
    cursor: &mut Cursor<&[u8]>,
) -> Result<Vec<i16>, FieldPackError> {
    decompress_huffman(cursor)
}

pub fn decompress_byte_array_huffman(
    cursor: &mut Cursor<&[u8]>,
) -> Result<Vec<i8>, FieldPackError> {
    decompress_huffman(cursor)
}

fn decompress_huffman<T: WireInt>(cursor: &mut Cursor<&[u8]>) -> Result<Vec<T>, FieldPackError> {
    let (huffman, span) = read_envelope_header(cursor)?;

    if !huffman {
        let len = read_len(cursor, "raw envelope length")?;
        let byte_len = len.checked_mul(T::WIRE_BYTES).ok_or_else(|| {
            FieldPackError::CorruptStream(format!("raw envelope length {} overflows", len))
        })?;
        let raw = read_bytes(cursor, byte_len, "raw envelope values")?;
        let mut raw_cursor = Cursor::new(raw);
        return (0..len).map(|_| T::read_raw(&mut raw_cursor)).collect();
    }

    let shift = read_i32(cursor, "envelope shift")?;
    let count = read_len(cursor, "envelope count")?;
    let table = HuffmanTable::read_dict(cursor)?;
    let payload_len = read_len(cursor, "envelope payload length")?;
    let payload = read_bytes(cursor, payload_len, "envelope payload")?;

    let codes = table.decode(payload, count)?;
    let mut ring = DeltaRing::new(span);
    codes
        .into_iter()
        .map(|code| T::narrow(ring.next(code.wrapping_sub(shift))))
        .collect()
}

/// Reverses `ArrayCompressor::range_compress_int_array`.
pub fn range_decompress_int_array(
    cursor: &mut Cursor<&[u8]>,
    delta: bool,
    span: usize,
) -> Result<Vec<i32>, FieldPackError> {
    range::range_decompress_int_array(cursor, delta, span)
}

/// Reverses `ArrayCompressor::compress_float_array`.
pub fn decompress_float_array(
    cursor: &mut Cursor<&[u8]>,
    delta: bool,
    span: usize,
) -> Result<Vec<f32>, FieldPackError> {
    range::decompress_float_array(cursor, delta, span)
}

/// Reverses `ArrayCompressor::quantize_float_array`.
pub fn dequantize_float_array(cursor: &mut Cursor<&[u8]>) -> Result<Vec<f32>, FieldPackError> {
    let codec = read_float_params(cursor)?;
    let count = read_len(cursor, "quantized float count")?;
    let bits = codec.code_bits();
    let packed = read_bytes(cursor, packed_len(count, bits)?, "quantized float codes")?;
    unpack_codes(&codec, packed, count, bits, true)
}

/// Reverses `ArrayCompressor::quantize_float_array_huffman`.
pub fn dequantize_float_array_huffman(
    cursor: &mut Cursor<&[u8]>,
) -> Result<Vec<f32>, FieldPackError> {
    let codec = read_float_params(cursor)?;
    let codes: Vec<i32> = decompress_huffman(cursor)?;
    Ok(codes
        .into_iter()
        .map(|code| codec.decode(code as u32, true))
        .collect())
}

/// Reverses `ArrayCompressor::quantize_float_array_wrapped`.
///
/// `record` must hold exactly one wrapped record; `wrap_codec` must name the
/// backend it was written with.
pub fn dequantize_float_array_wrapped(
    record: &[u8],
    wrap_codec: WrapCodec,
) -> Result<Vec<f32>, FieldPackError> {
    let mut cursor = Cursor::new(record);
    let codec = read_float_params(&mut cursor)?;
    let raw_len = read_len(&mut cursor, "wrapped packed length")?;
    let count = read_len(&mut cursor, "wrapped float count")?;
    let bits = codec.code_bits();
    let expected = packed_len(count, bits)?;
    if raw_len != expected {
        return Err(FieldPackError::CorruptStream(format!(
            "wrapped record claims {} packed bytes, {} codes of {} bits need {}",
            raw_len, count, bits, expected
        )));
    }

    let body = remaining_slice(&cursor);
    let packed = match wrap_codec {
        WrapCodec::Deflate => deflate::decode(body, raw_len)?,
        WrapCodec::Zstd { .. } => zstd::decode(body, raw_len)?,
    };
    unpack_codes(&codec, &packed, count, bits, true)
}

/// Reverses `ArrayCompressor::quantize_vector`.
pub fn dequantize_vector(
    cursor: &mut Cursor<&[u8]>,
    exponent_bits: u32,
    mantissa_bits: u32,
    signed: bool,
    len: usize,
) -> Result<Vec<f32>, FieldPackError> {
    let codec = FixedFloatCodec::new(exponent_bits, mantissa_bits)?;
    let bits = vector_code_bits(&codec, signed);
    let packed = read_bytes(cursor, packed_len(len, bits)?, "vector codes")?;
    unpack_codes(&codec, packed, len, bits, signed)
}

//==================================================================================
// 5. Record Helpers
//==================================================================================

fn write_envelope_header(
    output_buf: &mut Vec<u8>,
    huffman: bool,
    span: usize,
) -> Result<(), FieldPackError> {
    let mut header = BitPacker::with_capacity(1);
    header.pack(huffman as i64, 1)?;
    header.pack(span as i64, 7)?;
    header.write_stream(output_buf)
}

fn read_envelope_header(cursor: &mut Cursor<&[u8]>) -> Result<(bool, usize), FieldPackError> {
    let head = read_bytes(cursor, 1, "envelope header")?;
    let mut unpacker = BitUnpacker::new(head);
    let huffman = unpacker.unpack_unsigned(1)? == 1;
    let span = unpacker.unpack_unsigned(7)? as usize;
    if !huffman && span != 0 {
        return Err(FieldPackError::CorruptStream(format!(
            "raw envelope with non-zero span {}",
            span
        )));
    }
    Ok((huffman, span))
}

fn write_float_params(output_buf: &mut Vec<u8>, params: &FloatParams) {
    output_buf.push(params.exponent_bits as u8);
    output_buf.push(params.mantissa_bits as u8);
}

fn read_float_params(cursor: &mut Cursor<&[u8]>) -> Result<FixedFloatCodec, FieldPackError> {
    let exponent_bits = read_u8(cursor, "exponent bits")? as u32;
    let mantissa_bits = read_u8(cursor, "mantissa bits")? as u32;
    FixedFloatCodec::new(exponent_bits, mantissa_bits).map_err(|_| {
        FieldPackError::CorruptStream(format!(
            "float widths e={} m={} exceed f32",
            exponent_bits, mantissa_bits
        ))
    })
}

fn vector_code_bits(codec: &FixedFloatCodec, signed: bool) -> u32 {
    codec.exponent_bits() + codec.mantissa_bits() + signed as u32
}

fn packed_len(count: usize, bits: u32) -> Result<usize, FieldPackError> {
    count
        .checked_mul(bits as usize)
        .map(|total| total.div_ceil(8))
        .ok_or_else(|| FieldPackError::CorruptStream(format!("{} codes overflow", count)))
}

fn pack_codes(codes: &[u32], bits: u32) -> Result<Vec<u8>, FieldPackError> {
    let mut packer = BitPacker::with_capacity(packed_len(codes.len(), bits)?);
    for &code in codes {
        packer.pack(code as i64, bits)?;
    }
    Ok(packer.into_bytes())
}

fn unpack_codes(
    codec: &FixedFloatCodec,
    packed: &[u8],
    count: usize,
    bits: u32,
    signed: bool,
) -> Result<Vec<f32>, FieldPackError> {
    let mut unpacker = BitUnpacker::new(packed);
    let mut out = Vec::with_capacity(count.min(packed.len() * 8 + 1));
    for _ in 0..count {
        let code = unpacker.unpack_unsigned(bits)?;
        out.push(codec.decode(code, signed));
    }
    Ok(out)
}

//==================================================================================
// 6. Unit Tests
//==================================================================================
