//! This module contains the range integer codec and its decimal float wrapper.
//!
//! The range codec stores every element at the minimum width that spans
//! `max - min` of the (optionally span-delta coded) array, after adding a shift
//! of `-min` so the packed values are non-negative. Record layout:
//!
//! ```text
//! count:27 | bits:5 | [count == 0: end] | shift:32 | seeds:32 x min(span, count) | elements:bits x count
//! ```
//!
//! Every header field sums to whole bytes, so the element block always starts on
//! a byte boundary. A width of 32 does not fit the 5-bit field and is written as 0
//! (a real width is never 0).

use std::io::Cursor;

use crate::error::FieldPackError;
use crate::kernels::bitstream::{BitPacker, BitUnpacker};
use crate::kernels::delta::{self, DeltaRing};
use crate::utils::{read_bytes, read_u8};

/// Width of the element-count field.
pub const COUNT_BITS: u32 = 27;

/// Largest element count the 27-bit field can carry.
pub const MAX_RANGE_COUNT: usize = (1 << COUNT_BITS) - 1;

/// Largest decimal power tried by the float wrapper.
pub const MAX_DECIMAL_POWER: u8 = 8;

const WIDTH_BITS: u32 = 5;

//==================================================================================
// 1. Bit Widths
//==================================================================================

/// Minimum number of bits to represent `value` as unsigned: 1 for zero, capped at 32.
pub fn compute_bits(value: i64) -> u32 {
    if value == 0 {
        return 1;
    }
    (64 - (value as u64).leading_zeros()).min(32)
}

/// Applies the span delta when requested. A span of 0 disables delta coding.
fn transform(delta: bool, span: usize, data: &[i32]) -> Vec<i32> {
    if delta && span > 0 {
        delta::encode(data, span)
    } else {
        data.to_vec()
    }
}

fn min_max(values: &[i32]) -> (i32, i32) {
    values
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

/// The element width a range encode of `data` would use.
pub fn range_bits(delta: bool, span: usize, data: &[i32]) -> u32 {
    if data.is_empty() {
        return 1;
    }
    let values = transform(delta, span, data);
    let (min, max) = min_max(&values);
    compute_bits(max as i64 - min as i64)
}

//==================================================================================
// 2. Range Integer Codec
//==================================================================================

/// Range-compresses `data` into `output_buf`. Returns the element width used.
pub fn range_compress_int_array(
    output_buf: &mut Vec<u8>,
    delta: bool,
    span: usize,
    data: &[i32],
) -> Result<u32, FieldPackError> {
    if data.len() > MAX_RANGE_COUNT {
        return Err(FieldPackError::ArrayTooLong {
            len: data.len(),
            max: MAX_RANGE_COUNT,
        });
    }
    let delta = delta && span > 0;
    let values = transform(delta, span, data);
    let bits = range_bits(delta, span, data);

    let seeds = if delta { span.min(data.len()) } else { 0 };
    let mut header = BitPacker::with_capacity(8 + 4 * seeds);
    header.pack(data.len() as i64, COUNT_BITS)?;
    header.pack((bits % 32) as i64, WIDTH_BITS)?;
    if data.is_empty() {
        header.write_stream(output_buf)?;
        return Ok(bits);
    }

    let (min, _) = min_max(&values);
    let shift = min.wrapping_neg();
    header.pack(shift as i64, 32)?;
    for &seed in &data[..seeds] {
        header.pack(seed as i64, 32)?;
    }
    header.write_stream(output_buf)?;

    let mut body = BitPacker::with_capacity((values.len() * bits as usize).div_ceil(8));
    for &v in &values {
        body.pack(v.wrapping_add(shift) as u32 as i64, bits)?;
    }
    body.write_stream(output_buf)?;
    Ok(bits)
}

/// Reverses `range_compress_int_array`. `delta` and `span` must match the encode.
pub fn range_decompress_int_array(
    cursor: &mut Cursor<&[u8]>,
    delta: bool,
    span: usize,
) -> Result<Vec<i32>, FieldPackError> {
    let delta = delta && span > 0;
    let head = read_bytes(cursor, 4, "range header")?;
    let mut unpacker = BitUnpacker::new(head);
    let count = unpacker.unpack_unsigned(COUNT_BITS)? as usize;
    let bits = match unpacker.unpack_unsigned(WIDTH_BITS)? {
        0 => 32,
        b => b,
    };
    if count == 0 {
        return Ok(Vec::new());
    }

    let shift = read_word(cursor, "range shift")? as i32;
    let seeds = if delta { span.min(count) } else { 0 };
    let mut seed_values = Vec::with_capacity(seeds);
    for _ in 0..seeds {
        seed_values.push(read_word(cursor, "range seed")? as i32);
    }

    let body_len = (count * bits as usize).div_ceil(8);
    let body = read_bytes(cursor, body_len, "range elements")?;
    unpacker.reset(body);

    let mut ring = DeltaRing::new(if delta { span } else { 0 });
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let stored = unpacker.unpack_unsigned(bits)? as i32;
        out.push(ring.next(stored.wrapping_sub(shift)));
    }

    if out[..seeds] != seed_values[..] {
        return Err(FieldPackError::CorruptStream(
            "range seeds disagree with decoded leading values".to_string(),
        ));
    }
    Ok(out)
}

fn read_word(cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u32, FieldPackError> {
    let bytes = read_bytes(cursor, 4, what)?;
    BitUnpacker::new(bytes).unpack_unsigned(32)
}

//==================================================================================
// 3. Decimal Float Wrapper
//==================================================================================

fn pow10(power: u8) -> f64 {
    10f64.powi(power as i32)
}

/// Smallest decimal power at which `value` survives a scale/round/unscale trip.
fn decimal_power(value: f32) -> u8 {
    (0..=MAX_DECIMAL_POWER)
        .find(|&p| {
            let scale = pow10(p);
            let back = ((value as f64 * scale).round() / scale) as f32;
            back == value || ((back as f64) - (value as f64)).abs() <= 1e-9
        })
        .unwrap_or(MAX_DECIMAL_POWER)
}

fn scale_with(values: &[f32], power: u8) -> Option<Vec<i32>> {
    let scale = pow10(power);
    values
        .iter()
        .map(|&v| {
            let scaled = (v as f64 * scale).round();
            if scaled >= i32::MIN as f64 && scaled <= i32::MAX as f64 {
                Some(scaled as i32)
            } else {
                None
            }
        })
        .collect()
}

/// Picks one decimal power for the whole array and scales it to integers.
///
/// When the preferred power would overflow `i32`, lower powers are tried and the
/// loss of precision is logged. Non-finite values, or values too large even at
/// power 0, are rejected.
pub fn scale_floats_to_ints(values: &[f32]) -> Result<(u8, Vec<i32>), FieldPackError> {
    if let Some(bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(FieldPackError::ValueOutOfRange(format!(
            "cannot decimal-scale non-finite value {}",
            bad
        )));
    }
    let preferred = values.iter().map(|&v| decimal_power(v)).max().unwrap_or(0);
    for power in (0..=preferred).rev() {
        if let Some(ints) = scale_with(values, power) {
            if power < preferred {
                log::warn!(
                    "decimal scale reduced from 10^{} to 10^{} to fit i32",
                    preferred,
                    power
                );
            }
            return Ok((power, ints));
        }
    }
    Err(FieldPackError::ValueOutOfRange(
        "float magnitude exceeds i32 range even unscaled".to_string(),
    ))
}

/// Writes `byte power` followed by a range-compressed block of the scaled values.
/// Returns the element width used.
pub fn compress_float_array(
    output_buf: &mut Vec<u8>,
    delta: bool,
    span: usize,
    values: &[f32],
) -> Result<u32, FieldPackError> {
    let (power, ints) = scale_floats_to_ints(values)?;
    output_buf.push(power);
    range_compress_int_array(output_buf, delta, span, &ints)
}

/// Reverses `compress_float_array`.
pub fn decompress_float_array(
    cursor: &mut Cursor<&[u8]>,
    delta: bool,
    span: usize,
) -> Result<Vec<f32>, FieldPackError> {
    let power = read_u8(cursor, "decimal power")?;
    if power > MAX_DECIMAL_POWER {
        return Err(FieldPackError::CorruptStream(format!(
            "decimal power {} exceeds {}",
            power, MAX_DECIMAL_POWER
        )));
    }
    let scale = pow10(power);
    let ints = range_decompress_int_array(cursor, delta, span)?;
    Ok(ints.into_iter().map(|v| (v as f64 / scale) as f32).collect())
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn roundtrip(delta: bool, span: usize, data: &[i32]) -> Vec<u8> {
        let mut buf = Vec::new();
        range_compress_int_array(&mut buf, delta, span, data).unwrap();
        let mut cursor = Cursor::new(&buf[..]);
        let back = range_decompress_int_array(&mut cursor, delta, span).unwrap();
        assert_eq!(back, data, "delta={} span={}", delta, span);
        assert_eq!(cursor.position() as usize, buf.len());
        buf
    }

    #[test]
    fn test_compute_bits_boundaries() {
        assert_eq!(compute_bits(0), 1);
        assert_eq!(compute_bits(1), 1);
        assert_eq!(compute_bits(255), 8);
        assert_eq!(compute_bits(256), 9);
        assert_eq!(compute_bits(i32::MAX as i64), 31);
        assert_eq!(compute_bits(u32::MAX as i64), 32);
        assert_eq!(compute_bits(1 << 40), 32);
    }

    #[test]
    fn test_edge_arrays_all_spans() {
        let cases: Vec<Vec<i32>> = vec![
            vec![],
            vec![42],
            vec![-7; 9],
            vec![0, -1, 2, -1, 4, -1, 1, 5, 6, -1],
            vec![i32::MIN, i32::MAX, 0, -1],
        ];
        for data in &cases {
            for span in [0usize, 1, 3, 4] {
                roundtrip(false, span, data);
                roundtrip(true, span, data);
            }
        }
    }

    #[test]
    fn test_empty_record_is_four_bytes() {
        let buf = roundtrip(true, 3, &[]);
        assert_eq!(buf.len(), 4);
    }

    #[test]
    fn test_header_layout() {
        let buf = roundtrip(false, 0, &[5, 6, 7, 8]);
        // count 4 in 27 bits, width 2 in 5 bits
        assert_eq!(&buf[..4], &[0, 0, 0, (4 << 5 | 2) as u8]);
        // shift = -5
        assert_eq!(&buf[4..8], &(-5i32).to_be_bytes());
        // elements 0,1,2,3 at two bits each
        assert_eq!(&buf[8..], &[0b00_01_10_11]);
    }

    #[test]
    fn test_positive_minimum_uses_negative_shift() {
        let buf = roundtrip(false, 0, &[100, 101]);
        assert_eq!(&buf[4..8], &(-100i32).to_be_bytes());
    }

    #[test]
    fn test_delta_writes_seeds() {
        let data = [10, 20, 30, 11, 21, 31];
        let buf = roundtrip(true, 3, &data);
        // header + shift + three seeds
        assert_eq!(&buf[8..12], &10i32.to_be_bytes());
        assert_eq!(&buf[16..20], &30i32.to_be_bytes());
        assert_eq!(range_bits(true, 3, &data), compute_bits(30 - 1));
        assert_eq!(range_bits(false, 3, &data), compute_bits(21));
    }

    #[test]
    fn test_full_width_elements() {
        let data = [i32::MIN, i32::MAX];
        let mut buf = Vec::new();
        let bits = range_compress_int_array(&mut buf, false, 0, &data).unwrap();
        assert_eq!(bits, 32);
        assert_eq!(buf[3] & 0x1F, 0);
        roundtrip(false, 0, &data);
    }

    #[test]
    fn test_random_arrays_roundtrip() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let len = rng.random_range(0..200);
            let spread = rng.random_range(1..1_000_000);
            let data: Vec<i32> = (0..len).map(|_| rng.random_range(-spread..spread)).collect();
            for span in [0usize, 1, 3, 4] {
                roundtrip(span > 0, span, &data);
            }
        }
    }

    #[test]
    fn test_tampered_seed_is_corrupt() {
        let mut buf = Vec::new();
        range_compress_int_array(&mut buf, true, 2, &[3, 4, 5, 6]).unwrap();
        buf[11] ^= 1;
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(
            range_decompress_int_array(&mut cursor, true, 2),
            Err(FieldPackError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_truncated_body_is_corrupt() {
        let mut buf = Vec::new();
        range_compress_int_array(&mut buf, false, 0, &[1, 900, 3, 4000]).unwrap();
        buf.truncate(buf.len() - 1);
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(
            range_decompress_int_array(&mut cursor, false, 0),
            Err(FieldPackError::CorruptStream(_))
        ));
    }

    #[test]
    fn test_decimal_wrapper_concrete_scenario() {
        let values = [1.0f32, 2.0, 3.0, -1.0];
        let mut buf = Vec::new();
        compress_float_array(&mut buf, false, 0, &values).unwrap();
        assert_eq!(buf[0], 0);
        let mut cursor = Cursor::new(&buf[..]);
        let back = decompress_float_array(&mut cursor, false, 0).unwrap();
        for (a, b) in values.iter().zip(&back) {
            assert!((a - b).abs() <= 1e-6);
        }
    }

    #[test]
    fn test_decimal_wrapper_picks_power() {
        let (power, ints) = scale_floats_to_ints(&[0.25, 1.5, -3.125]).unwrap();
        assert_eq!(power, 3);
        assert_eq!(ints, vec![250, 1500, -3125]);

        let values = [0.1f32, 0.37, 12.005, -4.2];
        let mut buf = Vec::new();
        compress_float_array(&mut buf, true, 2, &values).unwrap();
        let mut cursor = Cursor::new(&buf[..]);
        assert_eq!(decompress_float_array(&mut cursor, true, 2).unwrap(), values);
    }

    #[test]
    fn test_decimal_wrapper_reduces_power_on_overflow() {
        // 0.001 wants 10^3, but 1e7 * 10^3 overflows i32.
        let (power, ints) = scale_floats_to_ints(&[1.0e7, 0.001]).unwrap();
        assert_eq!(power, 2);
        assert_eq!(ints, vec![1_000_000_000, 0]);

        assert!(matches!(
            scale_floats_to_ints(&[3.0e10]),
            Err(FieldPackError::ValueOutOfRange(_))
        ));
        assert!(matches!(
            scale_floats_to_ints(&[f32::NAN]),
            Err(FieldPackError::ValueOutOfRange(_))
        ));
    }
}
