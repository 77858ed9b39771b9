//! This module contains the reduced-precision float codec.
//!
//! A `FixedFloatCodec` maps an IEEE-754 `f32` onto a `1 + e + m` bit code:
//! a sign bit, an `e`-bit re-biased exponent and the top `m` bits of the
//! mantissa. Zero (and anything below the smallest normal `f32`) maps to the
//! all-zero code. Exponents outside the narrow range are clamped and reported
//! through `EncodeOutcome::clamped`; the kernel never logs or fails on a clamp,
//! the caller decides.
//!
//! `find_float_params` picks the narrowest `(e, m)` that keeps a value inside an
//! absolute error tolerance. The search measures truncation error; rounding to
//! nearest never does worse, so a codec built from the result honours the
//! tolerance in both modes.

use crate::error::FieldPackError;

const NATIVE_EXPONENT_BITS: u32 = 8;
const NATIVE_MANTISSA_BITS: u32 = 23;
const NATIVE_BIAS: i32 = 127;
const NATIVE_MIN_EXPONENT: i32 = -126;
const NATIVE_MAX_EXPONENT: i32 = 127;

//==================================================================================
// 1. Types
//==================================================================================

/// The result of encoding one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOutcome {
    pub code: u32,
    /// True when the exponent had to be clamped into the codec's range.
    pub clamped: bool,
}

/// Bit widths chosen by the parameter search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloatParams {
    pub exponent_bits: u32,
    pub mantissa_bits: u32,
    pub sign_needed: bool,
}

impl FloatParams {
    /// Width of one packed code including the sign bit.
    pub fn code_bits(&self) -> u32 {
        1 + self.exponent_bits + self.mantissa_bits
    }

    /// Componentwise maximum of two parameter sets.
    pub fn merge(self, other: FloatParams) -> FloatParams {
        FloatParams {
            exponent_bits: self.exponent_bits.max(other.exponent_bits),
            mantissa_bits: self.mantissa_bits.max(other.mantissa_bits),
            sign_needed: self.sign_needed || other.sign_needed,
        }
    }
}

/// Encoder/decoder for one `(exponent_bits, mantissa_bits)` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedFloatCodec {
    exponent_bits: u32,
    mantissa_bits: u32,
    sign_shift: u32,
    exponent_mask: u32,
    mantissa_mask: u32,
    bias: i32,
    /// Smallest and largest biased exponent field values used for non-zero codes.
    min_biased: i32,
    max_biased: i32,
}

//==================================================================================
// 2. Codec
//==================================================================================

impl FixedFloatCodec {
    /// Builds a codec, rejecting widths beyond the native `f32` layout.
    pub fn new(exponent_bits: u32, mantissa_bits: u32) -> Result<Self, FieldPackError> {
        if exponent_bits > NATIVE_EXPONENT_BITS || mantissa_bits > NATIVE_MANTISSA_BITS {
            return Err(FieldPackError::InvalidFloatParams {
                exponent: exponent_bits,
                mantissa: mantissa_bits,
            });
        }
        Ok(Self::build(exponent_bits, mantissa_bits))
    }

    /// Builds a codec, clamping oversized widths to 8/23 with a warning.
    pub fn saturating(exponent_bits: u32, mantissa_bits: u32) -> Self {
        if exponent_bits > NATIVE_EXPONENT_BITS || mantissa_bits > NATIVE_MANTISSA_BITS {
            log::warn!(
                "float codec widths e={} m={} exceed f32; clamping to e={} m={}",
                exponent_bits,
                mantissa_bits,
                exponent_bits.min(NATIVE_EXPONENT_BITS),
                mantissa_bits.min(NATIVE_MANTISSA_BITS)
            );
        }
        Self::build(
            exponent_bits.min(NATIVE_EXPONENT_BITS),
            mantissa_bits.min(NATIVE_MANTISSA_BITS),
        )
    }

    pub fn from_params(params: FloatParams) -> Result<Self, FieldPackError> {
        Self::new(params.exponent_bits, params.mantissa_bits)
    }

    fn build(exponent_bits: u32, mantissa_bits: u32) -> Self {
        let (bias, min_biased, max_biased) = if exponent_bits == 0 {
            // No exponent field: only zero is representable.
            (0, 1, 0)
        } else {
            let bias = (1i32 << (exponent_bits - 1)) - 1;
            let field_max = (1i32 << exponent_bits) - 1;
            (
                bias,
                (NATIVE_MIN_EXPONENT + bias).max(1),
                (NATIVE_MAX_EXPONENT + bias).min(field_max),
            )
        };
        Self {
            exponent_bits,
            mantissa_bits,
            sign_shift: exponent_bits + mantissa_bits,
            exponent_mask: (1u32 << exponent_bits) - 1,
            mantissa_mask: (1u32 << mantissa_bits) - 1,
            bias,
            min_biased,
            max_biased,
        }
    }

    pub fn exponent_bits(&self) -> u32 {
        self.exponent_bits
    }

    pub fn mantissa_bits(&self) -> u32 {
        self.mantissa_bits
    }

    /// Width of a code including the sign bit.
    pub fn code_bits(&self) -> u32 {
        self.sign_shift + 1
    }

    fn representable(&self) -> bool {
        self.min_biased <= self.max_biased
    }

    /// Encodes one value. Rounds the mantissa to nearest when `rounding` is set,
    /// otherwise truncates.
    pub fn encode(&self, value: f32, rounding: bool) -> EncodeOutcome {
        let bits: u32 = bytemuck::cast(value);
        let sign = bits >> 31;
        let native_exponent = ((bits >> NATIVE_MANTISSA_BITS) & 0xFF) as i32;
        let native_mantissa = bits & 0x7F_FFFF;

        // Zero and subnormals flush to the zero code.
        if native_exponent == 0 {
            return EncodeOutcome { code: 0, clamped: false };
        }
        if value.is_nan() || !self.representable() {
            return EncodeOutcome { code: 0, clamped: true };
        }

        let drop = NATIVE_MANTISSA_BITS - self.mantissa_bits;
        let mut exponent = native_exponent - NATIVE_BIAS;
        let mut carried = false;
        let mut mantissa = if rounding && drop > 0 {
            let rounded = (native_mantissa + (1 << (drop - 1))) >> drop;
            if rounded > self.mantissa_mask {
                // Carry out of the mantissa bumps the exponent.
                exponent += 1;
                carried = true;
                0
            } else {
                rounded
            }
        } else {
            native_mantissa >> drop
        };

        let mut biased = exponent + self.bias;
        let mut clamped = false;
        if carried && biased == self.max_biased + 1 && !value.is_infinite() {
            // The unrounded value fits: keep the truncated (all-ones) mantissa.
            biased = self.max_biased;
            mantissa = self.mantissa_mask;
        } else if value.is_infinite() || biased > self.max_biased {
            biased = self.max_biased;
            mantissa = self.mantissa_mask;
            clamped = true;
        } else if biased < self.min_biased {
            clamped = true;
            if biased == self.min_biased - 1 {
                biased = self.min_biased;
                mantissa = 0;
            } else {
                return EncodeOutcome { code: 0, clamped };
            }
        }

        let code = (sign << self.sign_shift) | ((biased as u32) << self.mantissa_bits) | mantissa;
        EncodeOutcome { code, clamped }
    }

    /// Decodes a code. With `signed == false` the sign bit is ignored and the
    /// result is never negative.
    pub fn decode(&self, code: u32, signed: bool) -> f32 {
        let biased = ((code >> self.mantissa_bits) & self.exponent_mask) as i32;
        if biased == 0 || !self.representable() {
            return 0.0;
        }
        let biased = biased.clamp(self.min_biased, self.max_biased);
        let mantissa = code & self.mantissa_mask;
        let sign = if signed {
            (code >> self.sign_shift) & 1
        } else {
            0
        };

        let native_exponent = (biased - self.bias + NATIVE_BIAS) as u32;
        let native_mantissa = mantissa << (NATIVE_MANTISSA_BITS - self.mantissa_bits);
        let bits = (sign << 31) | (native_exponent << NATIVE_MANTISSA_BITS) | native_mantissa;
        bytemuck::cast(bits)
    }
}

//==================================================================================
// 3. Parameter Search
//==================================================================================

/// Smallest exponent width whose unbiased range `[1 - bias, bias + 1]` holds
/// `exponent`.
fn exponent_bits_for(exponent: i32) -> u32 {
    (1..=NATIVE_EXPONENT_BITS)
        .find(|&e| {
            let bias = (1i32 << (e - 1)) - 1;
            exponent >= (1 - bias).max(NATIVE_MIN_EXPONENT)
                && exponent <= (bias + 1).min(NATIVE_MAX_EXPONENT)
        })
        .unwrap_or(NATIVE_EXPONENT_BITS)
}

fn within(codec: &FixedFloatCodec, value: f32, tolerance: f32) -> bool {
    let decoded = codec.decode(codec.encode(value, false).code, true);
    ((decoded as f64) - (value as f64)).abs() <= tolerance as f64
}

/// Finds the narrowest widths that reproduce `value` within `tolerance`.
pub fn find_float_params(value: f32, tolerance: f32) -> FloatParams {
    let bits: u32 = bytemuck::cast(value);
    let native_exponent = ((bits >> NATIVE_MANTISSA_BITS) & 0xFF) as i32;
    if native_exponent == 0 {
        return FloatParams::default();
    }
    let sign_needed = bits >> 31 == 1;
    if !value.is_finite() {
        return FloatParams {
            exponent_bits: NATIVE_EXPONENT_BITS,
            mantissa_bits: NATIVE_MANTISSA_BITS,
            sign_needed,
        };
    }

    let exponent_bits = exponent_bits_for(native_exponent - NATIVE_BIAS);
    let mantissa = bits & 0x7F_FFFF;
    // Mantissa widths at or above this are exact.
    let exact = if mantissa == 0 {
        0
    } else {
        NATIVE_MANTISSA_BITS - mantissa.trailing_zeros()
    };

    let mut mantissa_bits = exact;
    while mantissa_bits > 0 {
        let codec = FixedFloatCodec::build(exponent_bits, mantissa_bits - 1);
        if !within(&codec, value, tolerance) {
            break;
        }
        mantissa_bits -= 1;
    }

    FloatParams {
        exponent_bits,
        mantissa_bits,
        sign_needed,
    }
}

/// Array variant: the componentwise maximum over all values.
pub fn find_float_params_array(values: &[f32], tolerance: f32) -> FloatParams {
    values
        .iter()
        .map(|&v| find_float_params(v, tolerance))
        .fold(FloatParams::default(), FloatParams::merge)
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_zero_is_zero_code() {
        let codec = FixedFloatCodec::new(5, 10).unwrap();
        assert_eq!(codec.encode(0.0, true), EncodeOutcome { code: 0, clamped: false });
        assert_eq!(codec.encode(-0.0, true).code, 0);
        assert_eq!(codec.decode(0, true), 0.0);
    }

    #[test]
    fn test_full_width_is_lossless() {
        let codec = FixedFloatCodec::new(8, 23).unwrap();
        for v in [1.0f32, -1.5, 3.141_592_7, 1.0e-30, -6.5e30, f32::MAX, f32::MIN_POSITIVE] {
            let out = codec.encode(v, true);
            assert!(!out.clamped);
            assert_eq!(codec.decode(out.code, true), v);
        }
    }

    #[test]
    fn test_code_layout() {
        // e=3 (bias 3), m=2: -1.5 = -1.1b * 2^0 -> sign 1, exp 3, mantissa 10b.
        let codec = FixedFloatCodec::new(3, 2).unwrap();
        let out = codec.encode(-1.5, false);
        assert_eq!(out.code, 0b1_011_10);
        assert_eq!(codec.decode(out.code, true), -1.5);
        assert_eq!(codec.decode(out.code, false), 1.5);
        assert_eq!(codec.code_bits(), 6);
    }

    #[test]
    fn test_rounding_carries_into_exponent() {
        let codec = FixedFloatCodec::new(4, 2).unwrap();
        // 1.9375 = 1.1111b; two mantissa bits round up to 10.0b.
        let rounded = codec.encode(1.9375, true);
        assert_eq!(codec.decode(rounded.code, true), 2.0);
        let truncated = codec.encode(1.9375, false);
        assert_eq!(codec.decode(truncated.code, true), 1.75);
    }

    #[test]
    fn test_carry_at_top_of_range_keeps_truncated_code() {
        // e=1 holds exponent 1 only; 3.9999 rounds up to 4.0, which does not fit.
        let codec = FixedFloatCodec::new(1, 11).unwrap();
        let out = codec.encode(3.9999, true);
        assert!(!out.clamped);
        assert_eq!(out.code, codec.encode(3.9999, false).code);
        assert!((codec.decode(out.code, true) - 3.9999).abs() < 1e-3);

        // A value that is itself out of range still clamps.
        assert!(codec.encode(4.5, true).clamped);
    }

    #[test]
    fn test_clamps_above_range() {
        // e=2: unbiased exponents 0..=2, so the largest value is 1.11b * 4 = 7.
        let codec = FixedFloatCodec::new(2, 2).unwrap();
        let out = codec.encode(100.0, true);
        assert!(out.clamped);
        assert_eq!(codec.decode(out.code, true), 7.0);
        let out = codec.encode(f32::NEG_INFINITY, true);
        assert!(out.clamped);
        assert_eq!(codec.decode(out.code, true), -7.0);
    }

    #[test]
    fn test_clamps_below_range() {
        // e=2: smallest exponent is 0, i.e. 1.0.
        let codec = FixedFloatCodec::new(2, 3).unwrap();
        let one_notch = codec.encode(0.75, true);
        assert!(one_notch.clamped);
        assert_eq!(codec.decode(one_notch.code, true), 1.0);

        let far_below = codec.encode(0.1, true);
        assert_eq!(far_below, EncodeOutcome { code: 0, clamped: true });
    }

    #[test]
    fn test_subnormals_flush_to_zero() {
        let codec = FixedFloatCodec::new(8, 23).unwrap();
        let tiny = f32::from_bits(1);
        assert_eq!(codec.encode(tiny, true), EncodeOutcome { code: 0, clamped: false });
        assert_eq!(find_float_params(tiny, 0.0), FloatParams::default());
    }

    #[test]
    fn test_invalid_widths() {
        assert!(matches!(
            FixedFloatCodec::new(9, 10),
            Err(FieldPackError::InvalidFloatParams { exponent: 9, mantissa: 10 })
        ));
        let codec = FixedFloatCodec::saturating(12, 40);
        assert_eq!((codec.exponent_bits(), codec.mantissa_bits()), (8, 23));
    }

    #[test]
    fn test_zero_exponent_codec_only_holds_zero() {
        let codec = FixedFloatCodec::new(0, 0).unwrap();
        assert_eq!(codec.encode(0.0, true).code, 0);
        assert!(codec.encode(1.0, true).clamped);
        assert_eq!(codec.decode(0b1, true), 0.0);
    }

    #[test]
    fn test_exponent_bins() {
        assert_eq!(find_float_params(3.0, 0.0).exponent_bits, 1); // 2^1
        assert_eq!(find_float_params(1.0, 0.0).exponent_bits, 2); // 2^0
        assert_eq!(find_float_params(0.5, 0.0).exponent_bits, 3); // 2^-1
        assert_eq!(find_float_params(20.0, 0.0).exponent_bits, 3); // 2^4
        assert_eq!(find_float_params(40.0, 0.0).exponent_bits, 4); // 2^5
        assert_eq!(find_float_params(1.0e-30, 0.0).exponent_bits, 8);
    }

    #[test]
    fn test_mantissa_search() {
        let exact = find_float_params(1.5, 0.0);
        assert_eq!(exact.mantissa_bits, 1);
        assert!(!exact.sign_needed);

        let p = find_float_params(-1.2345, 0.01);
        assert!(p.sign_needed);
        let codec = FixedFloatCodec::from_params(p).unwrap();
        let back = codec.decode(codec.encode(-1.2345, false).code, true);
        assert!((back - -1.2345).abs() <= 0.01);
        // One bit fewer breaks the tolerance.
        let narrower = FixedFloatCodec::new(p.exponent_bits, p.mantissa_bits - 1).unwrap();
        let back = narrower.decode(narrower.encode(-1.2345, false).code, true);
        assert!((back - -1.2345).abs() > 0.01);
    }

    #[test]
    fn test_roundtrip_within_tolerance_random_corpus() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for &tolerance in &[1.0e-1f32, 1.0e-3, 1.0e-5] {
            let corpus: Vec<f32> = (0..500).map(|_| rng.random_range(-250.0f32..250.0)).collect();
            let params = find_float_params_array(&corpus, tolerance);
            let codec = FixedFloatCodec::from_params(params).unwrap();
            for rounding in [true, false] {
                for &x in &corpus {
                    let out = codec.encode(x, rounding);
                    assert!(!out.clamped, "unexpected clamp for {}", x);
                    let back = codec.decode(out.code, true);
                    assert!(
                        ((back as f64) - (x as f64)).abs() <= tolerance as f64,
                        "x={} back={} tol={}",
                        x,
                        back,
                        tolerance
                    );
                }
            }
        }
    }
}
