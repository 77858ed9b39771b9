//! This module contains the fixed-stride delta transform used by the range codec
//! and the Huffman envelopes.
//!
//! With a span of `s`, element `i` is replaced by `data[i] - data[i - s]`; the
//! first `s` elements are deltas from zero and so pass through unchanged. A span
//! of 0 means no delta coding. All arithmetic wraps, so the transform is exact
//! for every input, including values near the type's limits.

use num_traits::{PrimInt, WrappingAdd, WrappingSub};

//==================================================================================
// 1. Encoding
//==================================================================================

/// Returns the span deltas of `data`. Inputs no longer than `span` come back
/// unchanged.
pub fn encode<T>(data: &[T], span: usize) -> Vec<T>
where
    T: PrimInt + WrappingSub,
{
    if span == 0 || data.len() <= span {
        return data.to_vec();
    }
    let mut deltas = Vec::with_capacity(data.len());
    deltas.extend_from_slice(&data[..span]);
    deltas.extend(
        data[span..]
            .iter()
            .zip(data)
            .map(|(current, previous)| current.wrapping_sub(previous)),
    );
    deltas
}

//==================================================================================
// 2. Decoding
//==================================================================================

/// Streaming decoder that rebuilds values one delta at a time from a ring of
/// the last `span` outputs.
#[derive(Debug, Clone)]
pub struct DeltaRing<T> {
    last: Vec<T>,
    slot: usize,
}

impl<T> DeltaRing<T>
where
    T: PrimInt + WrappingAdd,
{
    pub fn new(span: usize) -> Self {
        Self {
            last: vec![T::zero(); span],
            slot: 0,
        }
    }

    /// Consumes one delta and returns the reconstructed value. With a span of 0
    /// the delta is returned as is.
    pub fn next(&mut self, delta: T) -> T {
        if self.last.is_empty() {
            return delta;
        }
        let value = delta.wrapping_add(&self.last[self.slot]);
        self.last[self.slot] = value;
        self.slot = (self.slot + 1) % self.last.len();
        value
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild<T: PrimInt + WrappingAdd>(deltas: &[T], span: usize) -> Vec<T> {
        let mut ring = DeltaRing::new(span);
        deltas.iter().map(|&d| ring.next(d)).collect()
    }

    #[test]
    fn test_span_three_deltas() {
        let original = vec![10, 20, 30, 11, 22, 33, 9, 24, 30];
        let encoded = encode(&original, 3);
        assert_eq!(encoded, vec![10, 20, 30, 1, 2, 3, -2, 2, -3]);
        assert_eq!(rebuild(&encoded, 3), original);
    }

    #[test]
    fn test_face_index_stride() {
        // Quad faces with a -1 terminator: every fourth delta is zero.
        let faces = vec![0, 1, 2, -1, 4, 5, 6, -1, 8, 9, 10, -1];
        let encoded = encode(&faces, 4);
        assert_eq!(&encoded[4..], &[4, 4, 4, 0, 4, 4, 4, 0]);
        assert_eq!(rebuild(&encoded, 4), faces);
    }

    #[test]
    fn test_span_zero_and_short_inputs_pass_through() {
        let data = vec![4i32, -7, 9];
        assert_eq!(encode(&data, 0), data);
        assert_eq!(encode(&data, 3), data);
        assert_eq!(encode(&data, 5), data);
        assert_eq!(rebuild(&data, 5), data);
        assert!(encode::<i32>(&[], 2).is_empty());

        let mut passthrough = DeltaRing::<i32>::new(0);
        assert_eq!(passthrough.next(17), 17);
    }

    #[test]
    fn test_wrapping_at_limits() {
        let original = vec![i32::MAX, i32::MIN, i32::MAX];
        let encoded = encode(&original, 1);
        assert_eq!(encoded, vec![i32::MAX, 1, -1]);
        assert_eq!(rebuild(&encoded, 1), original);

        let bytes: Vec<i8> = vec![-128, 127, -128, 127];
        assert_eq!(encode(&bytes, 1), vec![-128, -1, 1, -1]);
        assert_eq!(rebuild(&encode(&bytes, 1), 1), bytes);
    }

    #[test]
    fn test_ring_restarts_per_instance() {
        let original: Vec<i16> = vec![3, -1, 4, -1, 5, -1, 9, -1, 2, -1];
        let deltas = encode(&original, 2);
        assert_eq!(rebuild(&deltas, 2), original);
        // A fresh ring starts from zero again.
        assert_eq!(rebuild(&deltas[..2], 2), vec![3, -1]);
    }
}
