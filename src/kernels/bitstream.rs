//! This module contains the bit-addressable stream that every codec in the crate
//! is built on.
//!
//! `BitPacker` appends values of 0..=32 bits, most-significant-bit first, with no
//! byte alignment between values. `BitUnpacker` reads them back from a borrowed
//! slice. Both are backed by `bitvec` with `Msb0` ordering, so the byte layout is
//! exactly "first bit written is the high bit of byte 0".
//!
//! The packer's capacity is fixed at construction from an upper estimate of the
//! encoded size; exceeding it is an `OutOfCapacity` error, never a reallocation.

use std::io::Write;

use bitvec::prelude::*;

use crate::error::FieldPackError;

/// Largest width a single `pack`/`unpack` call accepts.
pub const MAX_FIELD_BITS: u32 = 32;

fn check_width(num_bits: u32) -> Result<(), FieldPackError> {
    if num_bits > MAX_FIELD_BITS {
        return Err(FieldPackError::InvalidBitWidth(num_bits));
    }
    Ok(())
}

//==================================================================================
// 1. Write Side
//==================================================================================

/// The write side of the bit stream.
#[derive(Debug, Clone)]
pub struct BitPacker {
    bits: BitVec<u8, Msb0>,
    capacity_bits: usize,
}

impl BitPacker {
    /// Creates a packer that may hold at most `capacity_bytes` bytes.
    pub fn with_capacity(capacity_bytes: usize) -> Self {
        let capacity_bits = capacity_bytes.saturating_mul(8);
        Self {
            bits: BitVec::with_capacity(capacity_bits),
            capacity_bits,
        }
    }

    /// Appends the low `num_bits` bits of `value`, MSB first.
    ///
    /// Bits of `value` above `num_bits` are ignored. A zero-width pack is a no-op.
    pub fn pack(&mut self, value: i64, num_bits: u32) -> Result<(), FieldPackError> {
        check_width(num_bits)?;
        let n = num_bits as usize;
        let requested = self.bits.len() + n;
        if requested > self.capacity_bits {
            return Err(FieldPackError::OutOfCapacity {
                requested,
                capacity: self.capacity_bits,
            });
        }
        let word = value as u64;
        self.bits
            .extend_from_bitslice(&word.view_bits::<Msb0>()[64 - n..]);
        Ok(())
    }

    /// Number of bits written so far.
    pub fn bits_written(&self) -> usize {
        self.bits.len()
    }

    /// Number of bytes the written bits occupy, `ceil(bits / 8)`.
    pub fn size(&self) -> usize {
        self.bits.len().div_ceil(8)
    }

    /// Copies exactly `size()` bytes into `dest`.
    pub fn copy_result(&self, dest: &mut [u8]) -> Result<(), FieldPackError> {
        let size = self.size();
        if dest.len() < size {
            return Err(FieldPackError::OutOfCapacity {
                requested: size * 8,
                capacity: dest.len() * 8,
            });
        }
        let raw = self.bits.as_raw_slice();
        dest[..size].copy_from_slice(&raw[..size]);
        // The last byte may hold stale bits past the cursor; clear them.
        let tail = self.bits.len() % 8;
        if tail != 0 {
            dest[size - 1] &= 0xFFu8 << (8 - tail);
        }
        Ok(())
    }

    /// Consumes the packer, returning the written bytes with zeroed padding.
    pub fn into_bytes(self) -> Vec<u8> {
        let size = self.size();
        let tail = self.bits.len() % 8;
        let mut out = self.bits.into_vec();
        out.truncate(size);
        if tail != 0 {
            if let Some(last) = out.last_mut() {
                *last &= 0xFFu8 << (8 - tail);
            }
        }
        out
    }

    /// Writes `size()` bytes to `writer`.
    pub fn write_stream<W: Write>(&self, writer: &mut W) -> Result<(), FieldPackError> {
        let mut out = vec![0u8; self.size()];
        self.copy_result(&mut out)?;
        writer.write_all(&out)?;
        Ok(())
    }
}

//==================================================================================
// 2. Read Side
//==================================================================================

/// The read side of the bit stream. Borrows its source buffer.
#[derive(Debug, Clone)]
pub struct BitUnpacker<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    pos: usize,
}

impl<'a> BitUnpacker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            bits: buf.view_bits::<Msb0>(),
            pos: 0,
        }
    }

    /// Rebinds to a new buffer and rewinds to its first bit.
    pub fn reset(&mut self, buf: &'a [u8]) {
        self.bits = buf.view_bits::<Msb0>();
        self.pos = 0;
    }

    /// Bits left to read.
    pub fn remaining(&self) -> usize {
        self.bits.len() - self.pos
    }

    /// Bits consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Reads `num_bits` bits as an unsigned value.
    pub fn unpack_unsigned(&mut self, num_bits: u32) -> Result<u32, FieldPackError> {
        check_width(num_bits)?;
        let n = num_bits as usize;
        if n > self.remaining() {
            return Err(FieldPackError::InsufficientBits {
                requested: n,
                remaining: self.remaining(),
            });
        }
        let mut value = 0u32;
        for bit in self.bits[self.pos..self.pos + n].iter().by_vals() {
            value = (value << 1) | bit as u32;
        }
        self.pos += n;
        Ok(value)
    }

    /// Reads `num_bits` bits, widening with the sign bit.
    ///
    /// If the first bit read is 1, every bit above `num_bits` is set in the
    /// result. Values meant to be unsigned must either be packed pre-shifted
    /// into a range whose top bit is clear or be read with `unpack_unsigned`.
    pub fn unpack(&mut self, num_bits: u32) -> Result<i32, FieldPackError> {
        let raw = self.unpack_unsigned(num_bits)?;
        if num_bits == 0 || num_bits >= 32 {
            return Ok(raw as i32);
        }
        let sign = (raw >> (num_bits - 1)) & 1;
        if sign == 1 {
            Ok((raw | (u32::MAX << num_bits)) as i32)
        } else {
            Ok(raw as i32)
        }
    }

    /// Skips to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let aligned = self.pos.div_ceil(8) * 8;
        self.pos = aligned.min(self.bits.len());
    }
}

//==================================================================================
// 3. Unit Tests
//==================================================================================
