//! This module defines shared traits used across different kernels.

use std::io::Cursor;

use num_traits::PrimInt;

use crate::error::FieldPackError;
use crate::utils::{read_i16, read_i32, read_u8};

/// An integer element type that the Huffman array envelopes can carry.
///
/// Arithmetic on the envelope side is always done in `i32`; this trait widens
/// elements into that domain, narrows them back with a range check, and knows
/// the element's big-endian width for the raw fallback layout.
pub trait WireInt: PrimInt + Into<i32> + TryFrom<i32> {
    /// Width in bytes of one raw element on the wire.
    const WIRE_BYTES: usize;

    /// Name used in diagnostics.
    const NAME: &'static str;

    fn widen(self) -> i32 {
        self.into()
    }

    /// Narrows a decoded `i32` back into the element type.
    fn narrow(value: i32) -> Result<Self, FieldPackError> {
        Self::try_from(value).map_err(|_| {
            FieldPackError::CorruptStream(format!(
                "decoded value {} does not fit in {}",
                value,
                Self::NAME
            ))
        })
    }

    fn write_raw(self, output_buf: &mut Vec<u8>);

    fn read_raw(cursor: &mut Cursor<&[u8]>) -> Result<Self, FieldPackError>;
}

// Implement the trait for each supported element width.
macro_rules! impl_wire_int {
    ($T:ty, $bytes:expr, $reader:expr) => {
        impl WireInt for $T {
            const WIRE_BYTES: usize = $bytes;
            const NAME: &'static str = stringify!($T);

            fn write_raw(self, output_buf: &mut Vec<u8>) {
                output_buf.extend_from_slice(&self.to_be_bytes());
            }

            fn read_raw(cursor: &mut Cursor<&[u8]>) -> Result<Self, FieldPackError> {
                let raw = $reader(cursor, concat!("raw ", stringify!($T), " element"))?;
                Ok(raw as $T)
            }
        }
    };
}

impl_wire_int!(i8, 1, read_u8);
impl_wire_int!(i16, 2, read_i16);
impl_wire_int!(i32, 4, read_i32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrow_checks_range() {
        assert_eq!(<i8 as WireInt>::narrow(-128).unwrap(), -128i8);
        assert!(<i8 as WireInt>::narrow(128).is_err());
        assert!(<i16 as WireInt>::narrow(40_000).is_err());
    }

    #[test]
    fn test_raw_layout_widths() {
        let mut buf = Vec::new();
        (-2i8).write_raw(&mut buf);
        (-2i16).write_raw(&mut buf);
        (-2i32).write_raw(&mut buf);
        assert_eq!(buf, vec![0xFE, 0xFF, 0xFE, 0xFF, 0xFF, 0xFF, 0xFE]);

        let mut cursor = Cursor::new(&buf[..]);
        assert_eq!(i8::read_raw(&mut cursor).unwrap(), -2);
        assert_eq!(i16::read_raw(&mut cursor).unwrap(), -2);
        assert_eq!(i32::read_raw(&mut cursor).unwrap(), -2);
    }
}
