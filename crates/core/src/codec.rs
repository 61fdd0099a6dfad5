//! Raw value encoding for the save/load path
//!
//! The persisted unique-value format is a flat concatenation of records with
//! no length prefix and no separators:
//!
//! - Numeric values are written in their fixed-size native layout, so a
//!   record boundary is `size_of::<T>()`.
//! - Strings are written as their UTF-8 bytes followed by a NUL terminator.
//!
//! `write_to` and `read_from` are exact inverses on a given platform.

use byteorder::{ByteOrder, NativeEndian, WriteBytesExt};
use std::io::{self, Write};

/// Why a record could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes remain than one full record needs
    Truncated {
        /// Bytes the record needs (a lower bound for terminated encodings)
        needed: usize,
    },
    /// The record bytes do not form a valid value
    Malformed(&'static str),
}

/// Raw encoding of a stored value
pub trait ValueCodec: Sized {
    /// Number of bytes `write_to` emits for this value
    fn encoded_len(&self) -> usize;

    /// Emit the raw record for this value
    fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()>;

    /// Decode one record from the front of `src`
    ///
    /// Returns the value and the number of bytes consumed.
    fn read_from(src: &[u8]) -> Result<(Self, usize), DecodeError>;
}

macro_rules! impl_value_codec_native {
    ($($t:ty => $write:ident, $read:ident);* $(;)?) => {
        $(
            impl ValueCodec for $t {
                #[inline]
                fn encoded_len(&self) -> usize {
                    std::mem::size_of::<$t>()
                }

                fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
                    writer.$write::<NativeEndian>(*self)
                }

                fn read_from(src: &[u8]) -> Result<(Self, usize), DecodeError> {
                    const SIZE: usize = std::mem::size_of::<$t>();
                    if src.len() < SIZE {
                        return Err(DecodeError::Truncated { needed: SIZE });
                    }
                    Ok((NativeEndian::$read(&src[..SIZE]), SIZE))
                }
            }
        )*
    };
}

impl_value_codec_native! {
    i16 => write_i16, read_i16;
    i32 => write_i32, read_i32;
    i64 => write_i64, read_i64;
    u16 => write_u16, read_u16;
    u32 => write_u32, read_u32;
    u64 => write_u64, read_u64;
    f32 => write_f32, read_f32;
    f64 => write_f64, read_f64;
}

impl ValueCodec for u8 {
    fn encoded_len(&self) -> usize {
        1
    }

    fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(*self)
    }

    fn read_from(src: &[u8]) -> Result<(Self, usize), DecodeError> {
        match src.first() {
            Some(&b) => Ok((b, 1)),
            None => Err(DecodeError::Truncated { needed: 1 }),
        }
    }
}

impl ValueCodec for i8 {
    fn encoded_len(&self) -> usize {
        1
    }

    fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i8(*self)
    }

    fn read_from(src: &[u8]) -> Result<(Self, usize), DecodeError> {
        match src.first() {
            Some(&b) => Ok((b as i8, 1)),
            None => Err(DecodeError::Truncated { needed: 1 }),
        }
    }
}

impl ValueCodec for String {
    fn encoded_len(&self) -> usize {
        self.len() + 1
    }

    fn write_to<W: Write + ?Sized>(&self, writer: &mut W) -> io::Result<()> {
        if self.as_bytes().contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "string value contains NUL byte",
            ));
        }
        writer.write_all(self.as_bytes())?;
        writer.write_u8(0)
    }

    fn read_from(src: &[u8]) -> Result<(Self, usize), DecodeError> {
        let end = src
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::Truncated {
                needed: src.len() + 1,
            })?;
        let s = std::str::from_utf8(&src[..end])
            .map_err(|_| DecodeError::Malformed("invalid UTF-8"))?;
        Ok((s.to_string(), end + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_size_layout_is_native() {
        let mut buf = Vec::new();
        0x0102_0304u32.write_to(&mut buf).unwrap();
        assert_eq!(buf, 0x0102_0304u32.to_ne_bytes());

        let (v, used) = u32::read_from(&buf).unwrap();
        assert_eq!(v, 0x0102_0304);
        assert_eq!(used, 4);
    }

    #[test]
    fn test_fixed_size_truncated() {
        assert_eq!(
            i64::read_from(&[1, 2, 3]),
            Err(DecodeError::Truncated { needed: 8 })
        );
        assert_eq!(u8::read_from(&[]), Err(DecodeError::Truncated { needed: 1 }));
    }

    #[test]
    fn test_float_bits_preserved() {
        let mut buf = Vec::new();
        (-0.0f64).write_to(&mut buf).unwrap();
        let (v, _) = f64::read_from(&buf).unwrap();
        assert!(v.is_sign_negative());
        assert_eq!(v, 0.0);
    }

    #[test]
    fn test_string_nul_terminated() {
        let mut buf = Vec::new();
        "apple".to_string().write_to(&mut buf).unwrap();
        "pie".to_string().write_to(&mut buf).unwrap();
        assert_eq!(buf, b"apple\0pie\0");

        let (first, used) = String::read_from(&buf).unwrap();
        assert_eq!(first, "apple");
        assert_eq!(used, 6);
        let (second, _) = String::read_from(&buf[used..]).unwrap();
        assert_eq!(second, "pie");
    }

    #[test]
    fn test_string_missing_terminator() {
        assert!(matches!(
            String::read_from(b"abc"),
            Err(DecodeError::Truncated { .. })
        ));
    }

    #[test]
    fn test_string_invalid_utf8() {
        assert_eq!(
            String::read_from(&[0xff, 0xfe, 0]),
            Err(DecodeError::Malformed("invalid UTF-8"))
        );
    }

    #[test]
    fn test_string_with_nul_rejected() {
        let mut buf = Vec::new();
        let err = "a\0b".to_string().write_to(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
