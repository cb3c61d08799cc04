use std::io::{Read, Write};

use thiserror::Error;

/// Errors raised while encoding or decoding values.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input does not parse as the expected wire form.
    #[error("corrupted input - {0}")]
    CorruptedInput(&'static str),
    #[error("i/o error - {0}")]
    Io(#[from] std::io::Error),
}

/// A value the byte codec can round-trip: `deserialize(serialize(x))`
/// yields a value equal to `x`.
pub trait Serializable: Sized {
    fn serialize<W: Write>(&self, w: &mut W) -> Result<(), CodecError>;
    fn deserialize<R: Read>(r: &mut R) -> Result<Self, CodecError>;
}

/// `read_exact` that reports a short read as corrupted input instead of
/// a bare i/o error.
pub fn read_bytes<R: Read>(
    r: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<(), CodecError> {
    r.read_exact(buf).map_err(|err| match err.kind() {
        std::io::ErrorKind::UnexpectedEof => CodecError::CorruptedInput(what),
        _ => CodecError::Io(err),
    })
}

/// Write an unsigned LEB128 varint.
pub fn write_varint<W: Write>(w: &mut W, mut v: u64) -> Result<(), CodecError> {
    loop {
        let mut byte = (v & 0x7f) as u8;
        v >>= 7;
        if v != 0 {
            byte |= 0x80;
        }
        w.write_all(&[byte])?;
        if v == 0 {
            return Ok(());
        }
    }
}

/// Read an unsigned LEB128 varint, at most ten bytes.
pub fn read_varint<R: Read>(r: &mut R) -> Result<u64, CodecError> {
    let mut v: u64 = 0;
    let mut shift = 0;
    loop {
        let mut byte = [0u8; 1];
        read_bytes(r, &mut byte, "truncated varint")?;
        if shift == 63 && (byte[0] & 0x7f) > 1 {
            return Err(CodecError::CorruptedInput("varint overflow"));
        }
        v |= ((byte[0] & 0x7f) as u64) << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(v);
        }
        shift += 7;
        if shift > 63 {
            return Err(CodecError::CorruptedInput("varint overflow"));
        }
    }
}

macro_rules! serializable_int {
    ($ty:ty, $what:expr) => {
        impl Serializable for $ty {
            fn serialize<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
                w.write_all(&self.to_le_bytes())?;
                Ok(())
            }

            fn deserialize<R: Read>(r: &mut R) -> Result<Self, CodecError> {
                let mut buf = [0u8; std::mem::size_of::<$ty>()];
                read_bytes(r, &mut buf, $what)?;
                Ok(<$ty>::from_le_bytes(buf))
            }
        }
    };
}

serializable_int!(u8, "truncated u8");
serializable_int!(u16, "truncated u16");
serializable_int!(u32, "truncated u32");
serializable_int!(u64, "truncated u64");
serializable_int!(i64, "truncated i64");

impl<T: Serializable> Serializable for Vec<T> {
    fn serialize<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        write_varint(w, self.len() as u64)?;
        for item in self {
            item.serialize(w)?;
        }
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        let count = read_varint(r)? as usize;
        // cap the pre-allocation, the count is attacker controlled
        let mut out = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            out.push(T::deserialize(r)?);
        }
        Ok(out)
    }
}

impl Serializable for String {
    fn serialize<W: Write>(&self, w: &mut W) -> Result<(), CodecError> {
        write_varint(w, self.len() as u64)?;
        w.write_all(self.as_bytes())?;
        Ok(())
    }

    fn deserialize<R: Read>(r: &mut R) -> Result<Self, CodecError> {
        let len = read_varint(r)?;
        let mut buf = Vec::with_capacity((len as usize).min(4096));
        r.take(len).read_to_end(&mut buf)?;
        if buf.len() as u64 != len {
            return Err(CodecError::CorruptedInput("truncated string"));
        }
        String::from_utf8(buf).map_err(|_| CodecError::CorruptedInput("invalid utf-8"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn round_trip<T: Serializable + PartialEq + std::fmt::Debug>(value: T) {
        let mut raw = Vec::new();
        value.serialize(&mut raw).unwrap();
        let back = T::deserialize(&mut &raw[..]).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn integers() {
        round_trip(0u8);
        round_trip(0xfeu8);
        round_trip(0x1234u16);
        round_trip(0xdead_beefu32);
        round_trip(u64::MAX);
        round_trip(-42i64);
    }

    #[test]
    fn integers_are_little_endian() {
        let mut raw = Vec::new();
        0x0102_0304u32.serialize(&mut raw).unwrap();
        assert_eq!(raw, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn buffers_and_strings() {
        round_trip(Vec::<u8>::new());
        round_trip(vec![1u8, 2, 3]);
        round_trip(vec![0x1111u16, 0x2222, 0x3333]);
        round_trip(String::from(""));
        round_trip(String::from("metabasenet"));
    }

    #[test]
    fn varint_boundaries() {
        for v in [0u64, 1, 127, 128, 16383, 16384, u64::MAX] {
            let mut raw = Vec::new();
            write_varint(&mut raw, v).unwrap();
            assert_eq!(read_varint(&mut &raw[..]).unwrap(), v);
        }
    }

    #[test]
    fn varint_overflow_is_rejected() {
        let raw = [0xffu8; 11];
        assert!(matches!(
            read_varint(&mut &raw[..]),
            Err(CodecError::CorruptedInput(_))
        ));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let mut raw = Vec::new();
        vec![1u8, 2, 3].serialize(&mut raw).unwrap();
        raw.pop();
        assert!(matches!(
            Vec::<u8>::deserialize(&mut &raw[..]),
            Err(CodecError::CorruptedInput(_))
        ));
    }

    #[test]
    fn invalid_utf8_is_rejected() {
        let mut raw = Vec::new();
        write_varint(&mut raw, 2).unwrap();
        raw.extend_from_slice(&[0xff, 0xfe]);
        assert!(matches!(
            String::deserialize(&mut &raw[..]),
            Err(CodecError::CorruptedInput("invalid utf-8"))
        ));
    }
}
