//! Fixed-width digest types.
//!
//! Digests are stored big-endian, so the derived byte-wise ordering is
//! the unsigned numeric ordering.

use std::fmt;
use std::str::FromStr;

use crate::codec::{read_bytes, CodecError, Serializable};
use crate::tools::hex;

macro_rules! define_digest {
    ($name:ident, $width:expr, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name([u8; $width]);

        impl $name {
            pub const WIDTH: usize = $width;

            pub const fn zero() -> Self {
                Self([0u8; $width])
            }

            pub const fn from_bytes(bytes: [u8; $width]) -> Self {
                Self(bytes)
            }

            /// Digest with `v` in the low-order bytes, the rest zero.
            pub fn from_low_u64(v: u64) -> Self {
                let mut out = [0u8; $width];
                out[$width - 8..].copy_from_slice(&v.to_be_bytes());
                Self(out)
            }

            pub fn as_bytes(&self) -> &[u8; $width] {
                &self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", hex::encode(&self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0))
            }
        }

        impl FromStr for $name {
            type Err = CodecError;

            /// Parses tolerant hex. Shorter input is right-aligned and
            /// zero-filled; longer input is rejected.
            fn from_str(s: &str) -> Result<Self, CodecError> {
                let raw = hex::decode(s);
                if raw.len() > $width {
                    return Err(CodecError::CorruptedInput("digest too long"));
                }
                let mut out = [0u8; $width];
                out[$width - raw.len()..].copy_from_slice(&raw);
                Ok(Self(out))
            }
        }

        impl Serializable for $name {
            fn serialize<W: std::io::Write>(&self, w: &mut W) -> Result<(), CodecError> {
                w.write_all(&self.0)?;
                Ok(())
            }

            fn deserialize<R: std::io::Read>(r: &mut R) -> Result<Self, CodecError> {
                let mut buf = [0u8; $width];
                read_bytes(r, &mut buf, "digest")?;
                Ok(Self(buf))
            }
        }
    };
}

define_digest!(Uint224, 28, "224-bit big-endian digest.");
define_digest!(Uint256, 32, "256-bit big-endian digest.");
