//! Length-prefixed byte codec and block compression.
//!
//! Everything the node persists or ships over the wire goes through
//! [Serializable]: multi-byte integers travel little-endian, variable
//! length buffers carry a LEB128 varint length prefix. Chunk payloads
//! are compressed as opaque byte blocks via [compress]/[uncompress].

mod compress;
mod serialize;

pub use compress::*;
pub use serialize::*;
