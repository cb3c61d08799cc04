use crate::codec::{read_varint, write_varint, CodecError};

/// Upper bound accepted for a single uncompressed block.
const MAX_BLOCK_SIZE: usize = 128 * 1024 * 1024;

/// Compress a byte block.
///
/// The frame starts with the uncompressed length as a varint so
/// [uncompress] can bound its allocation before touching the body.
pub fn compress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() > MAX_BLOCK_SIZE {
        return Err(CodecError::CorruptedInput("block too large"));
    }
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    write_varint(&mut out, data.len() as u64)?;
    let body = zstd::bulk::compress(data, 1)?;
    out.extend_from_slice(&body);
    Ok(out)
}

/// Undo [compress]. Any malformed frame fails with `CorruptedInput`.
pub fn uncompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut slice = data;
    let len = read_varint(&mut slice)? as usize;
    if len > MAX_BLOCK_SIZE {
        return Err(CodecError::CorruptedInput("unreasonable block size"));
    }
    let out = zstd::bulk::decompress(slice, len)
        .map_err(|_| CodecError::CorruptedInput("malformed zstd frame"))?;
    if out.len() != len {
        return Err(CodecError::CorruptedInput("block size mismatch"));
    }
    Ok(out)
}
