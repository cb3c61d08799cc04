//! The `CTSK` chunk container format.

use crate::codec;
use crate::ctsdb::StoreError;
use crate::types::Uint256;

/// Magic at the start of every chunk file.
pub const CHUNK_MAGIC: [u8; 4] = *b"CTSK";

/// The only format version this build reads or writes.
pub const CHUNK_FORMAT_VERSION: u16 = 1;

/// Header flag: the payload is compressed as a whole.
pub const CHUNK_FLAG_COMPRESSED: u16 = 1 << 0;

const HEADER_LEN: usize = 4 + 2 + 2 + 8 + 4;
const INDEX_ENTRY_LEN: usize = Uint256::WIDTH + 4 + 4;

/// One line of the chunk directory. Offsets are relative to the start
/// of the uncompressed payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: Uint256,
    pub offset: u32,
    pub length: u32,
}

/// Decoded view of one chunk file; the payload is held uncompressed.
pub struct Chunk {
    pub bucket_id: u64,
    pub index: Vec<IndexEntry>,
    payload: Vec<u8>,
}

impl Chunk {
    /// Serialized record bytes for `entry`.
    pub fn record_slice(&self, entry: &IndexEntry) -> &[u8] {
        &self.payload[entry.offset as usize..(entry.offset + entry.length) as usize]
    }

    /// Serialized record bytes for `key`, if present.
    pub fn record(&self, key: &Uint256) -> Option<&[u8]> {
        self.index
            .binary_search_by(|entry| entry.key.cmp(key))
            .ok()
            .map(|pos| self.record_slice(&self.index[pos]))
    }
}

/// Encode a chunk. `entries` must already be sorted by key with unique
/// keys; [crate::ctsdb::ChunkStore] prepares them.
pub fn encode_chunk(
    bucket_id: u64,
    entries: &[(Uint256, Vec<u8>)],
    compress: bool,
) -> Result<Vec<u8>, StoreError> {
    let mut index = Vec::with_capacity(entries.len());
    let mut payload = Vec::new();

    for (key, record) in entries {
        let offset = payload.len() as u64;
        let length = record.len() as u64;
        if length > u32::MAX as u64 || offset + length > u32::MAX as u64 {
            return Err(StoreError::RecordTooLarge {
                size: offset + length,
            });
        }
        index.push(IndexEntry {
            key: *key,
            offset: offset as u32,
            length: length as u32,
        });
        payload.extend_from_slice(record);
    }

    let (body, flags) = if compress {
        (codec::compress(&payload)?, CHUNK_FLAG_COMPRESSED)
    } else {
        (payload, 0)
    };
    if body.len() as u64 > u32::MAX as u64 {
        return Err(StoreError::RecordTooLarge {
            size: body.len() as u64,
        });
    }

    let mut raw =
        Vec::with_capacity(HEADER_LEN + index.len() * INDEX_ENTRY_LEN + body.len() + 8);
    raw.extend_from_slice(&CHUNK_MAGIC);
    raw.extend_from_slice(&CHUNK_FORMAT_VERSION.to_le_bytes());
    raw.extend_from_slice(&flags.to_le_bytes());
    raw.extend_from_slice(&bucket_id.to_le_bytes());
    raw.extend_from_slice(&(index.len() as u32).to_le_bytes());
    for entry in &index {
        raw.extend_from_slice(entry.key.as_bytes());
        raw.extend_from_slice(&entry.offset.to_le_bytes());
        raw.extend_from_slice(&entry.length.to_le_bytes());
    }
    raw.extend_from_slice(&(body.len() as u32).to_le_bytes());
    raw.extend_from_slice(&body);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&raw);
    raw.extend_from_slice(&hasher.finalize().to_le_bytes());

    Ok(raw)
}

fn le_u16(raw: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([raw[at], raw[at + 1]])
}

fn le_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

fn le_u64(raw: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&raw[at..at + 8]);
    u64::from_le_bytes(buf)
}

/// Decode and verify a chunk file.
pub fn decode_chunk(raw: &[u8], expect_bucket: u64) -> Result<Chunk, StoreError> {
    let corrupt = |reason| StoreError::CorruptedChunk {
        bucket: expect_bucket,
        reason,
    };

    if raw.len() < HEADER_LEN + 4 + 4 {
        return Err(corrupt("truncated file"));
    }
    if raw[0..4] != CHUNK_MAGIC {
        return Err(corrupt("bad magic"));
    }
    if le_u16(raw, 4) != CHUNK_FORMAT_VERSION {
        return Err(corrupt("unknown format version"));
    }
    let flags = le_u16(raw, 6);
    if flags & !CHUNK_FLAG_COMPRESSED != 0 {
        return Err(corrupt("unknown flags"));
    }
    if le_u64(raw, 8) != expect_bucket {
        return Err(corrupt("bucket id mismatch"));
    }
    let count = le_u32(raw, 16) as usize;

    let crc_start = raw.len() - 4;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&raw[..crc_start]);
    if hasher.finalize() != le_u32(raw, crc_start) {
        return Err(corrupt("crc mismatch"));
    }

    let index_end = HEADER_LEN
        .checked_add(count.checked_mul(INDEX_ENTRY_LEN).ok_or_else(|| corrupt("count overflow"))?)
        .ok_or_else(|| corrupt("count overflow"))?;
    if index_end + 4 > crc_start {
        return Err(corrupt("truncated index"));
    }

    let mut index = Vec::with_capacity(count);
    let mut at = HEADER_LEN;
    for _ in 0..count {
        let mut key = [0u8; Uint256::WIDTH];
        key.copy_from_slice(&raw[at..at + Uint256::WIDTH]);
        let key = Uint256::from_bytes(key);
        if index.last().map_or(false, |prev: &IndexEntry| prev.key >= key) {
            return Err(corrupt("index keys not strictly increasing"));
        }
        index.push(IndexEntry {
            key,
            offset: le_u32(raw, at + Uint256::WIDTH),
            length: le_u32(raw, at + Uint256::WIDTH + 4),
        });
        at += INDEX_ENTRY_LEN;
    }

    let payload_length = le_u32(raw, index_end) as usize;
    let body = &raw[index_end + 4..crc_start];
    if body.len() != payload_length {
        return Err(corrupt("payload length mismatch"));
    }

    let payload = if flags & CHUNK_FLAG_COMPRESSED != 0 {
        codec::uncompress(body).map_err(|_| corrupt("payload decompression failed"))?
    } else {
        body.to_vec()
    };

    for entry in &index {
        if entry.offset as u64 + entry.length as u64 > payload.len() as u64 {
            return Err(corrupt("index entry out of bounds"));
        }
    }

    Ok(Chunk {
        bucket_id: expect_bucket,
        index,
        payload,
    })
}
