//! Content-addressed time-series storage.
//!
//! # Data model
//!
//! Records are keyed by `(timestamp, digest)`. Time is partitioned into
//! fixed-width buckets; all records of one bucket live in a single
//! immutable chunk file, `bucket-<id>.chk`. Writes stage in an
//! in-memory tier per bucket and reach disk on an explicit flush, which
//! rewrites the affected chunk through a temp-file-and-rename protocol
//! so readers always observe a complete file.
//!
//! # Layers
//!
//! * [chunk] - the `CTSK` container format: header, sorted key
//!   directory, optionally compressed payload, trailing CRC-32.
//! * [ChunkStore] - the flat on-disk directory of chunks, one file per
//!   non-empty bucket.
//! * [Ctsdb] - the engine: bucketed write buffer over the chunk store,
//!   point lookup, ordered range walk, atomic flush, purge.
//!
//! # Locking
//!
//! Each open database holds an exclusive advisory lock on a `.lock`
//! file inside its directory, so two processes never manage the same
//! chunk directory. Within a process the engine serializes writers and
//! lets point reads and walks share.

use std::path::PathBuf;

use thiserror::Error;

use crate::codec::CodecError;

mod chunk;
mod chunk_store;
mod engine;

pub use chunk::*;
pub use chunk_store::*;
pub use engine::*;

/// Errors surfaced by the time-series store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database not open")]
    NotOpen,
    #[error("database already open")]
    AlreadyOpen,
    #[error("bucket width must be positive")]
    InvalidBucketWidth,
    #[error("database lock {0:?} contended")]
    LockContended(PathBuf),
    #[error("corrupted chunk for bucket {bucket} - {reason}")]
    CorruptedChunk { bucket: u64, reason: &'static str },
    #[error("record too large ({size} bytes)")]
    RecordTooLarge { size: u64 },
    #[error("flush failed for bucket {bucket} - {cause}")]
    FlushFailed {
        bucket: u64,
        #[source]
        cause: Box<StoreError>,
    },
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("i/o error - {0}")]
    Io(#[from] std::io::Error),
}
