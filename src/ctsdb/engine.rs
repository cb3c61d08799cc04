//! The time-bucketed engine over the chunk store.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::buildcfg;
use crate::codec::Serializable;
use crate::ctsdb::{ChunkStore, StoreError};
use crate::tools;
use crate::tools::logsink::{SharedSink, SinkLevel};
use crate::types::Uint256;

/// Default bucket width, one hour.
pub const DEFAULT_BUCKET_WIDTH: u64 = 3600;

/// Tuning knobs for a [Ctsdb] instance.
pub struct TsdbOptions {
    /// Width of one time bucket in seconds. Must be positive.
    pub bucket_width: u64,
    /// Compress chunk payloads on flush.
    pub compress: bool,
    /// Diagnostics sink; the engine emits through no other channel.
    pub sink: SharedSink,
}

impl TsdbOptions {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            bucket_width: DEFAULT_BUCKET_WIDTH,
            compress: true,
            sink,
        }
    }
}

/// Visitor verdict for [Ctsdb::walk_through].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkControl {
    Continue,
    Stop,
}

struct OpenState<R> {
    store: ChunkStore,
    // held for the lifetime of the open database; dropping releases it
    _lock_file: File,
    /// Buckets with an on-disk chunk.
    buckets: BTreeSet<u64>,
    /// Staged writes, bucket -> key -> record. Within a bucket the last
    /// update for a key wins.
    buffer: BTreeMap<u64, BTreeMap<Uint256, R>>,
}

/// Persistent map `(timestamp, key) -> record`.
///
/// Closed until [initialize](Ctsdb::initialize) succeeds; every other
/// operation fails with `NotOpen` before that. Updates stage in memory
/// and reach disk on [flush](Ctsdb::flush); deinitializing discards
/// unflushed data, so callers flush first.
pub struct Ctsdb<R: Serializable + Clone> {
    options: TsdbOptions,
    state: RwLock<Option<OpenState<R>>>,
}

impl<R: Serializable + Clone> Ctsdb<R> {
    pub fn new(options: TsdbOptions) -> Result<Self, StoreError> {
        if options.bucket_width == 0 {
            return Err(StoreError::InvalidBucketWidth);
        }
        Ok(Self {
            options,
            state: RwLock::new(None),
        })
    }

    fn read_state(&self) -> RwLockReadGuard<Option<OpenState<R>>> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_state(&self) -> RwLockWriteGuard<Option<OpenState<R>>> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn bucket_of(&self, t: u64) -> u64 {
        t / self.options.bucket_width
    }

    pub fn is_open(&self) -> bool {
        self.read_state().is_some()
    }

    /// Open the database at `path`: create the directory if missing,
    /// take the exclusive directory lock, enumerate existing chunks and
    /// sweep temp files left by an interrupted flush.
    pub fn initialize<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let mut state = self.write_state();
        if state.is_some() {
            return Err(StoreError::AlreadyOpen);
        }

        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let lock_path = path.join(buildcfg::LOCK_FILE_NAME);
        let lock_file = tools::lock_file(&lock_path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::WouldBlock {
                StoreError::LockContended(lock_path.clone())
            } else {
                StoreError::Io(err)
            }
        })?;

        let store = ChunkStore::new(path, self.options.compress);
        let buckets = store.scan(self.options.sink.as_ref())?;

        *state = Some(OpenState {
            store,
            _lock_file: lock_file,
            buckets,
            buffer: BTreeMap::new(),
        });
        Ok(())
    }

    /// Release the directory lock. Unflushed data is discarded.
    pub fn deinitialize(&self) -> Result<(), StoreError> {
        let mut state = self.write_state();
        if state.take().is_none() {
            return Err(StoreError::NotOpen);
        }
        Ok(())
    }

    /// Stage a write under the bucket of `t`. The last write for a
    /// `(bucket, key)` wins.
    pub fn update(&self, t: u64, key: Uint256, record: R) -> Result<(), StoreError> {
        let bucket = self.bucket_of(t);
        let mut guard = self.write_state();
        let state = guard.as_mut().ok_or(StoreError::NotOpen)?;
        state.buffer.entry(bucket).or_default().insert(key, record);
        Ok(())
    }

    /// Look up `(t, key)`, the buffer shadowing the chunk. A corrupted
    /// chunk is reported through the sink and treated as absent.
    pub fn retrieve(&self, t: u64, key: &Uint256) -> Result<Option<R>, StoreError> {
        let bucket = self.bucket_of(t);
        let guard = self.read_state();
        let state = guard.as_ref().ok_or(StoreError::NotOpen)?;

        if let Some(staged) = state.buffer.get(&bucket) {
            if let Some(record) = staged.get(key) {
                return Ok(Some(record.clone()));
            }
        }
        if !state.buckets.contains(&bucket) {
            return Ok(None);
        }

        match state.store.read_record(bucket, key) {
            Ok(Some(raw)) => Ok(Some(R::deserialize(&mut &raw[..])?)),
            Ok(None) => Ok(None),
            Err(StoreError::CorruptedChunk { bucket, reason }) => {
                self.corrupted(bucket, reason);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Visit every distinct `(key, record)` with a timestamp bucket in
    /// `[t_lo, t_hi]`, ascending by `(bucket, key)`. Buffered writes
    /// shadow on-disk records; the visitor may stop the walk.
    pub fn walk_through<F>(&self, t_lo: u64, t_hi: u64, mut visitor: F) -> Result<(), StoreError>
    where
        F: FnMut(u64, &Uint256, &R) -> Result<WalkControl, StoreError>,
    {
        if t_lo > t_hi {
            return Ok(());
        }
        let lo = self.bucket_of(t_lo);
        let hi = self.bucket_of(t_hi);

        let guard = self.read_state();
        let state = guard.as_ref().ok_or(StoreError::NotOpen)?;

        let mut buckets: Vec<u64> = state.buckets.range(lo..=hi).copied().collect();
        buckets.extend(state.buffer.range(lo..=hi).map(|(bucket, _)| *bucket));
        buckets.sort_unstable();
        buckets.dedup();

        let empty = BTreeMap::new();
        for bucket in buckets {
            let chunk = if state.buckets.contains(&bucket) {
                match state.store.load_chunk(bucket) {
                    Ok(chunk) => chunk,
                    Err(StoreError::CorruptedChunk { bucket, reason }) => {
                        self.corrupted(bucket, reason);
                        None
                    }
                    Err(err) => return Err(err),
                }
            } else {
                None
            };
            let staged = state.buffer.get(&bucket).unwrap_or(&empty);

            let mut disk = chunk.iter().flat_map(|c| c.index.iter()).peekable();
            let mut buffered = staged.iter().peekable();

            loop {
                let disk_key = disk.peek().map(|entry| entry.key);
                let staged_key = buffered.peek().map(|(key, _)| **key);

                let emit_disk = match (disk_key, staged_key) {
                    (None, None) => break,
                    (Some(_), None) => true,
                    (None, Some(_)) => false,
                    (Some(dk), Some(sk)) => {
                        if dk == sk {
                            // buffered shadows on-disk
                            disk.next();
                            false
                        } else {
                            dk < sk
                        }
                    }
                };

                let verdict = if emit_disk {
                    let entry = disk.next().expect("peeked disk entry");
                    let chunk = chunk.as_ref().expect("disk entries imply a chunk");
                    let record = R::deserialize(&mut &chunk.record_slice(entry)[..])?;
                    visitor(bucket, &entry.key, &record)?
                } else {
                    let (key, record) = buffered.next().expect("peeked buffered entry");
                    visitor(bucket, key, record)?
                };

                if verdict == WalkControl::Stop {
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Materialize every buffered bucket, ascending by bucket id. When
    /// a bucket fails, earlier buckets stay flushed and the failing and
    /// later buckets remain buffered.
    pub fn flush(&self) -> Result<(), StoreError> {
        let mut guard = self.write_state();
        let state = guard.as_mut().ok_or(StoreError::NotOpen)?;

        let pending: Vec<u64> = state.buffer.keys().copied().collect();
        for bucket in pending {
            if let Err(cause) = self.flush_bucket(state, bucket) {
                return Err(StoreError::FlushFailed {
                    bucket,
                    cause: Box::new(cause),
                });
            }
            state.buffer.remove(&bucket);
            state.buckets.insert(bucket);
        }
        Ok(())
    }

    fn flush_bucket(&self, state: &OpenState<R>, bucket: u64) -> Result<(), StoreError> {
        let mut entries: Vec<(Uint256, Vec<u8>)> = Vec::new();

        if state.buckets.contains(&bucket) {
            match state.store.load_chunk(bucket) {
                Ok(Some(chunk)) => {
                    for entry in &chunk.index {
                        entries.push((entry.key, chunk.record_slice(entry).to_vec()));
                    }
                }
                Ok(None) => {}
                // rewrite the bucket from the buffer alone
                Err(StoreError::CorruptedChunk { bucket, reason }) => {
                    self.corrupted(bucket, reason)
                }
                Err(err) => return Err(err),
            }
        }

        if let Some(staged) = state.buffer.get(&bucket) {
            for (key, record) in staged {
                let mut raw = Vec::new();
                record.serialize(&mut raw)?;
                entries.push((*key, raw));
            }
        }

        state.store.write_chunk(bucket, entries)
    }

    /// Drop every chunk and clear the write buffer.
    pub fn remove_all(&self) -> Result<(), StoreError> {
        let mut guard = self.write_state();
        let state = guard.as_mut().ok_or(StoreError::NotOpen)?;
        state.store.remove_all_chunks()?;
        state.buffer.clear();
        state.buckets.clear();
        Ok(())
    }

    fn corrupted(&self, bucket: u64, reason: &str) {
        self.options.sink.emit(
            SinkLevel::Warn,
            "ctsdb",
            &format!(
                "chunk for bucket {} is corrupted ({}) - treating it as absent",
                bucket, reason
            ),
        );
    }
}
