//! Flat on-disk directory of immutable bucket chunks.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;

use crate::ctsdb::{decode_chunk, encode_chunk, Chunk, IndexEntry, StoreError};
use crate::tools;
use crate::tools::logsink::{LogSink, SinkLevel};
use crate::types::Uint256;

lazy_static! {
    static ref CHUNK_FILE_REGEX: Regex = Regex::new(r"^bucket-(\d+)\.chk$").unwrap();
    static ref TMP_FILE_REGEX: Regex = Regex::new(r"^bucket-\d+\.tmp$").unwrap();
}

/// One `bucket-<id>.chk` per non-empty bucket, plus transient
/// `bucket-<id>.tmp` files while a chunk is being replaced.
pub struct ChunkStore {
    base: PathBuf,
    compress: bool,
}

impl ChunkStore {
    pub fn new<P: Into<PathBuf>>(base: P, compress: bool) -> Self {
        Self {
            base: base.into(),
            compress,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    fn chunk_path(&self, bucket_id: u64) -> PathBuf {
        self.base.join(format!("bucket-{}.chk", bucket_id))
    }

    fn tmp_path(&self, bucket_id: u64) -> PathBuf {
        self.base.join(format!("bucket-{}.tmp", bucket_id))
    }

    /// Enumerate existing chunks and sweep temp files left behind by an
    /// interrupted flush.
    pub fn scan(&self, sink: &dyn LogSink) -> Result<BTreeSet<u64>, StoreError> {
        let mut buckets = BTreeSet::new();
        for item in std::fs::read_dir(&self.base)? {
            let item = item?;
            let name = item.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => continue,
            };
            if let Some(caps) = CHUNK_FILE_REGEX.captures(name) {
                if let Ok(id) = caps[1].parse::<u64>() {
                    buckets.insert(id);
                }
            } else if TMP_FILE_REGEX.is_match(name) {
                sink.emit(
                    SinkLevel::Warn,
                    "ctsdb",
                    &format!("removing stale temp file {:?}", item.path()),
                );
                std::fs::remove_file(item.path())?;
            }
        }
        Ok(buckets)
    }

    /// Write the chunk for `bucket_id`, replacing any existing one
    /// atomically. Entries may arrive unsorted and with duplicate keys;
    /// the last occurrence of a key wins.
    pub fn write_chunk(
        &self,
        bucket_id: u64,
        mut entries: Vec<(Uint256, Vec<u8>)>,
    ) -> Result<(), StoreError> {
        // stable sort, then a reversed dedup keeps the last occurrence
        entries.sort_by_key(|entry| entry.0);
        entries.reverse();
        entries.dedup_by(|a, b| a.0 == b.0);
        entries.reverse();

        let raw = encode_chunk(bucket_id, &entries, self.compress)?;
        tools::write_file_atomic(self.chunk_path(bucket_id), self.tmp_path(bucket_id), &raw)
            .map_err(|err| {
                std::io::Error::new(std::io::ErrorKind::Other, err.to_string()).into()
            })
    }

    /// Load a whole chunk. `Ok(None)` when the bucket has no chunk.
    pub fn load_chunk(&self, bucket_id: u64) -> Result<Option<Chunk>, StoreError> {
        let raw = match std::fs::read(self.chunk_path(bucket_id)) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Ok(Some(decode_chunk(&raw, bucket_id)?))
    }

    /// The sorted `(key, offset, length)` directory of a chunk.
    pub fn read_chunk_index(&self, bucket_id: u64) -> Result<Option<Vec<IndexEntry>>, StoreError> {
        Ok(self.load_chunk(bucket_id)?.map(|chunk| chunk.index))
    }

    /// Serialized record bytes for `(bucket_id, key)`.
    pub fn read_record(
        &self,
        bucket_id: u64,
        key: &Uint256,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self
            .load_chunk(bucket_id)?
            .and_then(|chunk| chunk.record(key).map(<[u8]>::to_vec)))
    }

    /// Visit records in key order. The visitor returns `false` to stop.
    pub fn walk_chunk<F>(&self, bucket_id: u64, mut visitor: F) -> Result<(), StoreError>
    where
        F: FnMut(&Uint256, &[u8]) -> Result<bool, StoreError>,
    {
        if let Some(chunk) = self.load_chunk(bucket_id)? {
            for entry in &chunk.index {
                if !visitor(&entry.key, chunk.record_slice(entry))? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Remove the chunk file; succeeds when it never existed.
    pub fn delete_chunk(&self, bucket_id: u64) -> Result<(), StoreError> {
        match std::fs::remove_file(self.chunk_path(bucket_id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Remove every chunk and temp file in the directory.
    pub fn remove_all_chunks(&self) -> Result<(), StoreError> {
        for item in std::fs::read_dir(&self.base)? {
            let item = item?;
            let name = item.file_name();
            let name = match name.to_str() {
                Some(name) => name,
                None => continue,
            };
            if CHUNK_FILE_REGEX.is_match(name) || TMP_FILE_REGEX.is_match(name) {
                std::fs::remove_file(item.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tools::logsink::default_sink;

    fn key(v: u64) -> Uint256 {
        Uint256::from_low_u64(v)
    }

    #[test]
    fn write_sorts_and_keeps_the_last_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path(), true);

        store
            .write_chunk(
                3,
                vec![
                    (key(9), b"first".to_vec()),
                    (key(1), b"one".to_vec()),
                    (key(9), b"second".to_vec()),
                ],
            )
            .unwrap();

        let index = store.read_chunk_index(3).unwrap().unwrap();
        assert_eq!(
            index.iter().map(|e| e.key).collect::<Vec<_>>(),
            vec![key(1), key(9)]
        );
        assert_eq!(store.read_record(3, &key(9)).unwrap().unwrap(), b"second");
    }

    #[test]
    fn walk_visits_in_order_and_stops_on_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path(), false);
        store
            .write_chunk(
                0,
                (0..10u64).map(|v| (key(v), vec![v as u8])).collect(),
            )
            .unwrap();

        let mut seen = Vec::new();
        store
            .walk_chunk(0, |k, _| {
                seen.push(*k);
                Ok(seen.len() < 4)
            })
            .unwrap();
        assert_eq!(seen, (0..4u64).map(key).collect::<Vec<_>>());
    }

    #[test]
    fn scan_lists_buckets_and_sweeps_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path(), true);
        store.write_chunk(1, vec![(key(1), vec![1])]).unwrap();
        store.write_chunk(5, vec![(key(5), vec![5])]).unwrap();
        std::fs::write(dir.path().join("bucket-5.tmp"), b"half written").unwrap();
        std::fs::write(dir.path().join("unrelated.txt"), b"ignored").unwrap();

        let buckets = store.scan(default_sink().as_ref()).unwrap();
        assert_eq!(buckets.into_iter().collect::<Vec<_>>(), vec![1, 5]);
        assert!(!dir.path().join("bucket-5.tmp").exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ChunkStore::new(dir.path(), true);
        store.write_chunk(2, vec![(key(2), vec![2])]).unwrap();
        store.delete_chunk(2).unwrap();
        store.delete_chunk(2).unwrap();
        assert!(store.load_chunk(2).unwrap().is_none());
    }
}
