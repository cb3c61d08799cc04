//! Node statistics over the time-series store.
//!
//! Counts bus events per topic into a [Ctsdb] under
//! `<data>/datastat/`, keyed by `(now, topic digest)`. This module is
//! also what a purge run drains: it knows every database it manages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Error;
use crossbeam_channel::{bounded, Receiver, Select, Sender};
use serde_json::Value;

use crate::buildcfg;
use crate::codec::{CodecError, Serializable};
use crate::ctsdb::{Ctsdb, StoreError, TsdbOptions};
use crate::node::bus::{Event, EventBus};
use crate::node::module::NodeModule;
use crate::tools::clock;
use crate::types::Uint256;

/// Bus topics folded into counters.
pub const STAT_TOPICS: &[&str] = &["block.connected", "tx.accepted", "peer.connected"];

/// One counter sample.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatRecord {
    pub count: u64,
    pub volume: u64,
}

impl Serializable for StatRecord {
    fn serialize<W: std::io::Write>(&self, w: &mut W) -> Result<(), CodecError> {
        self.count.serialize(w)?;
        self.volume.serialize(w)?;
        Ok(())
    }

    fn deserialize<R: std::io::Read>(r: &mut R) -> Result<Self, CodecError> {
        Ok(Self {
            count: u64::deserialize(r)?,
            volume: u64::deserialize(r)?,
        })
    }
}

/// Stable digest for a topic: the topic bytes right-aligned in the key.
pub fn topic_key(topic: &str) -> Uint256 {
    let raw = topic.as_bytes();
    let take = raw.len().min(Uint256::WIDTH);
    let mut out = [0u8; Uint256::WIDTH];
    out[Uint256::WIDTH - take..].copy_from_slice(&raw[raw.len() - take..]);
    Uint256::from_bytes(out)
}

fn fold_event(db: &Ctsdb<StatRecord>, event: &Event) {
    let now = clock::now_utc_seconds().max(0) as u64;
    let key = topic_key(&event.topic);
    let volume = event
        .payload
        .get("bytes")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let prev = match db.retrieve(now, &key) {
        Ok(prev) => prev.unwrap_or(StatRecord {
            count: 0,
            volume: 0,
        }),
        Err(err) => {
            log::warn!("datastat: lookup failed - {}", err);
            return;
        }
    };
    let next = StatRecord {
        count: prev.count + 1,
        volume: prev.volume + volume,
    };
    if let Err(err) = db.update(now, key, next) {
        log::warn!("datastat: update failed - {}", err);
    }
}

/// The statistics module.
pub struct DataStatModule {
    db_path: PathBuf,
    db: Arc<Ctsdb<StatRecord>>,
    bus: Arc<EventBus>,
    receivers: Vec<Receiver<Event>>,
    stop_tx: Option<Sender<()>>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl DataStatModule {
    pub fn new(
        data_dir: &Path,
        options: TsdbOptions,
        bus: Arc<EventBus>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            db_path: data_dir.join(buildcfg::DATASTAT_DIR_NAME),
            db: Arc::new(Ctsdb::new(options)?),
            bus,
            receivers: Vec::new(),
            stop_tx: None,
            worker: None,
        })
    }

    /// Shared handle to the underlying database, e.g. for RPC readers.
    pub fn database(&self) -> Arc<Ctsdb<StatRecord>> {
        Arc::clone(&self.db)
    }

    /// Remove every record this module ever persisted under
    /// `data_dir`. Used by the purge run mode.
    pub fn purge(data_dir: &Path, options: TsdbOptions) -> Result<(), StoreError> {
        let db: Ctsdb<StatRecord> = Ctsdb::new(options)?;
        db.initialize(data_dir.join(buildcfg::DATASTAT_DIR_NAME))?;
        let result = db.remove_all();
        db.deinitialize()?;
        result
    }
}

impl NodeModule for DataStatModule {
    fn name(&self) -> &'static str {
        "datastat"
    }

    fn initialize(&mut self) -> Result<(), Error> {
        self.db.initialize(&self.db_path)?;
        self.receivers = STAT_TOPICS
            .iter()
            .map(|topic| self.bus.subscribe(topic))
            .collect();
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        let receivers = std::mem::take(&mut self.receivers);
        let (stop_tx, stop_rx) = bounded(1);
        let db = Arc::clone(&self.db);

        self.worker = Some(std::thread::spawn(move || loop {
            let mut select = Select::new();
            let stop_index = select.recv(&stop_rx);
            for rx in &receivers {
                select.recv(rx);
            }

            let op = select.select();
            let index = op.index();
            if index == stop_index {
                let _ = op.recv(&stop_rx);
                return;
            }
            match op.recv(&receivers[index - 1]) {
                Ok(event) => fold_event(&db, &event),
                Err(_) => return,
            }
        }));
        self.stop_tx = Some(stop_tx);
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.db.flush()?;
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        if self.db.is_open() {
            self.db.deinitialize()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::ctsdb::DEFAULT_BUCKET_WIDTH;
    use crate::tools::logsink::default_sink;
    use serde_json::json;

    #[test]
    fn topic_keys_are_stable_and_distinct() {
        assert_eq!(topic_key("tx.accepted"), topic_key("tx.accepted"));
        assert_ne!(topic_key("tx.accepted"), topic_key("block.connected"));
    }

    #[test]
    fn events_become_counters() {
        let dir = tempfile::tempdir().unwrap();
        let bus = Arc::new(EventBus::new());
        let mut module = DataStatModule::new(
            dir.path(),
            TsdbOptions::new(default_sink()),
            Arc::clone(&bus),
        )
        .unwrap();
        let db = module.database();

        module.initialize().unwrap();
        module.run().unwrap();

        bus.publish("tx.accepted", json!({ "bytes": 250 }));
        bus.publish("tx.accepted", json!({ "bytes": 50 }));

        // events are stamped by the worker, so probe the bucket of the
        // publish time and its successor in case the clock crossed a
        // bucket boundary in between
        let key = topic_key("tx.accepted");
        let now = clock::now_utc_seconds() as u64;
        let probe = |db: &Ctsdb<StatRecord>| {
            db.retrieve(now, &key)
                .unwrap()
                .or_else(|| db.retrieve(now + DEFAULT_BUCKET_WIDTH, &key).unwrap())
        };
        let mut sample = None;
        for _ in 0..100 {
            sample = probe(&db);
            if sample.as_ref().map_or(false, |s| s.count == 2) {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let sample = sample.expect("counter recorded");
        assert_eq!(sample.count, 2);
        assert_eq!(sample.volume, 300);

        module.halt().unwrap();
        module.deinitialize().unwrap();

        // the flush on halt made the counters durable
        let reopened: Ctsdb<StatRecord> = Ctsdb::new(TsdbOptions::new(default_sink())).unwrap();
        reopened
            .initialize(dir.path().join(buildcfg::DATASTAT_DIR_NAME))
            .unwrap();
        assert_eq!(probe(&reopened).unwrap().count, 2);
        reopened.deinitialize().unwrap();
    }

    #[test]
    fn purge_leaves_no_chunks_behind() {
        let dir = tempfile::tempdir().unwrap();
        let db: Ctsdb<StatRecord> = Ctsdb::new(TsdbOptions::new(default_sink())).unwrap();
        db.initialize(dir.path().join(buildcfg::DATASTAT_DIR_NAME))
            .unwrap();
        db.update(
            10,
            topic_key("tx.accepted"),
            StatRecord { count: 1, volume: 9 },
        )
        .unwrap();
        db.flush().unwrap();
        db.deinitialize().unwrap();

        DataStatModule::purge(dir.path(), TsdbOptions::new(default_sink())).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path().join(buildcfg::DATASTAT_DIR_NAME))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert!(entries
            .iter()
            .all(|name| !name.to_string_lossy().ends_with(".chk")));
    }
}
