//! Append log writer with a size cap and numbered history files.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{format_err, Error};
use log::{LevelFilter, Log, Metadata, Record};

use crate::tools::clock;

/// Log backend writing to `<path>`, rotating to `<path>.0 .. <path>.N-1`
/// once the size cap is reached. Oldest history is dropped.
pub struct FileLogger {
    level: LevelFilter,
    inner: Mutex<Inner>,
}

struct Inner {
    file: File,
    path: PathBuf,
    written: u64,
    max_size: u64,
    history: usize,
}

impl FileLogger {
    pub fn new<P: AsRef<Path>>(
        path: P,
        max_size: u64,
        history: usize,
        level: LevelFilter,
    ) -> Result<Self, Error> {
        let path = path.as_ref().to_owned();
        let file = open_log(&path)?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);
        Ok(Self {
            level,
            inner: Mutex::new(Inner {
                file,
                path,
                written,
                max_size,
                history: history.max(1),
            }),
        })
    }

    /// Install as the process-wide `log` backend. A second install in
    /// the same process is a no-op.
    pub fn install(self) -> Result<(), Error> {
        log::set_max_level(self.level);
        let _ = log::set_boxed_logger(Box::new(self));
        Ok(())
    }
}

fn open_log(path: &Path) -> Result<File, Error> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| format_err!("unable to open log file {:?} - {}", path, err))
}

fn history_path(path: &Path, index: usize) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(format!(".{}", index));
    PathBuf::from(s)
}

impl Inner {
    fn rotate(&mut self) {
        let _ = std::fs::remove_file(history_path(&self.path, self.history - 1));
        for index in (1..self.history).rev() {
            let _ = std::fs::rename(
                history_path(&self.path, index - 1),
                history_path(&self.path, index),
            );
        }
        let _ = std::fs::rename(&self.path, history_path(&self.path, 0));

        if let Ok(file) = open_log(&self.path) {
            self.file = file;
            self.written = 0;
        }
    }
}

impl Log for FileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{}] {} - {}\n",
            clock::format_local(clock::now_utc_seconds()),
            record.level(),
            record.target(),
            record.args()
        );
        if let Ok(mut inner) = self.inner.lock() {
            if inner.written + line.len() as u64 > inner.max_size {
                inner.rotate();
            }
            if inner.file.write_all(line.as_bytes()).is_ok() {
                inner.written += line.len() as u64;
            }
        }
    }

    fn flush(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            let _ = inner.file.flush();
        }
    }
}
