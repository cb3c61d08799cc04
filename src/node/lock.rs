//! The `lock` pseudo-module.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Error};

use crate::buildcfg;
use crate::node::module::NodeModule;
use crate::tools;

/// Takes the exclusive data-directory lock before any other module may
/// touch the directory; it is always the first module in attach order.
/// Contention means another node instance manages the same directory.
pub struct LockModule {
    lock_path: PathBuf,
    lock_file: Option<File>,
}

impl LockModule {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            lock_path: data_dir.join(buildcfg::LOCK_FILE_NAME),
            lock_file: None,
        }
    }
}

impl NodeModule for LockModule {
    fn name(&self) -> &'static str {
        "lock"
    }

    fn initialize(&mut self) -> Result<(), Error> {
        match tools::lock_file(&self.lock_path) {
            Ok(file) => {
                self.lock_file = Some(file);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                bail!(
                    "data directory is locked by another running instance ({:?})",
                    self.lock_path
                );
            }
            Err(err) => bail!("unable to lock {:?} - {}", self.lock_path, err),
        }
    }

    fn run(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        // dropping the file releases the advisory lock; the lock file
        // itself stays on disk
        self.lock_file = None;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn second_instance_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut first = LockModule::new(dir.path());
        let mut second = LockModule::new(dir.path());

        first.initialize().unwrap();
        assert!(second.initialize().is_err());

        first.deinitialize().unwrap();
        second.initialize().unwrap();
        assert!(dir.path().join(buildcfg::LOCK_FILE_NAME).exists());
    }
}
