//! The entry sequencer.
//!
//! [Entry] is a plain owner constructed by `main`: it validates the
//! environment, prepares logging, builds the modules the selected run
//! mode names and hands them to the container. There is no process-wide
//! instance; everything the node owns hangs off this value.

use std::sync::Arc;

use anyhow::{format_err, Error};
use log::LevelFilter;
use thiserror::Error as ThisError;

use crate::buildcfg;
use crate::config::NodeConfig;
use crate::ctsdb::TsdbOptions;
use crate::node::bus::EventBus;
use crate::node::container::{ContainerError, ModuleContainer};
use crate::node::datastat::DataStatModule;
use crate::node::lock::LockModule;
use crate::node::modes::{module_kinds, ModuleKind, RunMode};
use crate::node::module::NodeModule;
use crate::node::service::{HttpServerModule, NetworkModule, ServiceModule};
use crate::node::wallet::{HotWalletModule, OfflineWalletModule};
use crate::tools::file_logger::FileLogger;
use crate::tools::fsutil;
use crate::tools::logsink::{default_sink, SharedSink};

pub const EXIT_OK: i32 = 0;
pub const EXIT_CONFIG: i32 = 1;
pub const EXIT_ENVIRONMENT: i32 = 2;
pub const EXIT_MODULE: i32 = 3;

/// Why the node refused to come up.
#[derive(Debug, ThisError)]
pub enum EntryError {
    #[error("configuration error - {0}")]
    Config(Error),
    #[error("environment error - {0}")]
    Environment(Error),
    #[error("module error - {0}")]
    Module(ContainerError),
}

impl EntryError {
    pub fn exit_code(&self) -> i32 {
        match self {
            EntryError::Config(_) => EXIT_CONFIG,
            EntryError::Environment(_) => EXIT_ENVIRONMENT,
            EntryError::Module(_) => EXIT_MODULE,
        }
    }
}

/// Owns the container and drives the node from construction to exit.
pub struct Entry {
    config: NodeConfig,
    bus: Arc<EventBus>,
    sink: SharedSink,
    container: ModuleContainer,
}

impl Entry {
    /// Validate the environment, install the logger and build the
    /// modules for the configured run mode.
    pub fn new(config: NodeConfig) -> Result<Self, EntryError> {
        fsutil::ensure_data_dir(&config.data_dir, buildcfg::MIN_DATA_DIR_FREE_SPACE)
            .map_err(EntryError::Environment)?;

        init_logging(&config).map_err(EntryError::Environment)?;

        let sink = default_sink();
        let bus = Arc::new(EventBus::new());
        let mut container = ModuleContainer::new(Arc::clone(&sink));

        for kind in module_kinds(config.mode) {
            let module =
                build_module(*kind, &config, &bus, &sink).map_err(EntryError::Config)?;
            if !container.attach(module) {
                return Err(EntryError::Config(format_err!(
                    "duplicate module '{}' for mode {:?}",
                    kind.module_name(),
                    config.mode
                )));
            }
        }

        Ok(Self {
            config,
            bus,
            sink,
            container,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn container(&self) -> &ModuleContainer {
        &self.container
    }

    /// Bring every module up. Contention on the data directory lock is
    /// an environment problem; any other module failure is reported as
    /// a module error.
    pub fn startup(&mut self) -> Result<(), EntryError> {
        match self.container.run() {
            Ok(()) => {
                log::info!(
                    "node is up in {:?} mode, data directory {:?}",
                    self.config.mode,
                    self.config.data_dir
                );
                Ok(())
            }
            Err(err @ ContainerError::ModuleInitFailed { name: "lock", .. }) => {
                Err(EntryError::Environment(err.into()))
            }
            Err(err) => Err(EntryError::Module(err)),
        }
    }

    /// Tear the node down. Shutdown failures are logged and swallowed.
    pub fn exit(&mut self) {
        self.container.exit();
        log::info!("node stopped");
    }

    /// The purge run: lock the data directory, drop every managed
    /// database, release the lock. The lock file itself stays behind.
    pub fn purge(&mut self) -> Result<(), EntryError> {
        self.startup()?;
        let result = DataStatModule::purge(&self.config.data_dir, self.tsdb_options())
            .map_err(|err| EntryError::Environment(err.into()));
        self.exit();
        result?;
        log::info!("persisted node state removed");
        Ok(())
    }

    fn tsdb_options(&self) -> TsdbOptions {
        TsdbOptions {
            bucket_width: self.config.bucket_width_seconds,
            compress: self.config.compress_chunks,
            sink: Arc::clone(&self.sink),
        }
    }
}

fn build_module(
    kind: ModuleKind,
    config: &NodeConfig,
    bus: &Arc<EventBus>,
    sink: &SharedSink,
) -> Result<Box<dyn NodeModule>, Error> {
    let module: Box<dyn NodeModule> = match kind {
        ModuleKind::Lock => Box::new(LockModule::new(&config.data_dir)),
        ModuleKind::DataStat => Box::new(DataStatModule::new(
            &config.data_dir,
            TsdbOptions {
                bucket_width: config.bucket_width_seconds,
                compress: config.compress_chunks,
                sink: Arc::clone(sink),
            },
            Arc::clone(bus),
        )?),
        // the miner signs what it mints; everything else runs keyless
        ModuleKind::Wallet => match config.mode {
            RunMode::Miner => Box::new(HotWalletModule::new()),
            _ => Box::new(OfflineWalletModule),
        },
        ModuleKind::Network => Box::new(NetworkModule::new(
            config.listen_addr,
            Arc::clone(bus),
            Arc::clone(sink),
        )),
        ModuleKind::HttpServer => Box::new(HttpServerModule::new(
            config.rpc_addr,
            Arc::clone(bus),
            Arc::clone(sink),
        )),
        other => Box::new(ServiceModule::new(other, Arc::clone(bus), Arc::clone(sink))),
    };
    Ok(module)
}

fn init_logging(config: &NodeConfig) -> Result<(), Error> {
    if config.debug {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Debug)
            .try_init();
        return Ok(());
    }
    let log_path = config.data_dir.join(buildcfg::LOG_FILE_NAME);
    FileLogger::new(
        &log_path,
        config.log_file_size_mb * 1024 * 1024,
        config.log_history_count,
        LevelFilter::Info,
    )?
    .install()
}
