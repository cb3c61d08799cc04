//! Node configuration: command line over an optional JSON file.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use anyhow::{bail, format_err, Error};
use clap::Parser;
use serde::Deserialize;

use crate::buildcfg;
use crate::ctsdb::DEFAULT_BUCKET_WIDTH;
use crate::node::modes::RunMode;

/// The command line surface.
#[derive(Debug, Parser)]
#[command(name = "metabasenet", version, about = "MetabaseNet node")]
pub struct Cli {
    /// Remove all persisted chain state and exit.
    #[arg(long)]
    pub purge: bool,

    /// Run detached from the terminal (handled by the service
    /// manager; the flag is recorded for it).
    #[arg(long)]
    pub daemon: bool,

    /// Join the test network.
    #[arg(long)]
    pub testnet: bool,

    /// Data directory (default: ~/.metabasenet).
    #[arg(long, value_name = "PATH")]
    pub datadir: Option<PathBuf>,

    /// Log to stderr at debug level instead of the node log file.
    #[arg(long)]
    pub debug: bool,

    /// Run mode when not purging.
    #[arg(long, value_enum)]
    pub mode: Option<RunMode>,
}

/// Keys accepted in `metabasenet.json`. Command line flags win.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    mode: Option<RunMode>,
    bucket_width_seconds: Option<u64>,
    compress_chunks: Option<bool>,
    listen_port: Option<u16>,
    rpc_port: Option<u16>,
    log_file_size_mb: Option<u64>,
    log_history_count: Option<usize>,
}

/// Fully resolved configuration, the only view the rest of the node
/// sees.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub mode: RunMode,
    pub data_dir: PathBuf,
    pub testnet: bool,
    pub daemon: bool,
    pub debug: bool,
    pub bucket_width_seconds: u64,
    pub compress_chunks: bool,
    pub listen_addr: SocketAddr,
    pub rpc_addr: SocketAddr,
    pub log_file_size_mb: u64,
    pub log_history_count: usize,
}

impl NodeConfig {
    /// Resolve the command line against the optional config file.
    /// Every failure here is a configuration error.
    pub fn resolve(cli: Cli) -> Result<Self, Error> {
        let data_dir = match cli.datadir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        let data_dir = if cli.testnet {
            data_dir.join(buildcfg::TESTNET_DIR_NAME)
        } else {
            data_dir
        };

        let file = read_file_config(&data_dir.join(buildcfg::CONFIG_FILE_NAME))?;

        let mode = if cli.purge {
            RunMode::Purge
        } else {
            cli.mode.or(file.mode).unwrap_or(RunMode::Server)
        };

        let bucket_width_seconds = file.bucket_width_seconds.unwrap_or(DEFAULT_BUCKET_WIDTH);
        if bucket_width_seconds == 0 {
            bail!("bucket_width_seconds must be positive");
        }

        let log_file_size_mb = file.log_file_size_mb.unwrap_or(16);
        if !buildcfg::LOG_FILE_SIZE_RANGE_MB.contains(&log_file_size_mb) {
            bail!(
                "log_file_size_mb {} outside accepted range {:?}",
                log_file_size_mb,
                buildcfg::LOG_FILE_SIZE_RANGE_MB
            );
        }
        let log_history_count = file.log_history_count.unwrap_or(8);
        if !buildcfg::LOG_HISTORY_RANGE.contains(&log_history_count) {
            bail!(
                "log_history_count {} outside accepted range {:?}",
                log_history_count,
                buildcfg::LOG_HISTORY_RANGE
            );
        }

        let port_offset = if cli.testnet {
            buildcfg::TESTNET_PORT_OFFSET
        } else {
            0
        };
        let listen_port = file
            .listen_port
            .unwrap_or(buildcfg::DEFAULT_P2P_PORT + port_offset);
        let rpc_port = file
            .rpc_port
            .unwrap_or(buildcfg::DEFAULT_RPC_PORT + port_offset);
        if listen_port == rpc_port {
            bail!("listen_port and rpc_port must differ ({})", listen_port);
        }

        Ok(NodeConfig {
            mode,
            data_dir,
            testnet: cli.testnet,
            daemon: cli.daemon,
            debug: cli.debug,
            bucket_width_seconds,
            compress_chunks: file.compress_chunks.unwrap_or(true),
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), listen_port),
            rpc_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), rpc_port),
            log_file_size_mb,
            log_history_count,
        })
    }
}

fn default_data_dir() -> Result<PathBuf, Error> {
    let home = std::env::var_os("HOME")
        .ok_or_else(|| format_err!("cannot determine the home directory"))?;
    Ok(PathBuf::from(home).join(buildcfg::DEFAULT_DATA_DIR_NAME))
}

fn read_file_config(path: &Path) -> Result<FileConfig, Error> {
    match std::fs::read(path) {
        Ok(raw) => serde_json::from_slice(&raw)
            .map_err(|err| format_err!("unable to parse {:?} - {}", path, err)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(FileConfig::default()),
        Err(err) => Err(format_err!("unable to read {:?} - {}", path, err)),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("metabasenet").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(config.mode, RunMode::Server);
        assert_eq!(config.bucket_width_seconds, DEFAULT_BUCKET_WIDTH);
        assert!(config.compress_chunks);
        assert_eq!(config.listen_addr.port(), buildcfg::DEFAULT_P2P_PORT);
        assert_eq!(config.rpc_addr.port(), buildcfg::DEFAULT_RPC_PORT);
    }

    #[test]
    fn purge_flag_wins_over_mode() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
            "--mode",
            "miner",
            "--purge",
        ]))
        .unwrap();
        assert_eq!(config.mode, RunMode::Purge);
    }

    #[test]
    fn testnet_gets_its_own_directory_and_ports() {
        let dir = tempfile::tempdir().unwrap();
        let config = NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
            "--testnet",
        ]))
        .unwrap();
        assert!(config.data_dir.ends_with(buildcfg::TESTNET_DIR_NAME));
        assert_eq!(
            config.listen_addr.port(),
            buildcfg::DEFAULT_P2P_PORT + buildcfg::TESTNET_PORT_OFFSET
        );
    }

    #[test]
    fn config_file_is_merged_under_the_command_line() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(buildcfg::CONFIG_FILE_NAME),
            r#"{ "mode": "miner", "bucket_width_seconds": 60, "compress_chunks": false }"#,
        )
        .unwrap();

        let config = NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(config.mode, RunMode::Miner);
        assert_eq!(config.bucket_width_seconds, 60);
        assert!(!config.compress_chunks);

        let config = NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
            "--mode",
            "client",
        ]))
        .unwrap();
        assert_eq!(config.mode, RunMode::Client);
    }

    #[test]
    fn invalid_values_are_configuration_errors() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(buildcfg::CONFIG_FILE_NAME),
            r#"{ "bucket_width_seconds": 0 }"#,
        )
        .unwrap();
        assert!(NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
        ]))
        .is_err());

        std::fs::write(
            dir.path().join(buildcfg::CONFIG_FILE_NAME),
            r#"{ "log_file_size_mb": 4096 }"#,
        )
        .unwrap();
        assert!(NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
        ]))
        .is_err());

        std::fs::write(
            dir.path().join(buildcfg::CONFIG_FILE_NAME),
            r#"{ "no_such_key": true }"#,
        )
        .unwrap();
        assert!(NodeConfig::resolve(cli(&[
            "--datadir",
            dir.path().to_str().unwrap(),
        ]))
        .is_err());
    }
}
