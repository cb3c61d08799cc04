use std::process::exit;

use anyhow::Error;
use clap::Parser;

use metabasenet::config::{Cli, NodeConfig};
use metabasenet::entry::{Entry, EXIT_CONFIG, EXIT_OK};
use metabasenet::node::modes::RunMode;

fn main() {
    let cli = Cli::parse();

    let config = match NodeConfig::resolve(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(EXIT_CONFIG);
        }
    };
    let purge = config.mode == RunMode::Purge;
    if config.daemon {
        // daemonization is the service manager's job; the node itself
        // always runs in the foreground
        eprintln!("Note: --daemon is delegated to the service manager");
    }

    let mut entry = match Entry::new(config) {
        Ok(entry) => entry,
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(err.exit_code());
        }
    };

    if purge {
        match entry.purge() {
            Ok(()) => exit(EXIT_OK),
            Err(err) => {
                eprintln!("Error: {}", err);
                exit(err.exit_code());
            }
        }
    }

    if let Err(err) = entry.startup() {
        eprintln!("Error: {}", err);
        exit(err.exit_code());
    }

    if let Err(err) = wait_for_shutdown() {
        log::warn!("signal wait failed - {}", err);
    }

    entry.exit();
    exit(EXIT_OK);
}

fn wait_for_shutdown() -> Result<(), Error> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
        Ok::<(), Error>(())
    })
}
