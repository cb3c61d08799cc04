//! The module lifecycle contract.

use anyhow::Error;

use crate::node::wallet::Wallet;

/// Where the container currently is in the shared lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecyclePhase {
    Constructed,
    Initialized,
    Running,
    Halted,
    Deinitialized,
}

/// Minimal interface RPC-facing callers resolve a module by.
pub trait HttpHost {
    fn listen_addr(&self) -> std::net::SocketAddr;
}

/// A long-lived node service driven by the container.
///
/// Modules advance `initialize -> run -> halt -> deinitialize`.
/// Lifecycle calls execute on one thread and never recurse into the
/// container; modules that need peers talk over the event bus, and
/// modules that need workers spawn them in `run` and join them in
/// `halt`.
pub trait NodeModule: Send {
    /// Stable lookup name.
    fn name(&self) -> &'static str;

    fn initialize(&mut self) -> Result<(), Error>;
    fn run(&mut self) -> Result<(), Error>;
    fn halt(&mut self) -> Result<(), Error>;
    fn deinitialize(&mut self) -> Result<(), Error>;

    /// Wallet capability, when this module realizes one.
    fn as_wallet(&self) -> Option<&dyn Wallet> {
        None
    }

    /// RPC host capability, when this module serves HTTP.
    fn as_http_host(&self) -> Option<&dyn HttpHost> {
        None
    }
}
