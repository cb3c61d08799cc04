//! Run modes and the module selection table.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// How the process was asked to run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Server,
    Miner,
    Client,
    Purge,
}

/// Every module kind the node knows how to instantiate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    Lock,
    BlockMaker,
    CoreProtocol,
    Dispatcher,
    HttpGet,
    HttpServer,
    NetChannel,
    BlockChannel,
    CertTxChannel,
    UserTxChannel,
    DelegatedChannel,
    Network,
    RpcClient,
    RpcMode,
    Service,
    TxPool,
    Wallet,
    Blockchain,
    ForkManager,
    Consensus,
    DataStat,
    Recovery,
}

impl ModuleKind {
    /// Stable module name used for container lookup.
    pub fn module_name(&self) -> &'static str {
        match self {
            ModuleKind::Lock => "lock",
            ModuleKind::BlockMaker => "blockmaker",
            ModuleKind::CoreProtocol => "coreprotocol",
            ModuleKind::Dispatcher => "dispatcher",
            ModuleKind::HttpGet => "httpget",
            ModuleKind::HttpServer => "httpserver",
            ModuleKind::NetChannel => "netchannel",
            ModuleKind::BlockChannel => "blockchannel",
            ModuleKind::CertTxChannel => "certtxchannel",
            ModuleKind::UserTxChannel => "usertxchannel",
            ModuleKind::DelegatedChannel => "delegatedchannel",
            ModuleKind::Network => "network",
            ModuleKind::RpcClient => "rpcclient",
            ModuleKind::RpcMode => "rpcmode",
            ModuleKind::Service => "service",
            ModuleKind::TxPool => "txpool",
            ModuleKind::Wallet => "wallet",
            ModuleKind::Blockchain => "blockchain",
            ModuleKind::ForkManager => "forkmanager",
            ModuleKind::Consensus => "consensus",
            ModuleKind::DataStat => "datastat",
            ModuleKind::Recovery => "recovery",
        }
    }
}

/// The ordered module selection for a run mode. A pure table, consulted
/// once at entry. `Lock` always leads: nothing touches the data
/// directory before the exclusive lock is held.
pub fn module_kinds(mode: RunMode) -> &'static [ModuleKind] {
    use ModuleKind::*;
    match mode {
        RunMode::Server => &[
            Lock,
            CoreProtocol,
            Blockchain,
            ForkManager,
            TxPool,
            Wallet,
            Service,
            Dispatcher,
            Network,
            NetChannel,
            BlockChannel,
            CertTxChannel,
            UserTxChannel,
            DelegatedChannel,
            HttpServer,
            HttpGet,
            RpcMode,
            DataStat,
            Recovery,
        ],
        RunMode::Miner => &[
            Lock,
            CoreProtocol,
            Blockchain,
            ForkManager,
            TxPool,
            Wallet,
            Service,
            Dispatcher,
            Network,
            NetChannel,
            BlockChannel,
            CertTxChannel,
            UserTxChannel,
            DelegatedChannel,
            Consensus,
            BlockMaker,
            HttpServer,
            HttpGet,
            RpcMode,
            DataStat,
            Recovery,
        ],
        RunMode::Client => &[Lock, RpcClient],
        RunMode::Purge => &[Lock],
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lock_always_leads() {
        for mode in [RunMode::Server, RunMode::Miner, RunMode::Client, RunMode::Purge] {
            assert_eq!(module_kinds(mode)[0], ModuleKind::Lock);
        }
    }

    #[test]
    fn no_mode_repeats_a_kind() {
        for mode in [RunMode::Server, RunMode::Miner, RunMode::Client, RunMode::Purge] {
            let kinds = module_kinds(mode);
            let unique: std::collections::HashSet<_> = kinds.iter().collect();
            assert_eq!(unique.len(), kinds.len());
        }
    }

    #[test]
    fn every_kind_is_reachable_from_some_mode() {
        let mut reachable = std::collections::HashSet::new();
        for mode in [RunMode::Server, RunMode::Miner, RunMode::Client, RunMode::Purge] {
            reachable.extend(module_kinds(mode).iter().copied());
        }
        assert!(reachable.contains(&ModuleKind::Consensus));
        assert!(reachable.contains(&ModuleKind::BlockMaker));
        assert!(reachable.contains(&ModuleKind::RpcClient));
        assert_eq!(reachable.len(), 22);
    }
}
