//! The wallet capability and its two realizations.
//!
//! Callers only ever see [Wallet]; whether the node carries keys is
//! decided once, at entry, by which realization gets attached.

use anyhow::Error;

use crate::node::module::NodeModule;
use crate::types::Uint256;

/// What the rest of the node may ask of a wallet.
pub trait Wallet {
    /// True when this realization can sign.
    fn ready(&self) -> bool;

    /// Number of known public key hashes.
    fn address_count(&self) -> usize;

    fn contains(&self, address: &Uint256) -> bool;
}

/// Keyed wallet backing the miner mode. Key material handling lives in
/// a separate component; this realization tracks the address set and
/// answers capability queries.
pub struct HotWalletModule {
    addresses: Vec<Uint256>,
}

impl HotWalletModule {
    pub fn new() -> Self {
        Self {
            addresses: Vec::new(),
        }
    }

    pub fn import_address(&mut self, address: Uint256) {
        if !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
    }
}

impl Default for HotWalletModule {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeModule for HotWalletModule {
    fn name(&self) -> &'static str {
        "wallet"
    }

    fn initialize(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        self.addresses.clear();
        Ok(())
    }

    fn as_wallet(&self) -> Option<&dyn Wallet> {
        Some(self)
    }
}

impl Wallet for HotWalletModule {
    fn ready(&self) -> bool {
        true
    }

    fn address_count(&self) -> usize {
        self.addresses.len()
    }

    fn contains(&self, address: &Uint256) -> bool {
        self.addresses.contains(address)
    }
}

/// Placeholder realization for modes that must never touch keys.
pub struct OfflineWalletModule;

impl NodeModule for OfflineWalletModule {
    fn name(&self) -> &'static str {
        "wallet"
    }

    fn initialize(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn run(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn halt(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn deinitialize(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn as_wallet(&self) -> Option<&dyn Wallet> {
        Some(self)
    }
}

impl Wallet for OfflineWalletModule {
    fn ready(&self) -> bool {
        false
    }

    fn address_count(&self) -> usize {
        0
    }

    fn contains(&self, _address: &Uint256) -> bool {
        false
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hot_wallet_tracks_addresses() {
        let mut wallet = HotWalletModule::new();
        let addr = Uint256::from_low_u64(7);
        wallet.import_address(addr);
        wallet.import_address(addr);
        assert!(wallet.ready());
        assert_eq!(wallet.address_count(), 1);
        assert!(wallet.contains(&addr));
    }

    #[test]
    fn offline_wallet_answers_but_never_signs() {
        let wallet = OfflineWalletModule;
        assert!(!wallet.ready());
        assert_eq!(wallet.address_count(), 0);
        assert!(!wallet.contains(&Uint256::zero()));
    }
}
