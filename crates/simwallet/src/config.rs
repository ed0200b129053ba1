//! Wallet configuration.

use simwallet_core::constants::{DEFAULT_ACCOUNT_NAME, NetworkType};
use std::time::Duration;

/// Configuration for the in-memory wallet.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    /// Network whose parameters the wallet applies.
    pub network: NetworkType,
    /// Name of the only account the wallet accepts.
    pub default_account: String,
    /// How often `sync` re-checks the synced height.
    pub sync_poll_interval: Duration,
    /// Upper bound on a `sync` wait. `None` waits indefinitely.
    pub sync_timeout: Option<Duration>,
    /// First key index handed out by `new_address`. Index 0 is the coinbase key.
    pub first_address_index: u32,
    /// Replaces the key provider's coinbase maturity when set.
    pub coinbase_maturity_override: Option<u64>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: NetworkType::Regtest,
            default_account: DEFAULT_ACCOUNT_NAME.to_string(),
            sync_poll_interval: Duration::from_millis(100),
            sync_timeout: None,
            first_address_index: 1,
            coinbase_maturity_override: None,
        }
    }
}

impl WalletConfig {
    /// Configuration preset for regression-test chains.
    pub fn regtest() -> Self {
        Self::default()
    }

    /// Configuration preset for simulation chains.
    pub fn simnet() -> Self {
        Self {
            network: NetworkType::Simnet,
            ..Self::default()
        }
    }

    /// Configuration preset with mainnet parameters.
    pub fn mainnet() -> Self {
        Self {
            network: NetworkType::Mainnet,
            ..Self::default()
        }
    }

    /// Builder-style setter for the coinbase maturity override.
    pub fn with_coinbase_maturity(mut self, maturity: u64) -> Self {
        self.coinbase_maturity_override = Some(maturity);
        self
    }

    /// Builder-style setter for the sync timeout.
    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = Some(timeout);
        self
    }
}
