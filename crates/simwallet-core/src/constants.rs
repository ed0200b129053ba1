//! Harness constants. All monetary values in atoms (1 coin = 10^8 atoms).

use serde::{Deserialize, Serialize};
use std::fmt;

pub const COIN: u64 = 100_000_000;

/// Name of the single account the simulated wallet supports.
pub const DEFAULT_ACCOUNT_NAME: &str = "default";

/// Upper bound on a standard signature script: a push of a DER signature
/// with sighash byte (1 + 73) followed by a push of a compressed pubkey (1 + 33).
pub const SIG_SCRIPT_ESTIMATE: usize = 1 + 73 + 1 + 33;

/// Script version stamped on outputs the wallet builds.
pub const DEFAULT_PK_SCRIPT_VERSION: u16 = 0;

/// Transaction version used when the caller does not choose one.
pub const DEFAULT_TX_VERSION: u16 = 1;

/// Sequence number of inputs added during funding.
pub const MAX_TX_IN_SEQUENCE: u32 = u32::MAX;

/// Network the harness chain runs as.
///
/// Only the parameters the wallet consumes are modelled: coinbase maturity
/// and the address prefix byte.
///
/// # Examples
///
/// ```
/// use simwallet_core::constants::NetworkType;
/// assert_eq!(NetworkType::Regtest.coinbase_maturity(), 16);
/// assert_eq!(NetworkType::default(), NetworkType::Regtest);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NetworkType {
    /// Production parameters.
    Mainnet,
    /// Public test network.
    Testnet,
    /// Simulation network used by harness chains with generated blocks.
    Simnet,
    /// Local regression-test network.
    #[default]
    Regtest,
}

impl NetworkType {
    /// Confirmations a coinbase output needs before it can be spent.
    pub fn coinbase_maturity(&self) -> u64 {
        match self {
            Self::Mainnet => 256,
            Self::Testnet | Self::Simnet | Self::Regtest => 16,
        }
    }

    /// Version byte prepended to encoded addresses.
    pub fn address_prefix(&self) -> u8 {
        match self {
            Self::Mainnet => 0x3f,
            Self::Testnet => 0x6f,
            Self::Simnet => 0x73,
            Self::Regtest => 0x7a,
        }
    }

    /// Short lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Simnet => "simnet",
            Self::Regtest => "regtest",
        }
    }
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for NetworkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mainnet" => Ok(Self::Mainnet),
            "testnet" => Ok(Self::Testnet),
            "simnet" => Ok(Self::Simnet),
            "regtest" => Ok(Self::Regtest),
            other => Err(format!("unknown network: {other}")),
        }
    }
}
