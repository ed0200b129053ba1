//! Wallet error types.

use simwallet_core::error::{CodecError, FilterError, KeyError};
use thiserror::Error;

/// Errors that can occur in wallet operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    /// Spendable value does not cover the requested outputs plus fee.
    #[error("insufficient funds: have {have}, need {need}")]
    InsufficientFunds {
        /// Spendable value examined, in atoms.
        have: u64,
        /// Outputs plus the fee at the last examined size, in atoms.
        need: u64,
    },

    /// Ledger and journal can no longer be trusted. Fatal for the synchronizer.
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// The simulated wallet does not implement this operation.
    #[error("unsupported operation: {0}")]
    Unsupported(String),

    /// The chain synchronizer has stopped.
    #[error("chain synchronizer stopped")]
    Stopped,

    /// The chain synchronizer has not been started.
    #[error("chain synchronizer not started")]
    NotStarted,

    /// The chain synchronizer was already started.
    #[error("chain synchronizer already started")]
    AlreadyStarted,

    /// Invalid monetary amount or fee rate.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Transaction build error.
    #[error("build error: {0}")]
    BuildError(String),

    /// Timed out waiting for the wallet to reach a height.
    #[error("timed out waiting for height {desired}, synced to {synced}")]
    SyncTimeout {
        desired: u64,
        synced: u64,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Filter(#[from] FilterError),
}
