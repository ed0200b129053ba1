//! # simwallet: reorg-safe in-memory wallet for node test harnesses.
//!
//! Tracks coins paid to a flat keyspace from block notifications, reverses
//! disconnected blocks exactly, and funds transactions with greedy coin
//! selection.
//!
//! # Modules
//!
//! - [`ledger`]: UTXO records, balance, reservations
//! - [`journal`]: per-height undo entries
//! - [`keyring`]: tracked addresses by key index
//! - [`state`]: ledger, journal, keys and synced height under one lock
//! - [`sync`]: ordered event queue and the synchronizer task
//! - [`coin_selection`]: greedy first-fit selection with size-based fees
//! - [`builder`]: funding requests and funded transactions
//! - [`wallet`]: the harness-facing wallet
//! - [`simchain`]: scripted chain delivering notifications

pub mod builder;
pub mod coin_selection;
pub mod config;
pub mod error;
pub mod journal;
pub mod keyring;
pub mod ledger;
pub mod simchain;
pub mod state;
pub mod sync;
pub mod wallet;

pub use builder::{CreateTransactionArgs, FundedTransaction};
pub use coin_selection::{CoinSelection, CoinSelector};
pub use config::WalletConfig;
pub use error::WalletError;
pub use ledger::{Balance, Utxo};
pub use simchain::{SimBlock, SimChain};
pub use state::UnspentOutput;
pub use wallet::{InMemoryWallet, WalletInfo};
