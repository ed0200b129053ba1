//! Integration test suite for the simulated wallet.
//!
//! Tests drive an [`simwallet::InMemoryWallet`] through a
//! [`simwallet::SimChain`] and check balances, funding, and reorg behaviour
//! the way a node test harness would observe them.

pub mod helpers;
