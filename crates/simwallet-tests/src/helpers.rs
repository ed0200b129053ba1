//! Shared fixtures for integration tests.

use parking_lot::Mutex;
use simwallet::{InMemoryWallet, SimChain, WalletConfig};
use simwallet_core::address::Address;
use simwallet_core::constants::{DEFAULT_PK_SCRIPT_VERSION, DEFAULT_TX_VERSION, MAX_TX_IN_SEQUENCE, NetworkType};
use simwallet_core::error::FilterError;
use simwallet_core::keys::p2pkh_script;
use simwallet_core::traits::TxFilter;
use simwallet_core::types::{OutPoint, Transaction, TxInput, TxOutput};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Fixed seed so addresses are stable across runs.
pub const TEST_SEED: [u8; 32] = [0x5e; 32];

/// Coinbase value used by the maturity scenarios.
pub const TEST_SUBSIDY: u64 = 500_000_000;

/// Height of the first block mined by [`chain_for`].
pub const FIRST_HEIGHT: u64 = 100;

/// One recorded `load_tx_filter` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCall {
    pub reload: bool,
    pub addresses: Vec<Address>,
}

/// Filter that records every registration and can be told to reject.
#[derive(Debug, Default)]
pub struct RecordingTxFilter {
    calls: Mutex<Vec<FilterCall>>,
    failing: AtomicBool,
}

impl RecordingTxFilter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<FilterCall> {
        self.calls.lock().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl TxFilter for RecordingTxFilter {
    fn load_tx_filter(&self, reload: bool, addresses: &[Address]) -> Result<(), FilterError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(FilterError::Rejected("filter offline".into()));
        }
        self.calls.lock().push(FilterCall {
            reload,
            addresses: addresses.to_vec(),
        });
        Ok(())
    }
}

/// Regtest configuration with the given coinbase maturity.
pub fn test_config(maturity: u64) -> WalletConfig {
    WalletConfig::regtest().with_coinbase_maturity(maturity)
}

/// Unstarted wallet over [`TEST_SEED`] and a recording filter.
pub fn make_wallet(config: WalletConfig) -> (Arc<InMemoryWallet>, Arc<RecordingTxFilter>) {
    let filter = RecordingTxFilter::new();
    let wallet = InMemoryWallet::from_seed(config, TEST_SEED, filter.clone()).unwrap();
    (wallet, filter)
}

/// Started regtest wallet with the given coinbase maturity.
pub async fn started_wallet(maturity: u64) -> (Arc<InMemoryWallet>, Arc<RecordingTxFilter>) {
    let (wallet, filter) = make_wallet(test_config(maturity));
    wallet.start().await.unwrap();
    (wallet, filter)
}

/// Chain notifying `wallet`, first block at [`FIRST_HEIGHT`], paying [`TEST_SUBSIDY`].
pub fn chain_for(wallet: &Arc<InMemoryWallet>) -> SimChain {
    SimChain::new(wallet.clone(), FIRST_HEIGHT).with_subsidy(TEST_SUBSIDY)
}

/// Script paying the wallet's coinbase address.
pub fn coinbase_script(wallet: &InMemoryWallet) -> Vec<u8> {
    p2pkh_script(wallet.coinbase_address())
}

/// Script paying an address the wallet does not own.
pub fn foreign_script(tag: u8) -> Vec<u8> {
    p2pkh_script(&Address::from_key_hash([tag; 20], NetworkType::Regtest))
}

/// Output paying `value` to `pk_script`.
pub fn make_output(value: u64, pk_script: Vec<u8>) -> TxOutput {
    TxOutput {
        value,
        version: DEFAULT_PK_SCRIPT_VERSION,
        pk_script,
    }
}

/// Unsigned transaction spending `spends` (outpoint, value) into `outputs`.
pub fn make_tx(spends: &[(OutPoint, u64)], outputs: Vec<TxOutput>) -> Transaction {
    Transaction {
        version: DEFAULT_TX_VERSION,
        inputs: spends
            .iter()
            .map(|(outpoint, value)| TxInput {
                previous_output: outpoint.clone(),
                value_in: *value,
                sequence: MAX_TX_IN_SEQUENCE,
                signature_script: Vec::new(),
            })
            .collect(),
        outputs,
        lock_time: 0,
        expiry: 0,
    }
}

/// Mine one coinbase to the wallet, then `extra` foreign blocks so the
/// coinbase matures once `extra` reaches the maturity. Returns the coinbase outpoint.
pub async fn fund_wallet(wallet: &InMemoryWallet, chain: &mut SimChain, extra: u64) -> OutPoint {
    let outpoint = chain
        .mine_block(&coinbase_script(wallet), Vec::new())
        .unwrap()
        .coinbase_outpoint()
        .unwrap();
    chain.mine_blocks(extra, &foreign_script(0xEE)).unwrap();
    wallet.flush().await.unwrap();
    outpoint
}
