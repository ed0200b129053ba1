//! In-memory wallet: the harness-facing composition.
//!
//! [`InMemoryWallet`] owns the wallet state behind one read/write lock, the
//! producer side of the chain event queue, and the collaborators it was
//! built with. Block notifications decode on the caller and enqueue; the
//! synchronizer task applies them. Reads take the shared lock. Funding
//! selects under an upgradable read, reserves its inputs under the exclusive
//! lock, and asks the key provider for a change address with no lock held.

use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use serde::Serialize;
use simwallet_core::address::Address;
use simwallet_core::codec::BincodeCodec;
use simwallet_core::constants::{DEFAULT_PK_SCRIPT_VERSION, NetworkType};
use simwallet_core::keys::{Seed, SeededKeyProvider};
use simwallet_core::traits::{BlockNotifications, KeyProvider, TxCodec, TxFilter};
use simwallet_core::types::{OutPoint, TxInput, TxOutput};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::builder::{CreateTransactionArgs, FundedTransaction};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::keyring::TrackedAddress;
use crate::ledger::Balance;
use crate::state::{ChainUpdate, RelevantTx, UnspentOutput, WalletState};
use crate::sync::{ChainEvent, SyncHandle};

/// Key index reserved for the coinbase address.
pub const COINBASE_KEY_INDEX: u32 = 0;

/// Lock state reported by [`InMemoryWallet::wallet_info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WalletInfo {
    /// Always true: the simulated wallet has no passphrase.
    pub unlocked: bool,
    pub network: NetworkType,
    pub synced_height: u64,
    pub address_count: usize,
}

/// Simulated wallet for node test harnesses.
pub struct InMemoryWallet {
    config: WalletConfig,
    codec: Arc<dyn TxCodec>,
    keys: Arc<dyn KeyProvider>,
    filter: Arc<dyn TxFilter>,
    state: Arc<RwLock<WalletState>>,
    sync: SyncHandle,
    /// Receiver handed to the synchronizer task on start.
    pending: Mutex<Option<mpsc::UnboundedReceiver<ChainEvent>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    /// Next key index for `new_address`. Held across derivation and filter
    /// registration so indices are handed out exactly once.
    next_index: Mutex<u32>,
    coinbase_address: Address,
}

impl std::fmt::Debug for InMemoryWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryWallet")
            .field("network", &self.config.network)
            .field("synced_height", &self.state.read().synced_height())
            .field("running", &self.sync.is_running())
            .finish_non_exhaustive()
    }
}

impl InMemoryWallet {
    /// Create a wallet tracking the coinbase address at key index 0.
    ///
    /// # Errors
    ///
    /// [`WalletError::Key`] if the key provider is for a different network
    /// than `config` or cannot derive the coinbase address.
    pub fn new(
        config: WalletConfig,
        codec: Arc<dyn TxCodec>,
        keys: Arc<dyn KeyProvider>,
        filter: Arc<dyn TxFilter>,
    ) -> Result<Arc<Self>, WalletError> {
        if keys.network() != config.network {
            return Err(simwallet_core::error::KeyError::WrongNetwork {
                expected: config.network.to_string(),
                found: keys.network().to_string(),
            }
            .into());
        }

        let coinbase_maturity = config
            .coinbase_maturity_override
            .unwrap_or_else(|| keys.coinbase_maturity(config.network));

        let coinbase_address = keys.derive_address(COINBASE_KEY_INDEX)?;
        let mut state = WalletState::new(coinbase_maturity);
        state.track(TrackedAddress {
            index: COINBASE_KEY_INDEX,
            script_hash: keys.script_hash_of(&coinbase_address),
            address: coinbase_address.clone(),
            account: config.default_account.clone(),
        });

        let (sync, pending) = SyncHandle::channel();
        let next_index = config.first_address_index.max(COINBASE_KEY_INDEX + 1);

        info!(
            network = %config.network,
            coinbase_maturity,
            coinbase_address = %coinbase_address,
            "created in-memory wallet"
        );

        Ok(Arc::new(Self {
            config,
            codec,
            keys,
            filter,
            state: Arc::new(RwLock::new(state)),
            sync,
            pending: Mutex::new(Some(pending)),
            task: Mutex::new(None),
            next_index: Mutex::new(next_index),
            coinbase_address,
        }))
    }

    /// Wallet over a [`SeededKeyProvider`] and the [`BincodeCodec`].
    pub fn from_seed(
        config: WalletConfig,
        seed: [u8; 32],
        filter: Arc<dyn TxFilter>,
    ) -> Result<Arc<Self>, WalletError> {
        let keys = SeededKeyProvider::new(Seed::from_bytes(seed), config.network);
        Self::new(config, Arc::new(BincodeCodec), Arc::new(keys), filter)
    }

    /// Load every tracked address into the node filter and spawn the
    /// synchronizer task. Events delivered before start are applied first.
    ///
    /// # Errors
    ///
    /// [`WalletError::AlreadyStarted`] on a second call;
    /// [`WalletError::Filter`] if the filter reload fails, in which case
    /// the wallet may be started again.
    pub async fn start(&self) -> Result<(), WalletError> {
        let mut pending = self.pending.lock();
        if pending.is_none() {
            return Err(WalletError::AlreadyStarted);
        }

        let addresses = self.state.read().keyring().addresses();
        self.filter.load_tx_filter(true, &addresses)?;
        debug!(count = addresses.len(), "reloaded tx filter");

        let Some(events) = pending.take() else {
            return Err(WalletError::AlreadyStarted);
        };
        let handle = self.sync.spawn(events, Arc::clone(&self.state));
        *self.task.lock() = Some(handle);
        Ok(())
    }

    /// Queue the shutdown sentinel. Events already queued are still applied.
    pub fn stop(&self) {
        info!("stopping wallet");
        self.sync.stop();
    }

    /// Wait for the synchronizer task to exit after [`stop`](Self::stop).
    pub async fn stopped(&self) {
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("chain synchronizer task failed: {e}");
            }
        }
    }

    /// Release resources. Nothing to release for an in-memory wallet.
    pub fn dispose(&self) -> Result<(), WalletError> {
        Ok(())
    }

    /// Decode a connected block and queue it. Returns without waiting for
    /// the synchronizer.
    ///
    /// # Errors
    ///
    /// Undecodable bytes are an [`WalletError::IntegrityViolation`]: the
    /// fault is recorded and the synchronizer stops after applying the
    /// events queued before this one.
    pub fn ingest_block(&self, header: &[u8], transactions: &[Vec<u8>]) -> Result<(), WalletError> {
        self.ensure_open()?;
        let update = self.decode_update(header, transactions).inspect_err(|e| {
            error!("rejecting connected block: {e}");
            self.sync.fail(e.clone());
        })?;
        debug!(height = update.height, txs = update.transactions.len(), "queued connected block");
        self.sync.enqueue(ChainEvent::Connected(update))
    }

    /// Decode a disconnected block header and queue the unwind.
    pub fn unwind_block(&self, header: &[u8]) -> Result<(), WalletError> {
        self.ensure_open()?;
        let height = self.decode_height(header).inspect_err(|e| {
            error!("rejecting disconnected block: {e}");
            self.sync.fail(e.clone());
        })?;
        debug!(height, "queued disconnected block");
        self.sync.enqueue(ChainEvent::Disconnected { height })
    }

    fn ensure_open(&self) -> Result<(), WalletError> {
        self.sync.check()?;
        if self.sync.is_closed() {
            return Err(WalletError::Stopped);
        }
        Ok(())
    }

    fn decode_height(&self, header: &[u8]) -> Result<u64, WalletError> {
        self.codec
            .parse_block_header(header)
            .map(|h| h.height)
            .map_err(|e| WalletError::IntegrityViolation(format!("undecodable header: {e}")))
    }

    fn decode_update(&self, header: &[u8], transactions: &[Vec<u8>]) -> Result<ChainUpdate, WalletError> {
        let height = self.decode_height(header)?;
        let mut decoded = Vec::with_capacity(transactions.len());
        for (i, bytes) in transactions.iter().enumerate() {
            let tx = self.codec.parse_transaction(bytes).map_err(|e| {
                WalletError::IntegrityViolation(format!(
                    "undecodable transaction {i} at height {height}: {e}"
                ))
            })?;
            let hash = self.codec.tx_hash(&tx).map_err(|e| {
                WalletError::IntegrityViolation(format!("unhashable transaction {i} at height {height}: {e}"))
            })?;
            decoded.push(RelevantTx {
                hash,
                tree: self.codec.tx_tree(&tx),
                tx,
            });
        }
        Ok(ChainUpdate {
            height,
            transactions: decoded,
        })
    }

    /// Wait until every block event queued before this call is applied.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotStarted`] before [`start`](Self::start); the
    /// recorded fault or [`WalletError::Stopped`] once the synchronizer is gone.
    pub async fn flush(&self) -> Result<(), WalletError> {
        self.ensure_started()?;
        self.sync.flush().await
    }

    fn ensure_started(&self) -> Result<(), WalletError> {
        if self.pending.lock().is_some() {
            return Err(WalletError::NotStarted);
        }
        Ok(())
    }

    /// Wait until the synced height reaches `desired_height`, polling at the
    /// configured interval. Returns the synced height.
    ///
    /// # Errors
    ///
    /// [`WalletError::NotStarted`] before [`start`](Self::start); the
    /// recorded fault, [`WalletError::Stopped`] if the synchronizer exits
    /// first, or [`WalletError::SyncTimeout`] past the configured timeout.
    pub async fn sync(&self, desired_height: u64) -> Result<u64, WalletError> {
        self.ensure_started()?;
        let deadline = self
            .config
            .sync_timeout
            .map(|t| tokio::time::Instant::now() + t);
        let mut ticker = tokio::time::interval(self.config.sync_poll_interval);
        loop {
            ticker.tick().await;
            self.sync.check()?;
            let synced = self.synced_height();
            if synced >= desired_height {
                return Ok(synced);
            }
            if self.sync.is_closed() && !self.sync.is_running() {
                return Err(WalletError::Stopped);
            }
            if deadline.is_some_and(|d| tokio::time::Instant::now() >= d) {
                return Err(WalletError::SyncTimeout {
                    desired: desired_height,
                    synced,
                });
            }
        }
    }

    /// Last fully applied height.
    pub fn synced_height(&self) -> u64 {
        self.state.read().synced_height()
    }

    /// Address receiving coinbase rewards (key index 0).
    pub fn coinbase_address(&self) -> &Address {
        &self.coinbase_address
    }

    pub fn network(&self) -> NetworkType {
        self.config.network
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Confirmed balance: mature, unlocked records.
    pub fn balance(&self) -> Result<Balance, WalletError> {
        self.sync.check()?;
        Ok(self.state.read().balance())
    }

    /// Unlocked records owned by `account`, in ascending outpoint order.
    pub fn list_unspent(&self, account: &str) -> Result<Vec<UnspentOutput>, WalletError> {
        self.sync.check()?;
        Ok(self.state.read().list_unspent(account))
    }

    /// Spendable balance per account.
    pub fn list_accounts(&self) -> Result<BTreeMap<String, u64>, WalletError> {
        let balance = self.balance()?;
        let mut accounts = BTreeMap::new();
        accounts.insert(self.config.default_account.clone(), balance.spendable);
        Ok(accounts)
    }

    /// Derive the next address, register it with the node filter, and track it.
    ///
    /// # Errors
    ///
    /// [`WalletError::Unsupported`] for any account but the default one.
    pub fn new_address(&self, account: &str) -> Result<Address, WalletError> {
        if account != self.config.default_account {
            return Err(WalletError::Unsupported(format!(
                "accounts other than {:?}",
                self.config.default_account
            )));
        }

        let mut next = self.next_index.lock();
        let index = *next;
        let address = self.keys.derive_address(index)?;
        self.filter.load_tx_filter(false, std::slice::from_ref(&address))?;

        self.state.write().track(TrackedAddress {
            index,
            script_hash: self.keys.script_hash_of(&address),
            address: address.clone(),
            account: account.to_string(),
        });
        *next = index
            .checked_add(1)
            .ok_or_else(|| WalletError::Unsupported("key index space exhausted".into()))?;

        debug!(index, address = %address, "derived address");
        Ok(address)
    }

    /// Fund the requested outputs from the ledger.
    ///
    /// Inputs are chosen greedily in ledger order and reserved so later
    /// funding and balance queries exclude them until [`unlock_outputs`]
    /// or until a connected block spends them. With `args.change` set and
    /// value left over, one change output paying a fresh address is
    /// appended; otherwise the leftover joins the fee.
    ///
    /// # Errors
    ///
    /// [`WalletError::InsufficientFunds`] leaves the ledger untouched.
    ///
    /// [`unlock_outputs`]: Self::unlock_outputs
    pub fn create_transaction(&self, args: &CreateTransactionArgs) -> Result<FundedTransaction, WalletError> {
        self.sync.check()?;
        let skeleton = args.skeleton()?;

        let selection = {
            let state = self.state.upgradable_read();
            let selection = state.select_coins(&args.account, skeleton, args.fee_rate, self.codec.as_ref())?;
            let mut state = RwLockUpgradableReadGuard::upgrade(state);
            state.lock_outputs(&selection.selected);
            selection
        };

        let mut funded = FundedTransaction {
            tx: selection.tx,
            inputs: selection.selected,
            fee: selection.fee,
            change: 0,
            change_address: None,
        };

        if selection.change > 0 {
            if args.change {
                let address = match self.new_address(&self.config.default_account) {
                    Ok(address) => address,
                    Err(e) => {
                        self.state.write().unlock_outputs(&funded.inputs);
                        return Err(e);
                    }
                };
                funded.tx.outputs.push(TxOutput {
                    value: selection.change,
                    version: DEFAULT_PK_SCRIPT_VERSION,
                    pk_script: self.keys.pay_to_address_script(&address),
                });
                funded.change = selection.change;
                funded.change_address = Some(address);
            } else {
                funded.fee = funded.fee.saturating_add(selection.change);
            }
        }

        info!(
            inputs = funded.inputs.len(),
            fee = funded.fee,
            change = funded.change,
            size = selection.size,
            "funded transaction"
        );
        Ok(funded)
    }

    /// Clear the reservation on the outpoints these inputs spend.
    pub fn unlock_outputs(&self, inputs: &[TxInput]) -> Result<(), WalletError> {
        let n = self
            .state
            .write()
            .unlock_outputs(inputs.iter().map(|i| &i.previous_output));
        debug!(requested = inputs.len(), unlocked = n, "unlocked outputs");
        Ok(())
    }

    /// Clear the reservation on these outpoints.
    pub fn unlock_outpoints(&self, outpoints: &[OutPoint]) -> Result<(), WalletError> {
        self.state.write().unlock_outputs(outpoints);
        Ok(())
    }

    pub fn wallet_info(&self) -> WalletInfo {
        let state = self.state.read();
        WalletInfo {
            unlocked: true,
            network: self.config.network,
            synced_height: state.synced_height(),
            address_count: state.keyring().len(),
        }
    }

    /// Accepted and ignored: the wallet has no passphrase.
    pub fn wallet_lock(&self) -> Result<(), WalletError> {
        Ok(())
    }

    /// Accepted and ignored: the wallet has no passphrase.
    pub fn wallet_unlock(&self, _passphrase: &str, _timeout_secs: u64) -> Result<(), WalletError> {
        Ok(())
    }

    pub fn create_new_account(&self, name: &str) -> Result<(), WalletError> {
        Err(WalletError::Unsupported(format!("create_new_account({name})")))
    }

    pub fn validate_address(&self, address: &Address) -> Result<bool, WalletError> {
        Err(WalletError::Unsupported(format!("validate_address({address})")))
    }

    pub fn send_from(&self, account: &str, address: &Address, amount: u64) -> Result<(), WalletError> {
        Err(WalletError::Unsupported(format!(
            "send_from({account}, {address}, {amount})"
        )))
    }
}

impl BlockNotifications for InMemoryWallet {
    fn block_connected(&self, header: &[u8], transactions: &[Vec<u8>]) {
        if let Err(e) = self.ingest_block(header, transactions) {
            warn!("block connected notification dropped: {e}");
        }
    }

    fn block_disconnected(&self, header: &[u8]) {
        if let Err(e) = self.unwind_block(header) {
            warn!("block disconnected notification dropped: {e}");
        }
    }
}

impl Drop for InMemoryWallet {
    fn drop(&mut self) {
        self.sync.stop();
    }
}
