//! Ledger, undo journal, tracked keys and synced height as one lockable unit.

use serde::Serialize;
use simwallet_core::address::Address;
use simwallet_core::traits::TxCodec;
use simwallet_core::types::{Hash256, OutPoint, Transaction, TxTree};

use crate::coin_selection::{CoinSelection, CoinSelector};
use crate::error::WalletError;
use crate::journal::{ReorgJournal, UndoEntry};
use crate::keyring::{Keyring, TrackedAddress};
use crate::ledger::{Balance, Ledger, Utxo};

/// A decoded transaction relevant to the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevantTx {
    /// Hash keying the transaction's outputs.
    pub hash: Hash256,
    pub tree: TxTree,
    pub tx: Transaction,
}

/// A connected block reduced to what the wallet applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainUpdate {
    pub height: u64,
    /// Filtered transactions in block order.
    pub transactions: Vec<RelevantTx>,
}

/// Result of connecting one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectResult {
    /// Records created by this block's outputs.
    pub utxos_created: usize,
    /// Records destroyed by this block's inputs.
    pub utxos_spent: usize,
}

/// Result of disconnecting one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectResult {
    /// Records spent by the block and now unspent again.
    pub utxos_restored: usize,
    /// Records created by the block and now gone.
    pub utxos_removed: usize,
}

/// A ledger record as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnspentOutput {
    pub outpoint: OutPoint,
    pub account: String,
    pub address: Option<Address>,
    pub value: u64,
    pub pk_script: Vec<u8>,
    pub maturity_height: u64,
    /// Blocks since maturity counting the maturity block itself; 0 while immature.
    pub confirmations: u64,
    /// Mature at the current synced height.
    pub spendable: bool,
}

/// Everything guarded by the wallet's single read/write lock.
#[derive(Debug)]
pub struct WalletState {
    ledger: Ledger,
    journal: ReorgJournal,
    keyring: Keyring,
    synced_height: u64,
    coinbase_maturity: u64,
}

impl WalletState {
    pub fn new(coinbase_maturity: u64) -> Self {
        Self {
            ledger: Ledger::new(),
            journal: ReorgJournal::new(),
            keyring: Keyring::new(),
            synced_height: 0,
            coinbase_maturity,
        }
    }

    /// Apply a connected block: outputs then inputs of each transaction in
    /// order, recorded into a fresh undo entry stored under the height.
    ///
    /// # Errors
    ///
    /// [`WalletError::IntegrityViolation`] if the height is not above the
    /// journal tip or an output would be created twice.
    pub fn apply_update(&mut self, update: &ChainUpdate) -> Result<ConnectResult, WalletError> {
        if let Some(tip) = self.journal.tip().filter(|&tip| update.height <= tip) {
            return Err(WalletError::IntegrityViolation(format!(
                "connect of height {} at or below journal tip {tip}",
                update.height
            )));
        }
        self.synced_height = update.height;

        let mut undo = UndoEntry::new();
        let mut result = ConnectResult {
            utxos_created: 0,
            utxos_spent: 0,
        };
        for rtx in &update.transactions {
            let is_coinbase = rtx.tx.is_coinbase();
            result.utxos_created += self.ledger.eval_outputs(
                &rtx.tx.outputs,
                rtx.hash,
                rtx.tree,
                is_coinbase,
                update.height,
                self.coinbase_maturity,
                &self.keyring,
                &mut undo,
            )?;
            result.utxos_spent += self.ledger.eval_inputs(&rtx.tx.inputs, &mut undo);
        }
        self.journal.record(update.height, undo)?;
        Ok(result)
    }

    /// Reverse the block at `height`, which must be the journal tip.
    /// The synced height becomes `height - 1`.
    pub fn unwind(&mut self, height: u64) -> Result<DisconnectResult, WalletError> {
        let undo = self.journal.take(height)?;
        let (utxos_restored, utxos_removed) = self.ledger.unwind(undo);
        self.synced_height = height.saturating_sub(1);
        Ok(DisconnectResult {
            utxos_restored,
            utxos_removed,
        })
    }

    pub fn balance(&self) -> Balance {
        self.ledger.balance(self.synced_height)
    }

    /// Unlocked records owned by `account`, in ascending outpoint order.
    pub fn list_unspent(&self, account: &str) -> Vec<UnspentOutput> {
        self.ledger
            .iter()
            .filter(|(_, u)| !u.is_locked)
            .filter(|(_, u)| self.keyring.account_of(u.key_index) == Some(account))
            .map(|(op, u)| self.describe(op, u))
            .collect()
    }

    fn describe(&self, outpoint: &OutPoint, utxo: &Utxo) -> UnspentOutput {
        let tracked = self.keyring.get(utxo.key_index);
        let spendable = utxo.is_mature(self.synced_height);
        let confirmations = if spendable {
            self.synced_height - utxo.maturity_height + 1
        } else {
            0
        };
        UnspentOutput {
            outpoint: outpoint.clone(),
            account: tracked.map(|t| t.account.clone()).unwrap_or_default(),
            address: tracked.map(|t| t.address.clone()),
            value: utxo.value,
            pk_script: utxo.pk_script.clone(),
            maturity_height: utxo.maturity_height,
            confirmations,
            spendable,
        }
    }

    /// Fund `tx` from records owned by `account`.
    pub fn select_coins(
        &self,
        account: &str,
        tx: Transaction,
        fee_rate: u64,
        codec: &dyn TxCodec,
    ) -> Result<CoinSelection, WalletError> {
        CoinSelector::select(
            self.ledger.iter(),
            self.synced_height,
            |u| self.keyring.account_of(u.key_index) == Some(account),
            tx,
            fee_rate,
            codec,
        )
    }

    pub fn track(&mut self, tracked: TrackedAddress) {
        self.keyring.insert(tracked);
    }

    pub fn lock_outputs<'a>(&mut self, outpoints: impl IntoIterator<Item = &'a OutPoint>) {
        for op in outpoints {
            self.ledger.lock(op);
        }
    }

    pub fn unlock_outputs<'a>(&mut self, outpoints: impl IntoIterator<Item = &'a OutPoint>) -> usize {
        self.ledger.unlock(outpoints)
    }

    pub fn synced_height(&self) -> u64 {
        self.synced_height
    }

    pub fn coinbase_maturity(&self) -> u64 {
        self.coinbase_maturity
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn journal(&self) -> &ReorgJournal {
        &self.journal
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }
}
