//! UTXO ledger: the wallet's authoritative set of unspent records.
//!
//! Records are created only while connecting a block ([`Ledger::eval_outputs`]),
//! destroyed only while connecting a block ([`Ledger::eval_inputs`]), and
//! restored only by [`Ledger::unwind`]. Enumeration is in ascending
//! [`OutPoint`] order.

use serde::{Deserialize, Serialize};
use simwallet_core::types::{Hash256, OutPoint, TxInput, TxOutput, TxTree};
use std::collections::BTreeMap;

use crate::error::WalletError;
use crate::journal::UndoEntry;
use crate::keyring::Keyring;

/// An unspent output owned by one of the wallet's keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    /// Locking script of the output.
    pub pk_script: Vec<u8>,
    /// Value in atoms.
    pub value: u64,
    /// First synced height at which the record may be spent.
    pub maturity_height: u64,
    /// Index of the key whose script hash matched.
    pub key_index: u32,
    /// Reserved by a funded transaction.
    pub is_locked: bool,
}

impl Utxo {
    pub fn is_mature(&self, synced_height: u64) -> bool {
        synced_height >= self.maturity_height
    }

    pub fn is_spendable(&self, synced_height: u64) -> bool {
        self.is_mature(synced_height) && !self.is_locked
    }
}

/// Breakdown of ledger value at one synced height.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Mature and unlocked. This is the wallet's confirmed balance.
    pub spendable: u64,
    /// Not yet mature.
    pub immature: u64,
    /// Mature but reserved by a funded transaction.
    pub locked: u64,
}

impl Balance {
    pub fn total(&self) -> u64 {
        self.spendable
            .saturating_add(self.immature)
            .saturating_add(self.locked)
    }
}

/// OutPoint → record map.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Ledger {
    utxos: BTreeMap<OutPoint, Utxo>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit every output paying a tracked key.
    ///
    /// Each matching output becomes a record keyed `{tx_hash, index, tree}`,
    /// owned by the lowest matching key index. Coinbase records mature at
    /// `height + coinbase_maturity`, all others at `height`. Created
    /// outpoints are appended to `undo.created`.
    ///
    /// # Errors
    ///
    /// [`WalletError::IntegrityViolation`] if an outpoint is already present.
    #[allow(clippy::too_many_arguments)]
    pub fn eval_outputs(
        &mut self,
        outputs: &[TxOutput],
        tx_hash: Hash256,
        tree: TxTree,
        is_coinbase: bool,
        height: u64,
        coinbase_maturity: u64,
        keys: &Keyring,
        undo: &mut UndoEntry,
    ) -> Result<usize, WalletError> {
        let maturity_height = if is_coinbase {
            height.saturating_add(coinbase_maturity)
        } else {
            height
        };
        let mut created = 0;
        for (index, output) in outputs.iter().enumerate() {
            let Some(key_index) = keys.matching(&output.pk_script) else {
                continue;
            };
            let index = u32::try_from(index).map_err(|_| {
                WalletError::IntegrityViolation(format!("output index {index} out of range"))
            })?;
            let outpoint = OutPoint { txid: tx_hash, index, tree };
            if self.utxos.contains_key(&outpoint) {
                return Err(WalletError::IntegrityViolation(format!(
                    "output {outpoint} created twice"
                )));
            }
            self.utxos.insert(
                outpoint.clone(),
                Utxo {
                    pk_script: output.pk_script.clone(),
                    value: output.value,
                    maturity_height,
                    key_index,
                    is_locked: false,
                },
            );
            undo.created.push(outpoint);
            created += 1;
        }
        Ok(created)
    }

    /// Destroy every record an input spends, moving it into `undo.destroyed`.
    /// Inputs spending unknown outpoints are ignored.
    pub fn eval_inputs(&mut self, inputs: &[TxInput], undo: &mut UndoEntry) -> usize {
        let mut destroyed = 0;
        for input in inputs {
            if let Some(utxo) = self.utxos.remove(&input.previous_output) {
                undo.destroyed.insert(input.previous_output.clone(), utxo);
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Reverse one block's delta. Destroyed records are restored before
    /// created ones are deleted, so an output created and spent in the same
    /// block ends up absent. Returns `(restored, removed)`.
    pub fn unwind(&mut self, undo: UndoEntry) -> (usize, usize) {
        let restored = undo.destroyed.len();
        for (outpoint, utxo) in undo.destroyed {
            self.utxos.insert(outpoint, utxo);
        }
        let mut removed = 0;
        for outpoint in &undo.created {
            if self.utxos.remove(outpoint).is_some() {
                removed += 1;
            }
        }
        (restored, removed)
    }

    /// Value breakdown at `synced_height`.
    pub fn balance(&self, synced_height: u64) -> Balance {
        self.utxos.values().fold(Balance::default(), |mut b, u| {
            if !u.is_mature(synced_height) {
                b.immature = b.immature.saturating_add(u.value);
            } else if u.is_locked {
                b.locked = b.locked.saturating_add(u.value);
            } else {
                b.spendable = b.spendable.saturating_add(u.value);
            }
            b
        })
    }

    /// Mark a record reserved. Returns false if the outpoint is unknown.
    pub fn lock(&mut self, outpoint: &OutPoint) -> bool {
        match self.utxos.get_mut(outpoint) {
            Some(u) => {
                u.is_locked = true;
                true
            }
            None => false,
        }
    }

    /// Clear the reservation on each named record. Unknown outpoints are skipped.
    /// Returns how many records were known.
    pub fn unlock<'a>(&mut self, outpoints: impl IntoIterator<Item = &'a OutPoint>) -> usize {
        let mut n = 0;
        for op in outpoints {
            if let Some(u) = self.utxos.get_mut(op) {
                u.is_locked = false;
                n += 1;
            }
        }
        n
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&Utxo> {
        self.utxos.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    /// Records in ascending outpoint order.
    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &Utxo)> {
        self.utxos.iter()
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}
