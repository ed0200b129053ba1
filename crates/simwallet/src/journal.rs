//! Per-height undo journal for reversing connected blocks.

use simwallet_core::types::OutPoint;
use std::collections::BTreeMap;

use crate::error::WalletError;
use crate::ledger::Utxo;

/// Ledger delta recorded while connecting one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UndoEntry {
    /// Outpoints created at this height, in creation order.
    pub created: Vec<OutPoint>,
    /// Outpoints destroyed at this height with the record they held.
    pub destroyed: BTreeMap<OutPoint, Utxo>,
}

impl UndoEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.destroyed.is_empty()
    }
}

/// Undo entries by height. Entries are consumed strictly from the top.
#[derive(Debug, Default, Clone)]
pub struct ReorgJournal {
    entries: BTreeMap<u64, UndoEntry>,
}

impl ReorgJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the entry for a freshly connected height.
    ///
    /// # Errors
    ///
    /// [`WalletError::IntegrityViolation`] if the height already has an entry.
    pub fn record(&mut self, height: u64, entry: UndoEntry) -> Result<(), WalletError> {
        if self.entries.contains_key(&height) {
            return Err(WalletError::IntegrityViolation(format!(
                "height {height} connected twice"
            )));
        }
        self.entries.insert(height, entry);
        Ok(())
    }

    /// Remove and return the entry for `height`, which must be the highest
    /// journaled height.
    ///
    /// # Errors
    ///
    /// [`WalletError::IntegrityViolation`] if no entry exists for `height`
    /// or a higher height is still journaled.
    pub fn take(&mut self, height: u64) -> Result<UndoEntry, WalletError> {
        match self.tip() {
            None => Err(WalletError::IntegrityViolation(format!(
                "disconnect of height {height} with empty journal"
            ))),
            Some(tip) if tip != height && self.entries.contains_key(&height) => {
                Err(WalletError::IntegrityViolation(format!(
                    "disconnect of height {height} below journal tip {tip}"
                )))
            }
            Some(_) => self.entries.remove(&height).ok_or_else(|| {
                WalletError::IntegrityViolation(format!("no undo entry for height {height}"))
            }),
        }
    }

    /// Highest journaled height.
    pub fn tip(&self) -> Option<u64> {
        self.entries.keys().next_back().copied()
    }

    pub fn get(&self, height: u64) -> Option<&UndoEntry> {
        self.entries.get(&height)
    }

    pub fn contains(&self, height: u64) -> bool {
        self.entries.contains_key(&height)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
