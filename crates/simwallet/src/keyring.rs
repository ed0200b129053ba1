//! Addresses the wallet tracks, keyed by derivation index.

use serde::Serialize;
use simwallet_core::address::Address;
use std::collections::BTreeMap;

/// An address the wallet derived and watches for outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackedAddress {
    /// Derivation index.
    pub index: u32,
    pub address: Address,
    /// Bytes searched for inside output scripts.
    pub script_hash: Vec<u8>,
    /// Owning account.
    pub account: String,
}

/// Index-ordered set of tracked addresses.
#[derive(Debug, Default, Clone)]
pub struct Keyring {
    entries: BTreeMap<u32, TrackedAddress>,
}

impl Keyring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an address. Replaces any earlier entry at the same index.
    pub fn insert(&mut self, tracked: TrackedAddress) {
        self.entries.insert(tracked.index, tracked);
    }

    pub fn get(&self, index: u32) -> Option<&TrackedAddress> {
        self.entries.get(&index)
    }

    /// Lowest key index whose script hash occurs in `pk_script`.
    pub fn matching(&self, pk_script: &[u8]) -> Option<u32> {
        self.entries
            .values()
            .find(|t| contains(pk_script, &t.script_hash))
            .map(|t| t.index)
    }

    /// Account owning the key at `index`.
    pub fn account_of(&self, index: u32) -> Option<&str> {
        self.entries.get(&index).map(|t| t.account.as_str())
    }

    /// All tracked addresses in index order.
    pub fn addresses(&self) -> Vec<Address> {
        self.entries.values().map(|t| t.address.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedAddress> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Byte-substring test. An empty needle never matches.
fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() || needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}
