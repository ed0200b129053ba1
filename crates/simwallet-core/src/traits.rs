//! Collaborator interfaces consumed by the wallet.
//!
//! - [`TxCodec`]: decodes notifier bytes and estimates transaction sizes
//! - [`KeyProvider`]: derives addresses and the scripts that pay them
//! - [`TxFilter`]: registers addresses with the node's transaction filter
//! - [`BlockNotifications`]: receives connect/disconnect events from the node

use crate::address::Address;
use crate::constants::NetworkType;
use crate::error::{CodecError, FilterError, KeyError};
use crate::types::{BlockHeader, Hash256, Transaction, TxTree};

/// Wire codec for the node's transaction and header encodings.
pub trait TxCodec: Send + Sync {
    /// Decode a single transaction.
    fn parse_transaction(&self, bytes: &[u8]) -> Result<Transaction, CodecError>;

    /// Decode a block header.
    fn parse_block_header(&self, bytes: &[u8]) -> Result<BlockHeader, CodecError>;

    /// Serialized size in bytes of a transaction as it currently stands.
    ///
    /// Inputs are measured with whatever signature script they carry; an
    /// unsigned skeleton is therefore smaller than the final transaction.
    fn estimate_serialized_size(&self, tx: &Transaction) -> Result<usize, CodecError>;

    /// Transaction hash used to key ledger outpoints.
    ///
    /// Default implementation delegates to [`Transaction::txid`].
    fn tx_hash(&self, tx: &Transaction) -> Result<Hash256, CodecError> {
        tx.txid()
    }

    /// Tree the transaction's outputs are keyed under.
    fn tx_tree(&self, _tx: &Transaction) -> TxTree {
        TxTree::Regular
    }
}

/// Deterministic address derivation for the wallet's flat keyspace.
pub trait KeyProvider: Send + Sync {
    /// Network the derived addresses belong to.
    fn network(&self) -> NetworkType;

    /// Derive the address at a child index.
    fn derive_address(&self, index: u32) -> Result<Address, KeyError>;

    /// Bytes that appear inside any output script paying `address`.
    ///
    /// Default implementation returns the address key hash.
    fn script_hash_of(&self, address: &Address) -> Vec<u8> {
        address.key_hash().to_vec()
    }

    /// Locking script paying to `address`.
    fn pay_to_address_script(&self, address: &Address) -> Vec<u8>;

    /// Coinbase maturity for a network.
    fn coinbase_maturity(&self, network: NetworkType) -> u64 {
        network.coinbase_maturity()
    }
}

/// Node-side transaction filter controlling which transactions are
/// delivered with connected blocks.
pub trait TxFilter: Send + Sync {
    /// Add `addresses` to the filter. With `reload` the filter is replaced.
    fn load_tx_filter(&self, reload: bool, addresses: &[Address]) -> Result<(), FilterError>;
}

/// Filter for notifiers that deliver every transaction unfiltered.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTxFilter;

impl TxFilter for NullTxFilter {
    fn load_tx_filter(&self, _reload: bool, _addresses: &[Address]) -> Result<(), FilterError> {
        Ok(())
    }
}

/// Receiver of node block notifications.
///
/// Callbacks must not block the notifier.
pub trait BlockNotifications: Send + Sync {
    /// A block was connected. `transactions` holds the filtered transactions
    /// in block order.
    fn block_connected(&self, header: &[u8], transactions: &[Vec<u8>]);

    /// The block with this header was disconnected from the tip.
    fn block_disconnected(&self, header: &[u8]);
}
