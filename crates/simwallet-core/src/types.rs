//! Chain types seen by the wallet: outpoints, transactions, block headers.
//!
//! All monetary values are in atoms (1 coin = 10^8 atoms).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CodecError;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3) and block header hashes (double SHA-256).
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. Used for coinbase previous outpoints.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, CodecError> {
        let bytes = hex::decode(s).map_err(|e| CodecError::Decode {
            what: "hash",
            reason: e.to_string(),
        })?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| CodecError::Decode {
            what: "hash",
            reason: format!("expected 32 bytes, got {}", v.len()),
        })?;
        Ok(Self(arr))
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Which transaction tree an outpoint lives in.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
pub enum TxTree {
    /// Ordinary value transfers and coinbase.
    #[default]
    Regular,
    /// Stake-tree transactions (tickets, votes, revocations).
    Stake,
}

/// Reference to a specific output of a previous transaction.
///
/// Orders by `(txid, index, tree)`; the ledger enumerates in that order.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u32,
    /// Tree tag of the referenced transaction.
    pub tree: TxTree,
}

impl OutPoint {
    /// Outpoint in the regular tree.
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self {
            txid,
            index,
            tree: TxTree::Regular,
        }
    }

    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self::new(Hash256::ZERO, u32::MAX)
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u32::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Value of the spent output, carried for fraud proofs.
    pub value_in: u64,
    /// Input sequence number.
    pub sequence: u32,
    /// Unlocking script. Empty until signed; arbitrary data for coinbase.
    pub signature_script: Vec<u8>,
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in atoms.
    pub value: u64,
    /// Script version.
    pub version: u16,
    /// Locking script.
    pub pk_script: Vec<u8>,
}

/// A transaction transferring value between scripts.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Transaction version.
    pub version: u16,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Block height or timestamp before which this tx is invalid.
    pub lock_time: u32,
    /// Height after which this tx can no longer be mined. Zero disables.
    pub expiry: u32,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    pub fn txid(&self) -> Result<Hash256, CodecError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard()).map_err(|e| {
            CodecError::Encode {
                what: "transaction",
                reason: e.to_string(),
            }
        })?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }
}

/// Block header as delivered by the node notifier.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Header version.
    pub version: u32,
    /// Hash of the previous block header.
    pub prev_hash: Hash256,
    /// Commitment to the block's transactions.
    pub merkle_root: Hash256,
    /// Height of this block in the chain.
    pub height: u64,
    /// Unix timestamp in seconds.
    pub timestamp: u64,
}

impl BlockHeader {
    /// Compute the block header hash (double SHA-256 over a fixed layout).
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(4 + 32 + 32 + 8 + 8);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.merkle_root.as_bytes());
        data.extend_from_slice(&self.height.to_le_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}
