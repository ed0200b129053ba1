//! Reference [`TxCodec`] over the bincode standard encoding.

use bincode::{Decode, Encode};

use crate::error::CodecError;
use crate::traits::TxCodec;
use crate::types::{BlockHeader, Transaction};

/// Codec used by the simulated chain: bincode 2, standard config.
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl BincodeCodec {
    /// Encode a transaction to bytes.
    pub fn encode_transaction(&self, tx: &Transaction) -> Result<Vec<u8>, CodecError> {
        encode(tx, "transaction")
    }

    /// Encode a block header to bytes.
    pub fn encode_header(&self, header: &BlockHeader) -> Result<Vec<u8>, CodecError> {
        encode(header, "block header")
    }
}

impl TxCodec for BincodeCodec {
    fn parse_transaction(&self, bytes: &[u8]) -> Result<Transaction, CodecError> {
        decode(bytes, "transaction")
    }

    fn parse_block_header(&self, bytes: &[u8]) -> Result<BlockHeader, CodecError> {
        decode(bytes, "block header")
    }

    fn estimate_serialized_size(&self, tx: &Transaction) -> Result<usize, CodecError> {
        encode(tx, "transaction").map(|v| v.len())
    }
}

fn encode<T: Encode>(value: &T, what: &'static str) -> Result<Vec<u8>, CodecError> {
    bincode::encode_to_vec(value, bincode::config::standard()).map_err(|e| CodecError::Encode {
        what,
        reason: e.to_string(),
    })
}

fn decode<T: Decode<()>>(bytes: &[u8], what: &'static str) -> Result<T, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty(what));
    }
    let (value, consumed) = bincode::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|e| CodecError::Decode {
            what,
            reason: e.to_string(),
        })?;
    if consumed != bytes.len() {
        return Err(CodecError::TrailingBytes {
            what,
            consumed,
            len: bytes.len(),
        });
    }
    Ok(value)
}
