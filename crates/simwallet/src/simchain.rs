//! A scripted chain that drives [`BlockNotifications`] listeners.
//!
//! Blocks are encoded with [`BincodeCodec`] and delivered as header and
//! transaction bytes, exactly as a node notifier would deliver them. Every
//! block carries a coinbase whose signature script holds the height, so
//! coinbase hashes never repeat.

use simwallet_core::codec::BincodeCodec;
use simwallet_core::constants::{COIN, DEFAULT_PK_SCRIPT_VERSION, DEFAULT_TX_VERSION, MAX_TX_IN_SEQUENCE};
use simwallet_core::error::CodecError;
use simwallet_core::traits::BlockNotifications;
use simwallet_core::types::{BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput};
use std::sync::Arc;
use tracing::debug;

/// Coinbase value paid by default: 5 coins.
pub const DEFAULT_SUBSIDY: u64 = 5 * COIN;

const BASE_TIMESTAMP: u64 = 1_700_000_000;
const BLOCK_INTERVAL_SECS: u64 = 60;

/// A mined block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimBlock {
    pub header: BlockHeader,
    /// Coinbase first, then included transactions in order.
    pub transactions: Vec<Transaction>,
}

impl SimBlock {
    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn coinbase(&self) -> Option<&Transaction> {
        self.transactions.first()
    }

    /// Outpoint of the coinbase's first output.
    pub fn coinbase_outpoint(&self) -> Result<OutPoint, CodecError> {
        let coinbase = self.coinbase().ok_or(CodecError::Empty("block"))?;
        Ok(OutPoint::new(coinbase.txid()?, 0))
    }
}

/// In-memory chain notifying one listener of every connect and disconnect.
pub struct SimChain {
    codec: BincodeCodec,
    listener: Arc<dyn BlockNotifications>,
    blocks: Vec<SimBlock>,
    first_height: u64,
    subsidy: u64,
}

impl SimChain {
    /// Chain whose first mined block has height `first_height`.
    pub fn new(listener: Arc<dyn BlockNotifications>, first_height: u64) -> Self {
        Self {
            codec: BincodeCodec,
            listener,
            blocks: Vec::new(),
            first_height,
            subsidy: DEFAULT_SUBSIDY,
        }
    }

    /// Builder-style setter for the coinbase value.
    pub fn with_subsidy(mut self, subsidy: u64) -> Self {
        self.subsidy = subsidy;
        self
    }

    /// Height of the tip, if any block is connected.
    pub fn tip_height(&self) -> Option<u64> {
        self.blocks.last().map(SimBlock::height)
    }

    pub fn next_height(&self) -> u64 {
        self.tip_height().map_or(self.first_height, |h| h + 1)
    }

    pub fn tip(&self) -> Option<&SimBlock> {
        self.blocks.last()
    }

    pub fn block_at(&self, height: u64) -> Option<&SimBlock> {
        let offset = height.checked_sub(self.first_height)?;
        self.blocks.get(usize::try_from(offset).ok()?)
    }

    /// Mine a block paying the coinbase to `coinbase_script` and including
    /// `transactions`, then notify the listener.
    pub fn mine_block(
        &mut self,
        coinbase_script: &[u8],
        transactions: Vec<Transaction>,
    ) -> Result<&SimBlock, CodecError> {
        let height = self.next_height();
        let coinbase = Transaction {
            version: DEFAULT_TX_VERSION,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                value_in: 0,
                sequence: MAX_TX_IN_SEQUENCE,
                signature_script: height.to_le_bytes().to_vec(),
            }],
            outputs: vec![TxOutput {
                value: self.subsidy,
                version: DEFAULT_PK_SCRIPT_VERSION,
                pk_script: coinbase_script.to_vec(),
            }],
            lock_time: 0,
            expiry: 0,
        };

        let mut txs = Vec::with_capacity(transactions.len() + 1);
        txs.push(coinbase);
        txs.extend(transactions);

        let mut commitment = blake3::Hasher::new();
        for tx in &txs {
            commitment.update(tx.txid()?.as_bytes());
        }
        let header = BlockHeader {
            version: 1,
            prev_hash: self.tip().map_or(Hash256::ZERO, |b| b.header.hash()),
            merkle_root: Hash256(commitment.finalize().into()),
            height,
            timestamp: BASE_TIMESTAMP + height * BLOCK_INTERVAL_SECS,
        };

        let header_bytes = self.codec.encode_header(&header)?;
        let tx_bytes = txs
            .iter()
            .map(|tx| self.codec.encode_transaction(tx))
            .collect::<Result<Vec<_>, _>>()?;

        self.blocks.push(SimBlock {
            header,
            transactions: txs,
        });
        debug!(height, txs = tx_bytes.len(), "sim chain connected block");
        self.listener.block_connected(&header_bytes, &tx_bytes);

        self.blocks.last().ok_or(CodecError::Empty("block"))
    }

    /// Mine `count` blocks with no extra transactions. Returns the new tip height.
    pub fn mine_blocks(&mut self, count: u64, coinbase_script: &[u8]) -> Result<Option<u64>, CodecError> {
        for _ in 0..count {
            self.mine_block(coinbase_script, Vec::new())?;
        }
        Ok(self.tip_height())
    }

    /// Disconnect the tip and notify the listener.
    pub fn disconnect_tip(&mut self) -> Result<Option<SimBlock>, CodecError> {
        let Some(block) = self.blocks.pop() else {
            return Ok(None);
        };
        let header_bytes = self.codec.encode_header(&block.header)?;
        debug!(height = block.height(), "sim chain disconnected block");
        self.listener.block_disconnected(&header_bytes);
        Ok(Some(block))
    }
}
