//! Greedy first-fit coin selection.
//!
//! Records are visited in ledger order (ascending outpoint). Each spendable
//! record is appended as an input until the running total covers the
//! requested outputs plus a fee proportional to the estimated signed size.

use simwallet_core::constants::{MAX_TX_IN_SEQUENCE, SIG_SCRIPT_ESTIMATE};
use simwallet_core::error::CodecError;
use simwallet_core::traits::TxCodec;
use simwallet_core::types::{OutPoint, Transaction, TxInput};

use crate::error::WalletError;
use crate::ledger::Utxo;

/// Result of coin selection: the funded skeleton and its fee/change breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoinSelection {
    /// Requested outputs plus one unsigned input per selected record.
    pub tx: Transaction,
    /// Selected outpoints in input order.
    pub selected: Vec<OutPoint>,
    /// Total value of selected records.
    pub total_selected: u64,
    /// Sum of requested output values.
    pub target: u64,
    /// Fee at the estimated signed size.
    pub fee: u64,
    /// `total_selected - target - fee`.
    pub change: u64,
    /// Estimated signed size in bytes, excluding any change output.
    pub size: usize,
}

/// Greedy coin selector.
pub struct CoinSelector;

impl CoinSelector {
    /// Fund `tx` from `records`.
    ///
    /// Records that are immature at `synced_height`, locked, or rejected by
    /// `owned` are skipped. Selection stops at the first record that makes
    /// the total sufficient.
    ///
    /// # Errors
    ///
    /// - [`WalletError::InvalidAmount`] if the outputs overflow.
    /// - [`WalletError::InsufficientFunds`] if every eligible record together
    ///   falls short; `need` is the target plus the fee at the last size.
    /// - [`WalletError::Codec`] if the codec cannot size the skeleton.
    pub fn select<'a, I, F>(
        records: I,
        synced_height: u64,
        owned: F,
        mut tx: Transaction,
        fee_rate: u64,
        codec: &dyn TxCodec,
    ) -> Result<CoinSelection, WalletError>
    where
        I: IntoIterator<Item = (&'a OutPoint, &'a Utxo)>,
        F: Fn(&Utxo) -> bool,
    {
        let target = tx
            .total_output_value()
            .ok_or_else(|| WalletError::InvalidAmount("output total overflows".into()))?;

        let mut selected = Vec::new();
        let mut total_selected: u64 = 0;
        let mut need = target;

        for (outpoint, utxo) in records {
            if !utxo.is_spendable(synced_height) || !owned(utxo) {
                continue;
            }

            tx.inputs.push(TxInput {
                previous_output: outpoint.clone(),
                value_in: utxo.value,
                sequence: MAX_TX_IN_SEQUENCE,
                signature_script: Vec::new(),
            });
            selected.push(outpoint.clone());
            total_selected = total_selected.saturating_add(utxo.value);

            let size = estimate_signed_size(&tx, codec)?;
            let fee = (size as u64).saturating_mul(fee_rate);
            need = target.saturating_add(fee);
            if total_selected < need {
                continue;
            }

            return Ok(CoinSelection {
                tx,
                selected,
                total_selected,
                target,
                fee,
                change: total_selected - need,
                size,
            });
        }

        Err(WalletError::InsufficientFunds {
            have: total_selected,
            need,
        })
    }
}

/// Serialized size of `tx` with every input carrying a worst-case signature script.
pub fn estimate_signed_size(tx: &Transaction, codec: &dyn TxCodec) -> Result<usize, CodecError> {
    Ok(codec
        .estimate_serialized_size(tx)?
        .saturating_add(tx.inputs.len().saturating_mul(SIG_SCRIPT_ESTIMATE)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use simwallet_core::types::{BlockHeader, Hash256, TxOutput};
    use std::collections::BTreeMap;

    /// Size model: 10 bytes of framing, 40 per input, 30 per output.
    struct FixedSizeCodec;

    impl TxCodec for FixedSizeCodec {
        fn parse_transaction(&self, _: &[u8]) -> Result<Transaction, CodecError> {
            Err(CodecError::Empty("transaction"))
        }
        fn parse_block_header(&self, _: &[u8]) -> Result<BlockHeader, CodecError> {
            Err(CodecError::Empty("block header"))
        }
        fn estimate_serialized_size(&self, tx: &Transaction) -> Result<usize, CodecError> {
            Ok(10 + 40 * tx.inputs.len() + 30 * tx.outputs.len())
        }
    }

    /// Cannot size anything.
    struct UnsizableCodec;

    impl TxCodec for UnsizableCodec {
        fn parse_transaction(&self, _: &[u8]) -> Result<Transaction, CodecError> {
            Err(CodecError::Empty("transaction"))
        }
        fn parse_block_header(&self, _: &[u8]) -> Result<BlockHeader, CodecError> {
            Err(CodecError::Empty("block header"))
        }
        fn estimate_serialized_size(&self, _: &Transaction) -> Result<usize, CodecError> {
            Err(CodecError::Encode {
                what: "transaction",
                reason: "unsizable".into(),
            })
        }
    }

    fn utxo(value: u64, maturity_height: u64, locked: bool) -> Utxo {
        Utxo {
            pk_script: vec![0xAA; 25],
            value,
            maturity_height,
            key_index: 1,
            is_locked: locked,
        }
    }

    fn paying(values: &[u64]) -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![],
            outputs: values
                .iter()
                .map(|&value| TxOutput { value, version: 0, pk_script: vec![0xBB; 25] })
                .collect(),
            lock_time: 0,
            expiry: 0,
        }
    }

    fn op(n: u8) -> OutPoint {
        OutPoint::new(Hash256([n; 32]), 0)
    }

    fn records(entries: &[(u8, Utxo)]) -> BTreeMap<OutPoint, Utxo> {
        entries.iter().map(|(n, u)| (op(*n), u.clone())).collect()
    }

    #[test]
    fn single_record_change_exact() {
        // One input, one output: 10 + 40 + 30 + 108 = 188 bytes.
        let recs = records(&[(1, utxo(10_000, 0, false))]);
        let sel = CoinSelector::select(&recs, 5, |_| true, paying(&[5_000]), 2, &FixedSizeCodec).unwrap();
        assert_eq!(sel.size, 188);
        assert_eq!(sel.fee, 376);
        assert_eq!(sel.change, 10_000 - 5_000 - 376);
        assert_eq!(sel.selected, vec![op(1)]);
        assert_eq!(sel.tx.inputs.len(), 1);
        assert_eq!(sel.tx.inputs[0].value_in, 10_000);
        assert!(sel.tx.inputs[0].signature_script.is_empty());
    }

    #[test]
    fn zero_change_when_exact() {
        let recs = records(&[(1, utxo(5_376, 0, false))]);
        let sel = CoinSelector::select(&recs, 0, |_| true, paying(&[5_000]), 2, &FixedSizeCodec).unwrap();
        assert_eq!(sel.change, 0);
        assert_eq!(sel.total_selected, sel.target + sel.fee);
    }

    #[test]
    fn stops_at_first_sufficient_record() {
        let recs = records(&[
            (1, utxo(1_000, 0, false)),
            (2, utxo(9_000, 0, false)),
            (3, utxo(50_000, 0, false)),
        ]);
        let sel = CoinSelector::select(&recs, 0, |_| true, paying(&[5_000]), 1, &FixedSizeCodec).unwrap();
        assert_eq!(sel.selected, vec![op(1), op(2)]);
        // Two inputs: 10 + 80 + 30 + 216 = 336.
        assert_eq!(sel.fee, 336);
        assert_eq!(sel.change, 10_000 - 5_000 - 336);
    }

    #[test]
    fn skips_immature_locked_and_foreign() {
        let mut foreign = utxo(100_000, 0, false);
        foreign.key_index = 9;
        let recs = records(&[
            (1, utxo(100_000, 50, false)),
            (2, utxo(100_000, 0, true)),
            (3, foreign),
            (4, utxo(20_000, 0, false)),
        ]);
        let sel = CoinSelector::select(&recs, 10, |u| u.key_index == 1, paying(&[1_000]), 1, &FixedSizeCodec).unwrap();
        assert_eq!(sel.selected, vec![op(4)]);
    }

    #[test]
    fn insufficient_reports_have_and_need() {
        let recs = records(&[(1, utxo(1_000, 0, false)), (2, utxo(2_000, 0, false))]);
        let err = CoinSelector::select(&recs, 0, |_| true, paying(&[5_000]), 1, &FixedSizeCodec).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 3_000, need: 5_336 });
    }

    #[test]
    fn empty_ledger_needs_target() {
        let recs = BTreeMap::new();
        let err = CoinSelector::select(&recs, 0, |_| true, paying(&[7]), 1, &FixedSizeCodec).unwrap_err();
        assert_eq!(err, WalletError::InsufficientFunds { have: 0, need: 7 });
    }

    #[test]
    fn zero_fee_rate() {
        let recs = records(&[(1, utxo(7, 0, false))]);
        let sel = CoinSelector::select(&recs, 0, |_| true, paying(&[7]), 0, &FixedSizeCodec).unwrap();
        assert_eq!((sel.fee, sel.change), (0, 0));
    }

    #[test]
    fn overflowing_outputs_rejected() {
        let recs = records(&[(1, utxo(7, 0, false))]);
        let err = CoinSelector::select(&recs, 0, |_| true, paying(&[u64::MAX, 1]), 1, &FixedSizeCodec).unwrap_err();
        assert!(matches!(err, WalletError::InvalidAmount(_)));
    }

    #[test]
    fn sizing_failure_aborts_selection() {
        let recs = records(&[(1, utxo(10_000, 0, false))]);
        let err = CoinSelector::select(&recs, 0, |_| true, paying(&[5_000]), 2, &UnsizableCodec).unwrap_err();
        assert!(matches!(err, WalletError::Codec(CodecError::Encode { .. })));
    }
}
