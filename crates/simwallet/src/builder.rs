//! Funding requests and funded transactions.
//!
//! A request names the outputs to pay, a fee rate in atoms per byte, the
//! account to fund from, whether leftover value returns as change, and the
//! transaction version. The wallet answers with an unsigned transaction
//! whose inputs are reserved until unlocked or spent.

use serde::Serialize;
use simwallet_core::address::Address;
use simwallet_core::constants::{DEFAULT_ACCOUNT_NAME, DEFAULT_PK_SCRIPT_VERSION, DEFAULT_TX_VERSION};
use simwallet_core::types::{OutPoint, Transaction, TxOutput};

use crate::error::WalletError;

/// Arguments for [`InMemoryWallet::create_transaction`](crate::wallet::InMemoryWallet::create_transaction).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransactionArgs {
    /// Outputs to pay, in order.
    pub outputs: Vec<TxOutput>,
    /// Fee in atoms per byte of estimated signed size.
    pub fee_rate: u64,
    /// Account whose records fund the transaction.
    pub account: String,
    /// Return leftover value to a fresh change address. When false the
    /// leftover is surrendered to the fee.
    pub change: bool,
    /// Version stamped on the funded transaction.
    pub tx_version: u16,
}

impl CreateTransactionArgs {
    /// Request paying `outputs` at `fee_rate` from the default account, with change.
    pub fn new(outputs: Vec<TxOutput>, fee_rate: u64) -> Self {
        Self {
            outputs,
            fee_rate,
            account: DEFAULT_ACCOUNT_NAME.to_string(),
            change: true,
            tx_version: DEFAULT_TX_VERSION,
        }
    }

    /// Add an output paying `value` to `pk_script`.
    pub fn pay_to_script(mut self, pk_script: Vec<u8>, value: u64) -> Self {
        self.outputs.push(TxOutput {
            value,
            version: DEFAULT_PK_SCRIPT_VERSION,
            pk_script,
        });
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    pub fn without_change(mut self) -> Self {
        self.change = false;
        self
    }

    pub fn with_tx_version(mut self, version: u16) -> Self {
        self.tx_version = version;
        self
    }

    /// Check the outputs and build the unfunded skeleton.
    pub(crate) fn skeleton(&self) -> Result<Transaction, WalletError> {
        if self.outputs.is_empty() {
            return Err(WalletError::BuildError("no outputs".into()));
        }
        if self.outputs.iter().any(|o| o.value == 0) {
            return Err(WalletError::InvalidAmount("output value is zero".into()));
        }
        Ok(Transaction {
            version: self.tx_version,
            inputs: Vec::new(),
            outputs: self.outputs.clone(),
            lock_time: 0,
            expiry: 0,
        })
    }
}

/// An unsigned transaction funded from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundedTransaction {
    /// Requested outputs, then the change output if any.
    pub tx: Transaction,
    /// Outpoints reserved as inputs, in input order.
    pub inputs: Vec<OutPoint>,
    /// Fee paid in atoms, including any surrendered leftover.
    pub fee: u64,
    /// Value of the change output, or zero.
    pub change: u64,
    /// Address receiving change, if a change output was added.
    pub change_address: Option<Address>,
}

impl FundedTransaction {
    /// Sum of the selected input values.
    pub fn input_value(&self) -> u64 {
        self.tx
            .inputs
            .iter()
            .fold(0u64, |acc, i| acc.saturating_add(i.value_in))
    }
}
