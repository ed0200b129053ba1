//! Funding, reservation, and spend tests.
//!
//! The wallet funds from a single matured 5-coin coinbase unless a test
//! mines more. Fees are checked against the signed-size estimate of the
//! funded transaction without its change output.

use simwallet::coin_selection::estimate_signed_size;
use simwallet::{CreateTransactionArgs, WalletError};
use simwallet_core::codec::BincodeCodec;
use simwallet_core::keys::p2pkh_script;
use simwallet_core::types::OutPoint;
use simwallet_tests::helpers::*;

const PAYMENT: u64 = 100_000_000;
const FEE_RATE: u64 = 10;

fn payment_args(value: u64, fee_rate: u64) -> CreateTransactionArgs {
    CreateTransactionArgs::new(Vec::new(), fee_rate).pay_to_script(foreign_script(0x33), value)
}

// ============================================================================
// Change and fees
// ============================================================================

#[tokio::test]
async fn funding_adds_one_change_output() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    let coinbase = fund_wallet(&wallet, &mut chain, 16).await;

    let funded = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE))
        .unwrap();

    assert_eq!(funded.inputs, vec![coinbase.clone()]);
    assert_eq!(funded.tx.inputs[0].previous_output, coinbase);
    assert_eq!(funded.tx.outputs.len(), 2);
    assert_eq!(funded.tx.outputs[0].value, PAYMENT);

    let mut unfunded_change = funded.tx.clone();
    unfunded_change.outputs.pop();
    let size = estimate_signed_size(&unfunded_change, &BincodeCodec).unwrap() as u64;
    assert_eq!(funded.fee, size * FEE_RATE);
    assert_eq!(funded.change, TEST_SUBSIDY - PAYMENT - funded.fee);
    assert_eq!(funded.input_value(), PAYMENT + funded.fee + funded.change);

    let change_address = funded.change_address.clone().unwrap();
    assert_eq!(funded.tx.outputs[1].value, funded.change);
    assert_eq!(funded.tx.outputs[1].pk_script, p2pkh_script(&change_address));
    assert_ne!(&change_address, wallet.coinbase_address());
}

#[tokio::test]
async fn exact_amount_produces_no_change() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    let coinbase = fund_wallet(&wallet, &mut chain, 16).await;
    let addresses_before = wallet.wallet_info().address_count;

    // Same varint width as the final payment, so the size is exact.
    let sizing_tx = make_tx(
        &[(coinbase, TEST_SUBSIDY)],
        vec![make_output(TEST_SUBSIDY - 10_000, foreign_script(0x33))],
    );
    let fee = estimate_signed_size(&sizing_tx, &BincodeCodec).unwrap() as u64 * FEE_RATE;

    let funded = wallet
        .create_transaction(&payment_args(TEST_SUBSIDY - fee, FEE_RATE))
        .unwrap();
    assert_eq!(funded.tx.outputs.len(), 1);
    assert_eq!(funded.change, 0);
    assert_eq!(funded.fee, fee);
    assert!(funded.change_address.is_none());
    assert_eq!(wallet.wallet_info().address_count, addresses_before);
}

#[tokio::test]
async fn zero_fee_rate_spends_whole_record() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 16).await;

    let funded = wallet
        .create_transaction(&payment_args(TEST_SUBSIDY, 0))
        .unwrap();
    assert_eq!(funded.fee, 0);
    assert_eq!(funded.change, 0);
    assert_eq!(funded.tx.outputs.len(), 1);
}

#[tokio::test]
async fn without_change_surrenders_leftover_to_fee() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 16).await;

    let funded = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE).without_change())
        .unwrap();
    assert_eq!(funded.tx.outputs.len(), 1);
    assert_eq!(funded.change, 0);
    assert_eq!(funded.fee, TEST_SUBSIDY - PAYMENT);
    assert!(funded.change_address.is_none());
}

#[tokio::test]
async fn tx_version_is_applied() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 16).await;

    let funded = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE).with_tx_version(3))
        .unwrap();
    assert_eq!(funded.tx.version, 3);
}

#[tokio::test]
async fn selection_visits_records_in_outpoint_order() {
    let (wallet, _filter) = started_wallet(2).await;
    let mut chain = chain_for(&wallet);
    let mut coinbases: Vec<OutPoint> = Vec::new();
    for _ in 0..3 {
        let block = chain.mine_block(&coinbase_script(&wallet), Vec::new()).unwrap();
        coinbases.push(block.coinbase_outpoint().unwrap());
    }
    chain.mine_blocks(2, &foreign_script(0xEE)).unwrap();
    wallet.flush().await.unwrap();
    coinbases.sort();

    let funded = wallet
        .create_transaction(&payment_args(TEST_SUBSIDY + 1, FEE_RATE))
        .unwrap();
    assert_eq!(funded.inputs, coinbases[..2].to_vec());
}

// ============================================================================
// Failures leave the ledger untouched
// ============================================================================

#[tokio::test]
async fn insufficient_funds_leaves_ledger_untouched() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 16).await;

    let unspent_before = wallet.list_unspent("default").unwrap();
    let balance_before = wallet.balance().unwrap();
    let addresses_before = wallet.wallet_info().address_count;

    let err = wallet
        .create_transaction(&payment_args(TEST_SUBSIDY, FEE_RATE))
        .unwrap_err();
    match err {
        WalletError::InsufficientFunds { have, need } => {
            assert_eq!(have, TEST_SUBSIDY);
            assert!(need > TEST_SUBSIDY);
        }
        other => panic!("expected InsufficientFunds, got {other:?}"),
    }

    assert_eq!(wallet.list_unspent("default").unwrap(), unspent_before);
    assert_eq!(wallet.balance().unwrap(), balance_before);
    assert_eq!(wallet.wallet_info().address_count, addresses_before);
}

#[tokio::test]
async fn immature_records_do_not_fund() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 15).await;

    let err = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE))
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { have: 0, .. }));
}

#[tokio::test]
async fn other_accounts_have_no_funds() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 16).await;

    let err = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE).with_account("savings"))
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { have: 0, .. }));
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let (wallet, _filter) = started_wallet(16).await;
    let empty = CreateTransactionArgs::new(Vec::new(), FEE_RATE);
    assert!(matches!(
        wallet.create_transaction(&empty),
        Err(WalletError::BuildError(_))
    ));
    assert!(matches!(
        wallet.create_transaction(&payment_args(0, FEE_RATE)),
        Err(WalletError::InvalidAmount(_))
    ));
}

#[tokio::test]
async fn change_address_failure_releases_inputs() {
    let (wallet, filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 16).await;

    filter.set_failing(true);
    let err = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE))
        .unwrap_err();
    assert!(matches!(err, WalletError::Filter(_)));
    assert_eq!(wallet.balance().unwrap().spendable, TEST_SUBSIDY);
    assert_eq!(wallet.balance().unwrap().locked, 0);
}

// ============================================================================
// Reservations
// ============================================================================

#[tokio::test]
async fn funded_inputs_are_reserved_until_unlocked() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    fund_wallet(&wallet, &mut chain, 16).await;

    let funded = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE))
        .unwrap();
    let balance = wallet.balance().unwrap();
    assert_eq!(balance.spendable, 0);
    assert_eq!(balance.locked, TEST_SUBSIDY);
    assert!(wallet.list_unspent("default").unwrap().is_empty());

    let err = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE))
        .unwrap_err();
    assert!(matches!(err, WalletError::InsufficientFunds { have: 0, .. }));

    wallet.unlock_outputs(&funded.tx.inputs).unwrap();
    assert_eq!(wallet.balance().unwrap().spendable, TEST_SUBSIDY);
    wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE))
        .unwrap();
}

#[tokio::test]
async fn unlocking_unknown_outpoints_is_harmless() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    let coinbase = fund_wallet(&wallet, &mut chain, 16).await;

    let stranger = OutPoint::new(simwallet_core::types::Hash256([7; 32]), 0);
    wallet.unlock_outpoints(&[stranger, coinbase]).unwrap();
    assert_eq!(wallet.balance().unwrap().spendable, TEST_SUBSIDY);
}

// ============================================================================
// Spends confirmed and reorged
// ============================================================================

#[tokio::test]
async fn confirmed_spend_credits_change_and_reorg_restores_input() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    let coinbase = fund_wallet(&wallet, &mut chain, 16).await;

    let funded = wallet
        .create_transaction(&payment_args(PAYMENT, FEE_RATE))
        .unwrap();
    let change_outpoint = OutPoint::new(funded.tx.txid().unwrap(), 1);

    chain
        .mine_block(&foreign_script(0xEE), vec![funded.tx.clone()])
        .unwrap();
    wallet.flush().await.unwrap();

    let unspent = wallet.list_unspent("default").unwrap();
    assert_eq!(unspent.len(), 1);
    assert_eq!(unspent[0].outpoint, change_outpoint);
    assert_eq!(unspent[0].value, funded.change);
    assert!(unspent[0].spendable);
    assert_eq!(wallet.balance().unwrap().spendable, funded.change);

    chain.disconnect_tip().unwrap();
    wallet.flush().await.unwrap();

    // The input comes back exactly as it was destroyed: still reserved.
    let balance = wallet.balance().unwrap();
    assert_eq!(balance.spendable, 0);
    assert_eq!(balance.locked, TEST_SUBSIDY);
    wallet.unlock_outpoints(&[coinbase.clone()]).unwrap();
    let unspent = wallet.list_unspent("default").unwrap();
    assert_eq!(unspent.len(), 1);
    assert_eq!(unspent[0].outpoint, coinbase);
}

#[tokio::test]
async fn output_created_and_spent_in_one_block_round_trips() {
    let (wallet, _filter) = started_wallet(16).await;
    let mut chain = chain_for(&wallet);
    let coinbase = fund_wallet(&wallet, &mut chain, 16).await;
    let own = p2pkh_script(&wallet.new_address("default").unwrap());

    let first = make_tx(
        &[(coinbase.clone(), TEST_SUBSIDY)],
        vec![make_output(TEST_SUBSIDY - 1_000, own.clone())],
    );
    let intermediate = OutPoint::new(first.txid().unwrap(), 0);
    let second = make_tx(
        &[(intermediate.clone(), TEST_SUBSIDY - 1_000)],
        vec![make_output(TEST_SUBSIDY - 2_000, own)],
    );
    let last = OutPoint::new(second.txid().unwrap(), 0);

    let before = wallet.list_unspent("default").unwrap();
    chain
        .mine_block(&foreign_script(0xEE), vec![first, second])
        .unwrap();
    wallet.flush().await.unwrap();

    let unspent = wallet.list_unspent("default").unwrap();
    assert_eq!(unspent.len(), 1);
    assert_eq!(unspent[0].outpoint, last);

    chain.disconnect_tip().unwrap();
    wallet.flush().await.unwrap();
    assert_eq!(wallet.list_unspent("default").unwrap(), before);
    assert_eq!(wallet.synced_height(), 116);
}
