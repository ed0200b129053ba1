//! simwallet-sim: run the in-memory wallet against a scripted chain.
//!
//! Mines coinbases to the wallet until they mature, funds a payment, confirms
//! it, then disconnects blocks from the tip and prints a JSON summary of the
//! wallet at each stage.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use serde::Serialize;
use simwallet::{Balance, CreateTransactionArgs, InMemoryWallet, SimChain, WalletConfig};
use simwallet_core::address::Address;
use simwallet_core::codec::BincodeCodec;
use simwallet_core::constants::{COIN, NetworkType};
use simwallet_core::keys::{Seed, SeededKeyProvider, p2pkh_script};
use simwallet_core::traits::NullTxFilter;
use simwallet_core::types::Hash256;
use tracing::{info, warn};

/// Simulated wallet driver.
#[derive(Parser, Debug)]
#[command(
    name = "simwallet-sim",
    version,
    about = "Exercise the in-memory wallet with mined blocks, a payment, and a reorg"
)]
struct Args {
    /// Network parameters (mainnet, testnet, simnet, regtest)
    #[arg(long, default_value = "regtest")]
    network: NetworkType,

    /// Height of the first mined block
    #[arg(long, default_value_t = 1)]
    first_height: u64,

    /// Blocks mined to the wallet before funding. Defaults to maturity + 4.
    #[arg(long)]
    blocks: Option<u64>,

    /// Override the network's coinbase maturity
    #[arg(long)]
    coinbase_maturity: Option<u64>,

    /// Coinbase value in atoms
    #[arg(long, default_value_t = simwallet::simchain::DEFAULT_SUBSIDY)]
    subsidy: u64,

    /// Payment value in atoms
    #[arg(long, default_value_t = COIN)]
    amount: u64,

    /// Fee rate in atoms per byte
    #[arg(long, default_value_t = 10)]
    fee_rate: u64,

    /// Blocks disconnected from the tip after the payment confirms
    #[arg(long, default_value_t = 1)]
    reorg_depth: u64,

    /// Hex-encoded 32-byte master seed. Random when omitted.
    #[arg(long)]
    seed: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,
}

impl Args {
    fn wallet_config(&self) -> WalletConfig {
        let config = WalletConfig {
            network: self.network,
            ..WalletConfig::default()
        };
        match self.coinbase_maturity {
            Some(maturity) => config.with_coinbase_maturity(maturity),
            None => config,
        }
    }

    fn key_provider(&self) -> Result<SeededKeyProvider> {
        let Some(seed) = &self.seed else {
            return Ok(SeededKeyProvider::random(self.network));
        };
        let bytes: [u8; 32] = hex::decode(seed)
            .context("seed is not valid hex")?
            .try_into()
            .map_err(|b: Vec<u8>| anyhow!("seed must be 32 bytes, got {}", b.len()))?;
        Ok(SeededKeyProvider::new(Seed::from_bytes(bytes), self.network))
    }
}

/// Wallet view at one stage of the run.
#[derive(Debug, Serialize)]
struct Snapshot {
    synced_height: u64,
    balance: Balance,
    unspent: usize,
}

#[derive(Debug, Serialize)]
struct PaymentSummary {
    txid: Hash256,
    inputs: usize,
    fee: u64,
    change: u64,
    change_address: Option<Address>,
    confirmed_at: u64,
}

#[derive(Debug, Serialize)]
struct Summary {
    network: NetworkType,
    coinbase_address: Address,
    coinbase_maturity: u64,
    funded: Snapshot,
    payment: PaymentSummary,
    confirmed: Snapshot,
    reorg_depth: u64,
    after_reorg: Snapshot,
}

fn snapshot(wallet: &InMemoryWallet) -> Result<Snapshot> {
    let account = wallet.config().default_account.clone();
    Ok(Snapshot {
        synced_height: wallet.synced_height(),
        balance: wallet.balance()?,
        unspent: wallet.list_unspent(&account)?.len(),
    })
}

async fn run(args: Args) -> Result<Summary> {
    let config = args.wallet_config();
    let coinbase_maturity = config
        .coinbase_maturity_override
        .unwrap_or_else(|| config.network.coinbase_maturity());
    let blocks = args.blocks.unwrap_or(coinbase_maturity + 4);
    if blocks <= coinbase_maturity {
        bail!("--blocks must exceed the coinbase maturity ({coinbase_maturity}) to fund a payment");
    }

    let keys = args.key_provider()?;
    let wallet = InMemoryWallet::new(
        config,
        Arc::new(BincodeCodec),
        Arc::new(keys),
        Arc::new(NullTxFilter),
    )
    .context("failed to create wallet")?;
    wallet.start().await.context("failed to start wallet")?;
    info!(address = %wallet.coinbase_address(), "wallet started");

    let mut chain = SimChain::new(wallet.clone(), args.first_height).with_subsidy(args.subsidy);
    let coinbase_script = p2pkh_script(wallet.coinbase_address());
    let tip = chain
        .mine_blocks(blocks, &coinbase_script)?
        .context("no blocks mined")?;
    wallet.sync(tip).await.context("wallet did not reach the mined tip")?;
    let funded_snapshot = snapshot(&wallet)?;
    info!(
        height = tip,
        spendable = funded_snapshot.balance.spendable,
        immature = funded_snapshot.balance.immature,
        "mined coinbases"
    );

    let burn = p2pkh_script(&Address::from_key_hash([0u8; 20], args.network));
    let request = CreateTransactionArgs::new(Vec::new(), args.fee_rate).pay_to_script(burn.clone(), args.amount);
    let funded = wallet
        .create_transaction(&request)
        .context("failed to fund payment")?;
    let txid = funded.tx.txid()?;
    let confirmed_at = chain.mine_block(&burn, vec![funded.tx.clone()])?.height();
    wallet.flush().await?;
    let confirmed = snapshot(&wallet)?;
    info!(%txid, height = confirmed_at, fee = funded.fee, "payment confirmed");

    for _ in 0..args.reorg_depth {
        if chain.disconnect_tip()?.is_none() {
            warn!("chain exhausted before reorg depth reached");
            break;
        }
    }
    wallet.flush().await?;
    let after_reorg = snapshot(&wallet)?;
    info!(
        depth = args.reorg_depth,
        height = after_reorg.synced_height,
        "disconnected blocks"
    );

    wallet.stop();
    wallet.stopped().await;

    Ok(Summary {
        network: args.network,
        coinbase_address: wallet.coinbase_address().clone(),
        coinbase_maturity,
        funded: funded_snapshot,
        payment: PaymentSummary {
            txid,
            inputs: funded.inputs.len(),
            fee: funded.fee,
            change: funded.change,
            change_address: funded.change_address,
            confirmed_at,
        },
        confirmed,
        reorg_depth: args.reorg_depth,
        after_reorg,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    info!("simwallet-sim v{}", env!("CARGO_PKG_VERSION"));
    let summary = run(args).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
