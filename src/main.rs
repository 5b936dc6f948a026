//! Liquidation Bidder
//!
//! Keeps one aggregated liquidation transaction in flight and re-bids its
//! gas price while it stays profitable.
//! Features:
//! - Candidate, sweep and oracle events read as JSON lines from stdin
//! - Batch liquidation with optional oracle price update
//! - Replace-by-fee bidding bounded by a fee ceiling and the revenue at stake
//! - Withdrawal of every submission on shutdown

use std::sync::Arc;

use alloy::primitives::Address;
use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidator_chain::gas::gwei_to_wei;
use liquidator_chain::{
    GasStrategy, LegacyGasStrategy, LiquidatorContract, TransactionQueue, TransactionSender,
};
use liquidator_core::{
    parse_event_line, spawn_bidder, BidController, BidderConfig, BotConfig, EventBus,
};

/// Environment variable names.
mod env {
    pub const RPC_URL: &str = "RPC_URL";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const LIQUIDATOR: &str = "LIQUIDATOR";
    pub const CHAIN_ID: &str = "CHAIN_ID";
}

#[tokio::main]
async fn main() -> Result<()> {
    // Print startup banner
    print_banner();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    EnvFilter::new("info,liquidator_core=debug,liquidator_chain=debug")
                }),
        )
        .init();

    // Use BOT_PROFILE env var to select: testing, production, aggressive, or file path
    let bot_config = BotConfig::from_env()?;
    bot_config.validate()?;
    bot_config.log_config();

    let config = load_config()?;
    info!(
        chain_id = config.chain_id,
        liquidator = %config.liquidator,
        "Starting liquidation bidder"
    );

    // Collaborators
    let sender = Arc::new(
        TransactionSender::new(&config.private_key, &config.rpc_url, config.chain_id).await?,
    );
    let gas: Arc<dyn GasStrategy> = Arc::new(LegacyGasStrategy::new(
        config.rpc_url.clone(),
        gwei_to_wei(bot_config.queue.initial_gas_price_gwei),
        gwei_to_wei(bot_config.queue.max_gas_price_gwei),
    ));
    let queue = Arc::new(
        TransactionQueue::new(sender, gas.clone())
            .with_bump_bps(bot_config.queue.replacement_bump_bps),
    );
    info!(?queue, "Transaction queue ready");

    let controller = BidController::new(
        LiquidatorContract::new(config.liquidator),
        queue,
        gas,
        BidderConfig::from(&bot_config),
    );

    let bus = EventBus::default();
    let mut bidder = spawn_bidder(controller, &bus);

    let ingest = tokio::spawn(ingest_stdin(bus.clone()));

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Cannot listen for Ctrl-C");
            }
            info!("Shutdown requested");
        }
        _ = wait_for(ingest) => {
            info!("Event input closed");
        }
    }

    bidder.stop().await;
    info!("Shutdown complete");
    Ok(())
}

/// Configuration loaded from environment.
struct Config {
    rpc_url: String,
    private_key: String,
    liquidator: Address,
    chain_id: u64,
}

fn load_config() -> Result<Config> {
    let get_env = |name: &str| -> Result<String> {
        std::env::var(name).map_err(|_| anyhow::anyhow!("Missing env var: {}", name))
    };

    let chain_id = match std::env::var(env::CHAIN_ID) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid {}: {}", env::CHAIN_ID, e))?,
        Err(_) => 1,
    };

    Ok(Config {
        rpc_url: get_env(env::RPC_URL)?,
        private_key: get_env(env::PRIVATE_KEY)?,
        liquidator: get_env(env::LIQUIDATOR)?
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address for {}: {}", env::LIQUIDATOR, e))?,
        chain_id,
    })
}

/// Publish every JSON line from stdin to the bus until stdin closes.
async fn ingest_stdin(bus: EventBus) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_event_line(line) {
            Ok(event) => {
                let topic = event.topic();
                let receivers = bus.publish(event);
                debug!(topic, receivers, "Event published");
            }
            Err(e) => warn!(error = %e, "Ignoring malformed event"),
        }
    }
    Ok(())
}

async fn wait_for(task: tokio::task::JoinHandle<Result<()>>) {
    match task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Event input failed"),
        Err(e) => warn!(error = %e, "Event input task panicked"),
    }
}

fn print_banner() {
    println!(r#"
    ╦  ┬┌─┐ ┬ ┬┬┌┬┐┌─┐┌┬┐┌─┐┬─┐
    ║  ││─┼┐│ ││ ││├─┤ │ │ │├┬┘
    ╩═╝┴└─┘└└─┘┴─┴┘┴ ┴ ┴ └─┘┴└─
    Liquidation Bidder v0.1.0
    "#);
}
