//! Settlement Core - process entry point
//!
//! Bootstraps config and logging, wires the in-memory collaborators, then
//! runs the consumer over a demo trade feed until ctrl-c. The outbound
//! channel is drained by a logging task standing in for a broker bridge.

use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use settlement_core::config::AppConfig;
use settlement_core::fee::FeeSchedule;
use settlement_core::logging::init_logging;
use settlement_core::services::{
    ChannelPublisher, InMemoryAssetService, InMemoryLedgerService, InMemoryWalletService,
    StandardFeeService,
};
use settlement_core::{SettlementConsumer, SettlementCoordinator};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Demo balances so the sample feed has something to settle.
fn seed_demo_accounts(assets: &InMemoryAssetService, wallet: &InMemoryWalletService) {
    for user in ["alice", "bob"] {
        assets.deposit(user, "BTC", Decimal::from(100_000));
        wallet.credit(user, "BTC", Decimal::from(100));
    }
    // carol is underfunded on purpose: her trade exercises the rollback path
    assets.deposit("carol", "BTC", Decimal::from(1));
}

fn demo_feed() -> Vec<String> {
    let trades = serde_json::json!([
        {
            "tradeId": "demo-1",
            "buyerId": "alice",
            "sellerId": "bob",
            "symbol": "BTC",
            "price": "100",
            "quantity": "2",
            "timestamp": "2026-08-07T00:00:00Z",
            "makerSide": "buy"
        },
        {
            "tradeId": "demo-2",
            "buyerId": "carol",
            "sellerId": "bob",
            "symbol": "BTC",
            "price": "50",
            "quantity": "1",
            "timestamp": "2026-08-07T00:00:01Z",
            "makerSide": "sell"
        }
    ]);
    trades
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .map(|t| t.to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let config = AppConfig::load(&env).unwrap_or_else(|e| {
        eprintln!("using default config: {}", e);
        AppConfig::default()
    });
    let _guard = init_logging(&config);

    info!(env = %env, "starting settlement core");

    let assets = Arc::new(InMemoryAssetService::new());
    let wallet = Arc::new(InMemoryWalletService::new());
    let ledger = Arc::new(InMemoryLedgerService::new());
    seed_demo_accounts(&assets, &wallet);

    let (out_tx, mut out_rx) = mpsc::unbounded_channel();
    let publisher = Arc::new(ChannelPublisher::new(out_tx));
    let fees = Arc::new(StandardFeeService::new(FeeSchedule::from_config(
        &config.fees,
    )));

    let coordinator = Arc::new(SettlementCoordinator::new(
        assets,
        wallet,
        fees,
        ledger.clone(),
        publisher,
        &config.resilience,
    ));
    let consumer = SettlementConsumer::new(coordinator, ledger);

    // Outbound drain: logs every published message in place of a broker
    tokio::spawn(async move {
        while let Some(event) = out_rx.recv().await {
            info!(
                topic = event.topic(),
                trade_id = event.trade_id(),
                "outbound event"
            );
        }
    });

    let (feed_tx, feed_rx) = mpsc::channel(config.consumer.queue_size);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Demo feed; a broker bridge would fill this channel in production
    let demo = tokio::spawn(async move {
        for payload in demo_feed() {
            if feed_tx.send(payload).await.is_err() {
                warn!("feed channel closed before demo trades were sent");
                return;
            }
        }
        info!("demo trades submitted, press ctrl-c to stop");
        // Keep the feed open until shutdown
        feed_tx.closed().await;
    });

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
        let _ = shutdown_tx.send(true);
    });

    consumer.run(feed_rx, shutdown_rx).await;
    demo.abort();

    info!("settlement core stopped");
    Ok(())
}
