//! Trade-match consumer
//!
//! Bridges the inbound feed to the saga coordinator: one spawned task per
//! trade, many sagas in flight concurrently, strict sequencing inside each.
//! Broker plumbing (topics, offsets) lives behind whatever fills the feed
//! channel; this loop only sees JSON payloads.
//!
//! Shutdown is graceful by contract: a saga in progress must reach Completed
//! or Failed rather than being abandoned mid-step, otherwise holds would be
//! left with no compensation path. The loop therefore stops accepting new
//! trades on shutdown and drains the in-flight set before returning.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::models::{SettlementTransaction, TradeMatch};
use crate::services::LedgerService;
use crate::settlement::SettlementCoordinator;

pub struct SettlementConsumer {
    coordinator: Arc<SettlementCoordinator>,
    ledger: Arc<dyn LedgerService>,
}

impl SettlementConsumer {
    pub fn new(coordinator: Arc<SettlementCoordinator>, ledger: Arc<dyn LedgerService>) -> Self {
        Self {
            coordinator,
            ledger,
        }
    }

    /// Consume until the feed closes or shutdown is signalled, then drain
    /// every in-flight saga to a terminal state.
    pub async fn run(&self, mut feed: mpsc::Receiver<String>, mut shutdown: watch::Receiver<bool>) {
        info!("consumer started");

        let mut in_flight: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                maybe_payload = feed.recv() => {
                    match maybe_payload {
                        Some(payload) => self.dispatch(&payload, &mut in_flight).await,
                        None => {
                            info!("trade feed closed");
                            break;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if *shutdown.borrow() => {
                            info!("shutdown requested, draining in-flight settlements");
                            break;
                        }
                        Ok(()) => {}
                        Err(_) => {
                            warn!("shutdown channel closed, draining in-flight settlements");
                            break;
                        }
                    }
                }
            }

            // Reap finished sagas without blocking the feed
            while let Some(result) = in_flight.try_join_next() {
                if let Err(e) = result {
                    error!(error = %e, "settlement task aborted");
                }
            }
        }

        while let Some(result) = in_flight.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "settlement task aborted");
            }
        }

        info!("consumer stopped");
    }

    /// Decode one payload and spawn its saga. Malformed and already-settled
    /// trades are logged and skipped; they never take down the loop.
    async fn dispatch(&self, payload: &str, in_flight: &mut JoinSet<()>) {
        let trade: TradeMatch = match serde_json::from_str(payload) {
            Ok(trade) => trade,
            Err(e) => {
                error!(error = %e, "failed to deserialize trade match");
                return;
            }
        };

        match self.ledger.get_transaction(&trade.trade_id).await {
            Ok(Some(_)) => {
                warn!(trade_id = %trade.trade_id, "duplicate trade match ignored");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                // Redelivery dedupe is best-effort; the settlement itself
                // stays idempotency-keyed
                warn!(trade_id = %trade.trade_id, error = %e, "ledger lookup failed");
            }
        }

        info!(trade_id = %trade.trade_id, "received trade match");

        let coordinator = self.coordinator.clone();
        in_flight.spawn(async move {
            let mut ctx = SettlementTransaction::from_trade(&trade);
            if coordinator.process(&mut ctx).await {
                info!(trade_id = %ctx.trade_id, "successfully processed trade");
            } else {
                error!(trade_id = %ctx.trade_id, "failed to process trade");
            }
        });
    }
}
