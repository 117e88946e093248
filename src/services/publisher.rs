//! Channel-backed publisher
//!
//! Hands every outbound message to an in-process channel as an
//! [`OutboundEvent`]; whatever drains the channel (a broker bridge, a log
//! sink) owns actual delivery. The JSON payload is rendered here so the wire
//! format is fixed at the publishing boundary.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::SettlementPublisher;
use crate::error::SettlementError;
use crate::messages::{
    BalanceUpdateMessage, OutboundEvent, SettlementCompletedMessage, SettlementFailedMessage,
};

/// [`SettlementPublisher`] writing to an unbounded mpsc channel.
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

impl ChannelPublisher {
    pub fn new(tx: mpsc::UnboundedSender<OutboundEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: OutboundEvent) -> Result<(), SettlementError> {
        match serde_json::to_string(&event) {
            Ok(payload) => debug!(
                topic = event.topic(),
                trade_id = event.trade_id(),
                payload = %payload,
                "publishing outbound event"
            ),
            Err(e) => {
                return Err(SettlementError::service("publisher", e.to_string()));
            }
        }

        self.tx
            .send(event)
            .map_err(|e| SettlementError::service("publisher", e.to_string()))
    }
}

#[async_trait]
impl SettlementPublisher for ChannelPublisher {
    async fn publish_completed(
        &self,
        message: &SettlementCompletedMessage,
    ) -> Result<(), SettlementError> {
        self.send(OutboundEvent::Completed(message.clone()))
    }

    async fn publish_balance_update(
        &self,
        message: &BalanceUpdateMessage,
    ) -> Result<(), SettlementError> {
        self.send(OutboundEvent::BalanceUpdate(message.clone()))
    }

    async fn publish_failed(
        &self,
        message: &SettlementFailedMessage,
    ) -> Result<(), SettlementError> {
        self.send(OutboundEvent::Failed(message.clone()))
    }
}
