//! Broadcast Fan-out - Downstream Delivery Adapter
//!
//! Implements the `FanOut` port with tokio broadcast channels: one for
//! the authoritative `PriceEvent` stream, one for `SourceChanged` audit
//! notifications. Subscribers that lag simply miss updates (broadcast
//! semantics); the router never blocks on a slow consumer.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use crate::adapters::metrics::MetricsRegistry;
use crate::domain::event::PriceEvent;
use crate::domain::routing::SourceChanged;
use crate::ports::fanout::FanOut;

/// Channel depth for both broadcast streams.
const CHANNEL_CAPACITY: usize = 4096;

/// Broadcast-channel implementation of the fan-out port.
pub struct BroadcastFanOut {
    /// Authoritative event stream sender.
    event_tx: broadcast::Sender<PriceEvent>,
    /// Routing transition notification sender.
    change_tx: broadcast::Sender<SourceChanged>,
    /// Optional metrics hook.
    metrics: Option<Arc<MetricsRegistry>>,
}

impl BroadcastFanOut {
    /// Create a fan-out without metrics (tests, tooling).
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (change_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            event_tx,
            change_tx,
            metrics: None,
        }
    }

    /// Create a fan-out that records forwarded volume and transitions.
    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        let mut fanout = Self::new();
        fanout.metrics = Some(metrics);
        fanout
    }

    /// Subscribe to the authoritative price event stream.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PriceEvent> {
        self.event_tx.subscribe()
    }

    /// Subscribe to routing transition notifications.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<SourceChanged> {
        self.change_tx.subscribe()
    }
}

impl Default for BroadcastFanOut {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FanOut for BroadcastFanOut {
    async fn forward(&self, event: &PriceEvent) -> anyhow::Result<()> {
        if let Some(metrics) = &self.metrics {
            metrics.record_forwarded(event.source);
        }
        // A send error only means no subscribers are listening right now.
        if self.event_tx.send(event.clone()).is_err() {
            debug!(symbol = %event.symbol, "No subscribers for forwarded event");
        }
        Ok(())
    }

    async fn source_changed(&self, change: &SourceChanged) -> anyhow::Result<()> {
        if let Some(metrics) = &self.metrics {
            metrics.record_transition(change);
        }
        if self.change_tx.send(change.clone()).is_err() {
            debug!(to = %change.to, "No subscribers for source-change notification");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::SourceId;
    use crate::domain::routing::{RoutingState, SwitchReason};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn subscribers_receive_forwarded_events_in_order() {
        let fanout = BroadcastFanOut::new();
        let mut rx = fanout.subscribe_events();

        for i in 0..3u64 {
            let event = PriceEvent {
                symbol: "AAPL".to_string(),
                price: dec!(187) + Decimal::from(i),
                timestamp_ms: 1_700_000_000_000 + i,
                source: SourceId::Primary,
            };
            fanout.forward(&event).await.unwrap();
        }

        for i in 0..3u64 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.timestamp_ms, 1_700_000_000_000 + i);
        }
    }

    #[tokio::test]
    async fn forward_without_subscribers_is_not_an_error() {
        let fanout = BroadcastFanOut::new();
        let event = PriceEvent {
            symbol: "MSFT".to_string(),
            price: dec!(370.10),
            timestamp_ms: 1_700_000_000_000,
            source: SourceId::Secondary,
        };
        fanout.forward(&event).await.unwrap();

        let change = SourceChanged::now(
            RoutingState::Startup,
            RoutingState::PrimaryActive,
            SwitchReason::Startup,
        );
        fanout.source_changed(&change).await.unwrap();
    }
}
