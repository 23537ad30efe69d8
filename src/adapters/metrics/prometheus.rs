//! Prometheus Metrics Registry - Routing Observability
//!
//! Registers and exposes Prometheus metrics for dashboards and alerts.
//! Covers per-source event volume, failure counts by kind, routing
//! transitions by reason, and the current routing state.

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tokio::sync::broadcast;
use tracing::{info, instrument};

use crate::domain::event::SourceId;
use crate::domain::routing::{RoutingState, SourceChanged};

/// Centralized Prometheus metrics for the feed router.
///
/// All metrics follow the naming convention `feed_router_*` and carry a
/// `source` label where per-source filtering makes sense.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Events received from each source, forwarded or not.
    pub events_received: IntCounterVec,
    /// Events forwarded downstream, by source.
    pub events_forwarded: IntCounterVec,
    /// Connection-level failures, by source and kind.
    pub source_failures: IntCounterVec,
    /// Routing transitions, by from/to/reason.
    pub transitions: IntCounterVec,
    /// Current routing state (0=startup, 1=primary, 2=fallback, 3=dark).
    pub routing_state: IntGauge,
    /// Feed connection status (1 = connected, 0 = disconnected).
    pub feed_connected: GaugeVec,
    /// Reconnect attempts per source.
    pub reconnects: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let events_received = IntCounterVec::new(
            Opts::new(
                "feed_router_events_received_total",
                "Price events received from upstream sources",
            ),
            &["source"],
        )?;

        let events_forwarded = IntCounterVec::new(
            Opts::new(
                "feed_router_events_forwarded_total",
                "Price events forwarded downstream",
            ),
            &["source"],
        )?;

        let source_failures = IntCounterVec::new(
            Opts::new(
                "feed_router_source_failures_total",
                "Connection-level failures per source",
            ),
            &["source", "kind"],
        )?;

        let transitions = IntCounterVec::new(
            Opts::new(
                "feed_router_transitions_total",
                "Routing state transitions",
            ),
            &["from", "to", "reason"],
        )?;

        let routing_state = IntGauge::new(
            "feed_router_routing_state",
            "Current routing state (0=startup, 1=primary_active, 2=fallback_active, 3=both_unavailable)",
        )?;

        let feed_connected = GaugeVec::new(
            Opts::new(
                "feed_router_feed_connected",
                "Feed connection status (1=connected, 0=disconnected)",
            ),
            &["source"],
        )?;

        let reconnects = IntCounterVec::new(
            Opts::new(
                "feed_router_reconnects_total",
                "Reconnect attempts per source",
            ),
            &["source"],
        )?;

        // Register all metrics
        registry.register(Box::new(events_received.clone()))?;
        registry.register(Box::new(events_forwarded.clone()))?;
        registry.register(Box::new(source_failures.clone()))?;
        registry.register(Box::new(transitions.clone()))?;
        registry.register(Box::new(routing_state.clone()))?;
        registry.register(Box::new(feed_connected.clone()))?;
        registry.register(Box::new(reconnects.clone()))?;

        Ok(Self {
            registry,
            events_received,
            events_forwarded,
            source_failures,
            transitions,
            routing_state,
            feed_connected,
            reconnects,
        })
    }

    /// Record an event received from a source, forwarded or not.
    pub fn record_received(&self, source: SourceId) {
        self.events_received
            .with_label_values(&[&source.to_string()])
            .inc();
    }

    /// Record a forwarded event.
    pub fn record_forwarded(&self, source: SourceId) {
        self.events_forwarded
            .with_label_values(&[&source.to_string()])
            .inc();
    }

    /// Record a connection-level failure by kind.
    pub fn record_failure(&self, source: SourceId, kind: crate::domain::routing::FailureKind) {
        self.source_failures
            .with_label_values(&[&source.to_string(), &kind.to_string()])
            .inc();
    }

    /// Flip the per-source connection gauge.
    pub fn set_connected(&self, source: SourceId, connected: bool) {
        self.feed_connected
            .with_label_values(&[&source.to_string()])
            .set(if connected { 1.0 } else { 0.0 });
    }

    /// Record a reconnect attempt.
    pub fn record_reconnect(&self, source: SourceId) {
        self.reconnects
            .with_label_values(&[&source.to_string()])
            .inc();
    }

    /// Record a routing transition and update the state gauge.
    pub fn record_transition(&self, change: &SourceChanged) {
        self.transitions
            .with_label_values(&[
                &change.from.to_string(),
                &change.to.to_string(),
                &change.reason.to_string(),
            ])
            .inc();
        self.routing_state.set(state_value(change.to));
    }

    /// Serve Prometheus metrics on the configured bind address.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn serve(
        self: Arc<Self>,
        bind_address: String,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> anyhow::Result<()> {
        let metrics_self = Arc::clone(&self);

        let app = Router::new().route(
            "/metrics",
            get(move || {
                let registry = metrics_self.registry.clone();
                async move {
                    let encoder = TextEncoder::new();
                    let metric_families = registry.gather();
                    let mut buffer = Vec::new();
                    if encoder.encode(&metric_families, &mut buffer).is_err() {
                        return String::new();
                    }
                    String::from_utf8(buffer).unwrap_or_default()
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind(&bind_address).await?;
        info!(address = %bind_address, "Prometheus metrics server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }
}

/// Numeric encoding of the routing state for the gauge.
fn state_value(state: RoutingState) -> i64 {
    match state {
        RoutingState::Startup => 0,
        RoutingState::PrimaryActive => 1,
        RoutingState::FallbackActive => 2,
        RoutingState::BothUnavailable => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::routing::SwitchReason;

    #[test]
    fn transition_updates_counter_and_gauge() {
        let metrics = MetricsRegistry::new().unwrap();
        let change = SourceChanged::now(
            RoutingState::PrimaryActive,
            RoutingState::FallbackActive,
            SwitchReason::Timeout,
        );

        metrics.record_transition(&change);

        assert_eq!(metrics.routing_state.get(), 2);
        let count = metrics
            .transitions
            .with_label_values(&["primary_active", "fallback_active", "timeout"])
            .get();
        assert_eq!(count, 1);
    }

    #[test]
    fn forwarded_counter_is_per_source() {
        let metrics = MetricsRegistry::new().unwrap();
        metrics.record_forwarded(SourceId::Primary);
        metrics.record_forwarded(SourceId::Primary);
        metrics.record_forwarded(SourceId::Secondary);

        assert_eq!(
            metrics
                .events_forwarded
                .with_label_values(&["primary"])
                .get(),
            2
        );
        assert_eq!(
            metrics
                .events_forwarded
                .with_label_values(&["secondary"])
                .get(),
            1
        );
    }
}
