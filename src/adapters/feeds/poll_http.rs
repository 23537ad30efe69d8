//! Poll HTTP Feed - Secondary Snapshot Price Source
//!
//! Periodically requests quote snapshots from the poll upstream (a
//! Yahoo-style batch quote endpoint) and normalizes each quote into a
//! `PriceEvent`. HTTP failures and timeouts are reported as summary
//! health signals; a successful poll reports healthy and one event per
//! quote. The controller decides whether any of it gets forwarded.

use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::PollFeedConfig;
use crate::ports::feed::SignalHandle;

use super::FeedError;

/// Batch quote endpoint response envelope.
#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<Quote>,
}

/// One symbol's snapshot from the poll upstream.
#[derive(Debug, Deserialize)]
struct Quote {
    symbol: String,
    #[serde(rename = "regularMarketPrice")]
    regular_market_price: Option<f64>,
    /// Quote time in Unix seconds.
    #[serde(rename = "regularMarketTime")]
    regular_market_time: Option<u64>,
}

/// Secondary poll feed client.
pub struct PollFeed {
    client: reqwest::Client,
    /// Quote endpoint base URL.
    base_url: String,
    /// Symbols requested in one batch call.
    symbols: Vec<String>,
    /// Polling cadence.
    interval: std::time::Duration,
    /// Reporting handle bound to the secondary role.
    handle: SignalHandle,
    /// Connection and volume metrics, when the registry is enabled.
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PollFeed {
    /// Create a poll feed client with a request-scoped timeout.
    pub fn new(
        config: &PollFeedConfig,
        symbols: Vec<String>,
        handle: SignalHandle,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            symbols,
            interval: config.poll_interval(),
            handle,
            metrics,
        })
    }

    /// Run the polling loop until shutdown.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(
            base_url = %self.base_url,
            symbols = self.symbols.len(),
            interval_secs = self.interval.as_secs(),
            "Poll feed starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Poll feed shut down gracefully");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        warn!(error = %e, "Poll request failed");
                        if let Some(metrics) = &self.metrics {
                            metrics.set_connected(self.handle.source(), false);
                            metrics.record_failure(self.handle.source(), e.kind());
                        }
                        self.handle.report_failure(e.kind()).await;
                    }
                }
            }
        }
    }

    /// One batch quote request. A good response reports healthy plus one
    /// event per usable quote; an unparseable body is a transient
    /// problem (logged, skipped, no health impact).
    async fn poll_once(&self) -> std::result::Result<(), FeedError> {
        let url = format!(
            "{}/v7/finance/quote?symbols={}",
            self.base_url,
            self.symbols.join(",")
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await.map_err(classify_transport)?;
        let envelope: QuoteEnvelope = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Skipping malformed poll response body");
                return Ok(());
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.set_connected(self.handle.source(), true);
        }
        self.handle.report_healthy().await;

        for quote in envelope.quote_response.result {
            let Some(raw_price) = quote.regular_market_price else {
                debug!(symbol = %quote.symbol, "Quote without price, skipping");
                continue;
            };
            let Ok(price) = Decimal::try_from(raw_price) else {
                debug!(symbol = %quote.symbol, raw = raw_price, "Skipping unrepresentable price");
                continue;
            };
            let timestamp_ms = quote
                .regular_market_time
                .map(|secs| secs * 1000)
                .unwrap_or_else(|| chrono::Utc::now().timestamp_millis() as u64);

            if let Some(metrics) = &self.metrics {
                metrics.record_received(self.handle.source());
            }
            self.handle
                .report_event(quote.symbol, price, timestamp_ms)
                .await;
        }

        Ok(())
    }
}

/// Classify a reqwest transport error: timeouts are their own failure
/// kind, everything else counts as a closed connection.
fn classify_transport(e: reqwest::Error) -> FeedError {
    if e.is_timeout() {
        FeedError::Silent(std::time::Duration::ZERO)
    } else {
        FeedError::ConnectionClosed(e.to_string())
    }
}
