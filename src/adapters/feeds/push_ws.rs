//! Push WebSocket Feed - Primary Low-Latency Price Source
//!
//! Maintains a persistent connection to the push upstream (Finnhub-style
//! trade stream): token auth via query parameter, per-symbol subscribe
//! messages, reconnection with exponential backoff, and silence
//! detection on the read side. Emits normalized `PriceEvent`s and
//! summary health signals through its `SignalHandle`; the wire protocol
//! never leaks past this module.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

use crate::adapters::metrics::MetricsRegistry;
use crate::config::{FailoverConfig, PushFeedConfig};
use crate::ports::feed::SignalHandle;

use super::FeedError;

/// Environment variable holding the push feed API token.
const TOKEN_ENV: &str = "PUSH_FEED_API_TOKEN";

/// Reconnect backoff bounds.
const BACKOFF_BASE: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// Envelope for push feed messages; only `trade` carries price data.
#[derive(Debug, Deserialize)]
struct WsEnvelope {
    /// Message type: "trade", "ping", "error".
    #[serde(rename = "type")]
    msg_type: String,
    /// Trade entries, present on "trade" messages.
    #[serde(default)]
    data: Vec<WsTrade>,
    /// Error detail, present on "error" messages.
    #[serde(default)]
    msg: Option<String>,
}

/// A single trade entry from the push stream.
#[derive(Debug, Deserialize)]
struct WsTrade {
    /// Ticker symbol.
    s: String,
    /// Trade price.
    p: f64,
    /// Trade time (Unix ms).
    t: u64,
}

/// Primary push feed client.
pub struct PushFeed {
    /// WebSocket endpoint (token appended at connect time).
    ws_url: String,
    /// Symbols to subscribe on connect.
    symbols: Vec<String>,
    /// API token from the environment.
    token: String,
    /// Reporting handle bound to the primary role.
    handle: SignalHandle,
    /// Read-side silence window before the session is torn down.
    read_timeout: Duration,
    /// Connection and volume metrics, when the registry is enabled.
    metrics: Option<Arc<MetricsRegistry>>,
}

impl PushFeed {
    /// Create a push feed client, reading the API token from
    /// `PUSH_FEED_API_TOKEN`.
    pub fn from_env(
        config: &PushFeedConfig,
        failover: &FailoverConfig,
        symbols: Vec<String>,
        handle: SignalHandle,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .with_context(|| format!("{TOKEN_ENV} must be set for the push feed"))?;
        anyhow::ensure!(!token.is_empty(), "{TOKEN_ENV} is empty");

        Ok(Self {
            ws_url: config.ws_url.clone(),
            symbols,
            token,
            handle,
            read_timeout: failover.message_timeout(),
            metrics,
        })
    }

    /// Run the connection loop with exponential reconnect backoff.
    ///
    /// Every connection-level error is reported as a summary health
    /// signal before the next attempt; the routing decision stays with
    /// the controller.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        info!(url = %self.ws_url, symbols = self.symbols.len(), "Push feed starting");

        let mut backoff = BACKOFF_BASE;
        loop {
            match self.connect_and_stream(&mut shutdown_rx).await {
                Ok(()) => {
                    info!("Push feed shut down gracefully");
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        retry_in_secs = backoff.as_secs(),
                        "Push feed disconnected"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.set_connected(self.handle.source(), false);
                        metrics.record_failure(self.handle.source(), e.kind());
                        metrics.record_reconnect(self.handle.source());
                    }
                    self.handle.report_failure(e.kind()).await;

                    tokio::select! {
                        _ = shutdown_rx.recv() => return Ok(()),
                        _ = tokio::time::sleep(backoff) => {},
                    }
                    backoff = (backoff * 2).min(BACKOFF_CAP);
                }
            }
        }
    }

    /// Single session: connect, authenticate, subscribe, stream until
    /// error, silence, or shutdown.
    async fn connect_and_stream(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> std::result::Result<(), FeedError> {
        let url = format!("{}?token={}", self.ws_url, self.token);
        let (ws_stream, _) = connect_async(&url).await.map_err(classify_connect)?;

        let (mut write, mut read) = ws_stream.split();

        for symbol in &self.symbols {
            let subscribe = serde_json::json!({ "type": "subscribe", "symbol": symbol });
            write
                .send(Message::text(subscribe.to_string()))
                .await
                .map_err(|e| FeedError::ConnectionClosed(e.to_string()))?;
        }

        info!(symbols = self.symbols.len(), "Push feed connected and subscribed");
        if let Some(metrics) = &self.metrics {
            metrics.set_connected(self.handle.source(), true);
        }
        self.handle.report_healthy().await;

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received in push feed");
                    return Ok(());
                }
                msg = tokio::time::timeout(self.read_timeout, read.next()) => {
                    let msg = msg.map_err(|_| FeedError::Silent(self.read_timeout))?;
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_message(text.as_ref()).await;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            // Pong is handled automatically by tungstenite
                            debug!(len = data.len(), "Push feed ping received");
                        }
                        Some(Ok(Message::Close(frame))) => {
                            return Err(FeedError::ConnectionClosed(format!(
                                "close frame: {frame:?}"
                            )));
                        }
                        Some(Err(e)) => {
                            return Err(FeedError::ConnectionClosed(e.to_string()));
                        }
                        None => {
                            return Err(FeedError::ConnectionClosed(
                                "stream ended".to_string(),
                            ));
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    /// Parse one text frame and report any trades it carries.
    ///
    /// A malformed payload is a transient per-message problem: logged at
    /// debug and skipped, with zero health impact and no report.
    async fn handle_message(&self, text: &str) {
        let envelope: WsEnvelope = match serde_json::from_str(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(error = %e, "Skipping malformed push feed message");
                return;
            }
        };

        match envelope.msg_type.as_str() {
            "trade" => {
                for trade in envelope.data {
                    let Ok(price) = Decimal::try_from(trade.p) else {
                        debug!(symbol = %trade.s, raw = trade.p, "Skipping unrepresentable price");
                        continue;
                    };
                    if let Some(metrics) = &self.metrics {
                        metrics.record_received(self.handle.source());
                    }
                    self.handle.report_event(trade.s, price, trade.t).await;
                }
            }
            "ping" => {
                debug!("Push feed keepalive");
            }
            "error" => {
                warn!(detail = ?envelope.msg, "Push feed upstream error message");
            }
            other => {
                debug!(msg_type = %other, "Ignoring unhandled push feed message type");
            }
        }
    }
}

/// Classify a connect-time error: HTTP 401/403 during the upgrade is an
/// auth rejection, everything else a plain connection failure.
fn classify_connect(e: tokio_tungstenite::tungstenite::Error) -> FeedError {
    use tokio_tungstenite::tungstenite::Error as WsError;

    match &e {
        WsError::Http(response) => {
            let status = response.status();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                FeedError::AuthRejected
            } else {
                FeedError::HttpStatus(status.as_u16())
            }
        }
        _ => FeedError::ConnectionClosed(e.to_string()),
    }
}
