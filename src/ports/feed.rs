//! Feed Signal Port - Inbound Reporting Contract
//!
//! Everything the failover controller learns about the outside world
//! arrives as a `Signal` on one ordered channel. Feed clients never see
//! the routing state; they only report successes, failures, and events
//! through a `SignalHandle` bound to their source role.

use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::event::{PriceEvent, SourceId};
use crate::domain::routing::FailureKind;

/// Which controller-scoped timer a `TimerFired` signal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
  /// Startup window for the primary to connect, auth, and deliver.
  Auth,
  /// Active-source silence watchdog.
  MessageTimeout,
  /// Primary recovery stabilization window.
  Grace,
}

impl std::fmt::Display for TimerKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Auth => write!(f, "auth"),
      Self::MessageTimeout => write!(f, "message_timeout"),
      Self::Grace => write!(f, "grace"),
    }
  }
}

/// One unit of input for the controller's serialized evaluation loop.
///
/// Timer expiries are injected here too, carrying an epoch number so a
/// cancelled-and-replaced timer can never race a fresh signal: a stale
/// epoch is simply ignored at evaluation time.
#[derive(Debug, Clone)]
pub enum Signal {
  /// A normalized price event from either feed.
  Event(PriceEvent),
  /// The source connected and authenticated (or completed a good poll).
  Healthy(SourceId),
  /// A connection-level failure on the source.
  Failure {
    source: SourceId,
    kind: FailureKind,
  },
  /// A controller-scheduled timer elapsed.
  TimerFired {
    kind: TimerKind,
    epoch: u64,
  },
  /// Periodic proactive staleness evaluation.
  HealthTick,
}

/// Cloneable reporting handle given to one feed client.
///
/// Wraps the controller's inbound sender and stamps every report with
/// the client's source role, so a client can never impersonate the
/// other source. Sends are best-effort: if the controller is gone the
/// process is shutting down and reports are dropped silently.
#[derive(Debug, Clone)]
pub struct SignalHandle {
  source: SourceId,
  tx: mpsc::Sender<Signal>,
}

impl SignalHandle {
  /// Bind a handle to a source role.
  pub fn new(source: SourceId, tx: mpsc::Sender<Signal>) -> Self {
    Self { source, tx }
  }

  /// The role this handle reports as.
  pub fn source(&self) -> SourceId {
    self.source
  }

  /// Report a successfully parsed price update.
  pub async fn report_event(&self, symbol: String, price: Decimal, timestamp_ms: u64) {
    let event = PriceEvent {
      symbol,
      price,
      timestamp_ms,
      source: self.source,
    };
    self.send(Signal::Event(event)).await;
  }

  /// Report that the connection is established and authenticated.
  pub async fn report_healthy(&self) {
    self.send(Signal::Healthy(self.source)).await;
  }

  /// Report a connection-level failure.
  pub async fn report_failure(&self, kind: FailureKind) {
    self
      .send(Signal::Failure {
        source: self.source,
        kind,
      })
      .await;
  }

  async fn send(&self, signal: Signal) {
    if self.tx.send(signal).await.is_err() {
      debug!(source = %self.source, "Controller channel closed, dropping report");
    }
  }
}
