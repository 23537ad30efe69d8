//! Failover Controller - Serialized Driver for the Routing Engine
//!
//! Funnels every input — feed events, health reports, timer expiries,
//! the periodic staleness tick — into one ordered mpsc channel and
//! evaluates them one at a time against the routing engine. This is the
//! concurrency design that makes the "at most one active source"
//! invariant hold without locks: state transitions happen in signal
//! arrival order, full stop.
//!
//! Timers are plain spawned sleeps that re-enter the same channel as
//! `Signal::TimerFired` with their epoch; the engine discards the ones
//! that were superseded.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{debug, info, instrument, warn};

use crate::config::FailoverConfig;
use crate::domain::event::SourceId;
use crate::domain::routing::RoutingState;
use crate::ports::fanout::FanOut;
use crate::ports::feed::{Signal, SignalHandle};

use super::routing_engine::{Action, RoutingEngine};

/// Inbound signal channel depth. Feeds block briefly when the loop is
/// saturated rather than reordering or dropping signals.
const SIGNAL_BUFFER: usize = 1024;

/// Drives the routing engine from a single evaluation loop.
pub struct FailoverController<F: FanOut> {
  engine: RoutingEngine,
  config: FailoverConfig,
  signal_rx: mpsc::Receiver<Signal>,
  signal_tx: mpsc::Sender<Signal>,
  fanout: Arc<F>,
  state_tx: watch::Sender<RoutingState>,
  shutdown_rx: broadcast::Receiver<()>,
}

impl<F: FanOut> FailoverController<F> {
  /// Create a controller in `Startup`.
  pub fn new(
    config: FailoverConfig,
    fanout: Arc<F>,
    shutdown_rx: broadcast::Receiver<()>,
  ) -> Self {
    let (signal_tx, signal_rx) = mpsc::channel(SIGNAL_BUFFER);
    let (state_tx, _) = watch::channel(RoutingState::Startup);

    Self {
      engine: RoutingEngine::new(config.clone()),
      config,
      signal_rx,
      signal_tx,
      fanout,
      state_tx,
      shutdown_rx,
    }
  }

  /// Reporting handle for one feed client.
  pub fn handle(&self, source: SourceId) -> SignalHandle {
    SignalHandle::new(source, self.signal_tx.clone())
  }

  /// Observe routing state changes (readiness probe, dashboards).
  pub fn state_receiver(&self) -> watch::Receiver<RoutingState> {
    self.state_tx.subscribe()
  }

  /// Run the evaluation loop until shutdown or all reporters are gone.
  #[instrument(skip(self), name = "failover_loop")]
  pub async fn run(mut self) -> Result<()> {
    info!(
      auth_timeout_secs = self.config.auth_timeout_secs,
      message_timeout_secs = self.config.message_timeout_secs,
      max_consecutive_failures = self.config.max_consecutive_failures,
      grace_period_secs = self.config.grace_period_secs,
      "Failover controller started"
    );

    let startup = self.engine.start();
    self.apply(startup).await;

    let mut health_tick = tokio::time::interval(self.config.health_check_interval());
    health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first tick of a tokio interval fires immediately; swallow it.
    health_tick.tick().await;

    loop {
      let signal = tokio::select! {
        biased;
        _ = self.shutdown_rx.recv() => {
          info!("Shutdown signal received, stopping failover controller");
          break;
        }
        _ = health_tick.tick() => Signal::HealthTick,
        signal = self.signal_rx.recv() => match signal {
          Some(signal) => signal,
          None => {
            warn!("All signal reporters dropped, stopping failover controller");
            break;
          }
        },
      };

      let now = tokio::time::Instant::now().into_std();
      let actions = self.engine.handle(signal, now);
      self.apply(actions).await;
    }

    Ok(())
  }

  /// Perform the engine's requested side effects, strictly in order.
  ///
  /// Ordering matters: an `Announce` is a fence between events of the
  /// old source and events of the new one, so both are awaited before
  /// the next action runs.
  async fn apply(&mut self, actions: Vec<Action>) {
    for action in actions {
      match action {
        Action::Forward(event) => {
          if let Err(e) = self.fanout.forward(&event).await {
            warn!(error = %e, symbol = %event.symbol, "Fan-out rejected event");
          }
        }
        Action::Announce(change) => {
          let _ = self.state_tx.send(change.to);
          if let Err(e) = self.fanout.source_changed(&change).await {
            warn!(error = %e, "Fan-out rejected source-change notification");
          }
        }
        Action::StartTimer {
          kind,
          duration,
          epoch,
        } => {
          debug!(kind = %kind, epoch, ?duration, "Timer armed");
          let tx = self.signal_tx.clone();
          tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = tx.send(Signal::TimerFired { kind, epoch }).await;
          });
        }
      }
    }
  }
}
