//! Routing Engine - Deterministic Failover State Machine
//!
//! The pure core of the router. Consumes one `Signal` at a time, in
//! arrival order, and returns the actions the driver must perform:
//! forward an event, announce a transition, or schedule a timer. No I/O
//! happens here, which keeps every transition unit-testable.
//!
//! Timer semantics: the engine never sleeps. It asks the driver to
//! schedule epoch-tagged timers and later receives their expiry as
//! ordinary signals. A replaced timer's old epoch no longer matches and
//! its expiry is ignored, so "timer fired" can never race "source just
//! failed again".

use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::config::FailoverConfig;
use crate::domain::event::{PriceEvent, SourceId};
use crate::domain::routing::{FailureKind, RoutingState, SourceChanged, SwitchReason};
use crate::ports::feed::{Signal, TimerKind};

use super::health_monitor::SourceHealth;

/// Side effect requested by the engine, performed by the driver in order.
#[derive(Debug, Clone)]
pub enum Action {
  /// Deliver this event downstream. Emitted only for the active source.
  Forward(PriceEvent),
  /// Publish a routing transition notification.
  Announce(SourceChanged),
  /// Schedule a timer that re-enters the loop as `Signal::TimerFired`.
  StartTimer {
    kind: TimerKind,
    duration: Duration,
    epoch: u64,
  },
}

/// The failover state machine.
///
/// Owns the process-wide `RoutingState` and both `SourceHealth` records
/// exclusively. Single writer by construction: the driver feeds it one
/// signal at a time.
pub struct RoutingEngine {
  config: FailoverConfig,
  state: RoutingState,
  primary: SourceHealth,
  secondary: SourceHealth,
  /// Last event (or activation) instant per source, for staleness checks.
  primary_last_seen: Option<Instant>,
  secondary_last_seen: Option<Instant>,
  /// Currently-valid epoch per timer kind; 0 means not armed.
  auth_epoch: u64,
  message_epoch: u64,
  grace_epoch: u64,
  /// Whether a recovery grace window is currently running.
  grace_pending: bool,
  epoch_counter: u64,
}

impl RoutingEngine {
  /// Create an engine in `Startup` with unproven sources.
  pub fn new(config: FailoverConfig) -> Self {
    Self {
      config,
      state: RoutingState::Startup,
      primary: SourceHealth::new(),
      secondary: SourceHealth::new(),
      primary_last_seen: None,
      secondary_last_seen: None,
      auth_epoch: 0,
      message_epoch: 0,
      grace_epoch: 0,
      grace_pending: false,
      epoch_counter: 0,
    }
  }

  /// Arm the startup auth window. Call once before the first signal.
  pub fn start(&mut self) -> Vec<Action> {
    vec![self.arm_timer(TimerKind::Auth, self.config.auth_timeout())]
  }

  /// Current routing state.
  pub fn state(&self) -> RoutingState {
    self.state
  }

  /// Health record of the given source.
  pub fn health(&self, source: SourceId) -> &SourceHealth {
    match source {
      SourceId::Primary => &self.primary,
      SourceId::Secondary => &self.secondary,
    }
  }

  /// Evaluate one signal and return the actions to perform, in order.
  pub fn handle(&mut self, signal: Signal, now: Instant) -> Vec<Action> {
    match signal {
      Signal::Event(event) => self.on_event(event, now),
      Signal::Healthy(source) => self.on_healthy(source, now),
      Signal::Failure { source, kind } => self.on_failure(source, kind, now),
      Signal::TimerFired { kind, epoch } => self.on_timer(kind, epoch, now),
      Signal::HealthTick => self.on_health_tick(now),
    }
  }

  // ── Signal handlers ─────────────────────────────────────────

  fn on_event(&mut self, event: PriceEvent, now: Instant) -> Vec<Action> {
    let source = event.source;
    self.health_mut(source).record_success(Utc::now());
    *self.last_seen_mut(source) = Some(now);

    match (self.state, source) {
      // Primary connected, authenticated, and delivered within the
      // auth window: it wins startup.
      (RoutingState::Startup, SourceId::Primary) => {
        let mut actions =
          self.transition(RoutingState::PrimaryActive, SwitchReason::Startup, now);
        actions.push(Action::Forward(event));
        actions
      }
      (RoutingState::Startup, SourceId::Secondary) => Vec::new(),

      (RoutingState::PrimaryActive, SourceId::Primary) => {
        let timer = self.arm_timer(TimerKind::MessageTimeout, self.config.message_timeout());
        vec![timer, Action::Forward(event)]
      }
      // Inactive source: consumed for health bookkeeping, never forwarded.
      (RoutingState::PrimaryActive, SourceId::Secondary) => Vec::new(),

      (RoutingState::FallbackActive, SourceId::Secondary) => {
        let timer = self.arm_timer(TimerKind::MessageTimeout, self.config.message_timeout());
        vec![timer, Action::Forward(event)]
      }
      // First valid event from a recovered primary opens the grace
      // window; further events while it runs change nothing.
      (RoutingState::FallbackActive, SourceId::Primary) => {
        if self.grace_pending {
          return Vec::new();
        }
        self.grace_pending = true;
        info!(
          grace_secs = self.config.grace_period_secs,
          "Primary delivering again, grace window started"
        );
        vec![self.arm_timer(TimerKind::Grace, self.config.grace_period())]
      }

      (RoutingState::BothUnavailable, _) => {
        let to = match source {
          SourceId::Primary => RoutingState::PrimaryActive,
          SourceId::Secondary => RoutingState::FallbackActive,
        };
        let mut actions = self.transition(to, SwitchReason::Recovered, now);
        actions.push(Action::Forward(event));
        actions
      }
    }
  }

  fn on_healthy(&mut self, source: SourceId, now: Instant) -> Vec<Action> {
    self.health_mut(source).record_success(Utc::now());

    match self.state {
      // Startup still waits for the primary's first event; a healthy
      // secondary is only remembered for the auth-timeout decision.
      RoutingState::Startup => Vec::new(),
      // Repeated healthy reports from an already-active source are a
      // no-op: no spurious transitions.
      RoutingState::PrimaryActive | RoutingState::FallbackActive => Vec::new(),
      RoutingState::BothUnavailable => {
        // Primary takes precedence if both recover in the same window.
        let to = match source {
          SourceId::Primary => RoutingState::PrimaryActive,
          SourceId::Secondary if self.primary.is_live => RoutingState::PrimaryActive,
          SourceId::Secondary => RoutingState::FallbackActive,
        };
        self.transition(to, SwitchReason::Recovered, now)
      }
    }
  }

  fn on_failure(&mut self, source: SourceId, kind: FailureKind, now: Instant) -> Vec<Action> {
    let threshold = self.config.max_consecutive_failures;
    let streak = self
      .health_mut(source)
      .record_failure(Utc::now(), kind, threshold);

    warn!(
      source = %source,
      kind = %kind,
      consecutive_failures = streak,
      state = %self.state,
      "Source reported connection-level failure"
    );

    match (self.state, source) {
      // The auth timer owns the startup decision.
      (RoutingState::Startup, _) => Vec::new(),

      (RoutingState::PrimaryActive, SourceId::Primary) if streak >= threshold => {
        if self.secondary.is_live {
          self.transition(RoutingState::FallbackActive, SwitchReason::Failures, now)
        } else {
          self.transition(RoutingState::BothUnavailable, SwitchReason::Failures, now)
        }
      }
      (RoutingState::PrimaryActive, _) => Vec::new(),

      // Any primary hiccup during the grace window cancels the pending
      // recovery; the next clean event restarts it from scratch.
      (RoutingState::FallbackActive, SourceId::Primary) => {
        if self.grace_pending {
          self.grace_pending = false;
          self.grace_epoch = 0;
          info!("Primary failed during grace window, recovery aborted");
        }
        Vec::new()
      }
      (RoutingState::FallbackActive, SourceId::Secondary) if streak >= threshold => {
        if self.primary.is_live {
          // Fallback died mid-recovery but the primary is already
          // delivering: promote it now instead of going dark.
          self.transition(
            RoutingState::PrimaryActive,
            SwitchReason::FallbackFailed,
            now,
          )
        } else {
          self.transition(RoutingState::BothUnavailable, SwitchReason::Failures, now)
        }
      }
      (RoutingState::FallbackActive, SourceId::Secondary) => Vec::new(),

      (RoutingState::BothUnavailable, _) => Vec::new(),
    }
  }

  fn on_timer(&mut self, kind: TimerKind, epoch: u64, now: Instant) -> Vec<Action> {
    if !self.timer_current(kind, epoch) {
      debug!(kind = %kind, epoch, "Stale timer expiry ignored");
      return Vec::new();
    }
    self.disarm(kind);

    match kind {
      TimerKind::Auth => {
        if self.state != RoutingState::Startup {
          return Vec::new();
        }
        warn!(
          auth_timeout_secs = self.config.auth_timeout_secs,
          "Primary produced no event within the auth window"
        );
        if self.secondary.is_live {
          self.transition(RoutingState::FallbackActive, SwitchReason::AuthTimeout, now)
        } else {
          self.transition(
            RoutingState::BothUnavailable,
            SwitchReason::AuthTimeout,
            now,
          )
        }
      }
      TimerKind::MessageTimeout => self.on_active_silent(now),
      TimerKind::Grace => {
        if self.state == RoutingState::FallbackActive && self.grace_pending {
          self.grace_pending = false;
          self.transition(RoutingState::PrimaryActive, SwitchReason::Recovered, now)
        } else {
          Vec::new()
        }
      }
    }
  }

  /// Proactive staleness evaluation, run on a fixed cadence even when
  /// no signals arrive. Backstop for the silence watchdog.
  fn on_health_tick(&mut self, now: Instant) -> Vec<Action> {
    debug!(
      state = %self.state,
      primary_failures = self.primary.consecutive_failures,
      secondary_failures = self.secondary.consecutive_failures,
      "Health tick"
    );

    let Some(active) = self.state.active_source() else {
      return Vec::new();
    };
    let stale = match self.last_seen(active) {
      Some(seen) => now.duration_since(seen) > self.config.message_timeout(),
      None => false,
    };
    if stale {
      warn!(source = %active, "Active source stale at health tick");
      self.disarm(TimerKind::MessageTimeout);
      self.on_active_silent(now)
    } else {
      Vec::new()
    }
  }

  /// The active source went silent past the message timeout.
  fn on_active_silent(&mut self, now: Instant) -> Vec<Action> {
    match self.state {
      RoutingState::PrimaryActive => {
        self.primary.mark_down();
        if self.secondary.is_live {
          self.transition(RoutingState::FallbackActive, SwitchReason::Timeout, now)
        } else {
          self.transition(RoutingState::BothUnavailable, SwitchReason::Timeout, now)
        }
      }
      RoutingState::FallbackActive => {
        self.secondary.mark_down();
        if self.primary.is_live {
          self.transition(
            RoutingState::PrimaryActive,
            SwitchReason::FallbackFailed,
            now,
          )
        } else {
          self.transition(RoutingState::BothUnavailable, SwitchReason::Timeout, now)
        }
      }
      RoutingState::Startup | RoutingState::BothUnavailable => Vec::new(),
    }
  }

  // ── Transition machinery ────────────────────────────────────

  /// Flip the routing state, cancel all in-flight timers, and emit the
  /// audit notification plus any state-entry timers.
  fn transition(&mut self, to: RoutingState, reason: SwitchReason, now: Instant) -> Vec<Action> {
    let from = self.state;
    if from == to {
      return Vec::new();
    }
    self.state = to;
    self.grace_pending = false;
    self.auth_epoch = 0;
    self.message_epoch = 0;
    self.grace_epoch = 0;

    let change = SourceChanged::now(from, to, reason);
    info!(
      from = %from,
      to = %to,
      reason = %reason,
      notification_id = %change.id,
      "Routing state changed"
    );

    let mut actions = vec![Action::Announce(change)];
    match to {
      RoutingState::PrimaryActive | RoutingState::FallbackActive => {
        let active = to.active_source().unwrap_or(SourceId::Primary);
        // Staleness measured from activation until the first event.
        *self.last_seen_mut(active) = Some(now);
        actions.push(self.arm_timer(TimerKind::MessageTimeout, self.config.message_timeout()));
      }
      RoutingState::BothUnavailable => {
        error!("Both upstream sources unavailable, nothing is being forwarded");
      }
      RoutingState::Startup => {}
    }
    actions
  }

  fn arm_timer(&mut self, kind: TimerKind, duration: Duration) -> Action {
    self.epoch_counter += 1;
    let epoch = self.epoch_counter;
    match kind {
      TimerKind::Auth => self.auth_epoch = epoch,
      TimerKind::MessageTimeout => self.message_epoch = epoch,
      TimerKind::Grace => self.grace_epoch = epoch,
    }
    Action::StartTimer {
      kind,
      duration,
      epoch,
    }
  }

  fn disarm(&mut self, kind: TimerKind) {
    match kind {
      TimerKind::Auth => self.auth_epoch = 0,
      TimerKind::MessageTimeout => self.message_epoch = 0,
      TimerKind::Grace => self.grace_epoch = 0,
    }
  }

  fn timer_current(&self, kind: TimerKind, epoch: u64) -> bool {
    let current = match kind {
      TimerKind::Auth => self.auth_epoch,
      TimerKind::MessageTimeout => self.message_epoch,
      TimerKind::Grace => self.grace_epoch,
    };
    current != 0 && current == epoch
  }

  fn health_mut(&mut self, source: SourceId) -> &mut SourceHealth {
    match source {
      SourceId::Primary => &mut self.primary,
      SourceId::Secondary => &mut self.secondary,
    }
  }

  fn last_seen(&self, source: SourceId) -> Option<Instant> {
    match source {
      SourceId::Primary => self.primary_last_seen,
      SourceId::Secondary => self.secondary_last_seen,
    }
  }

  fn last_seen_mut(&mut self, source: SourceId) -> &mut Option<Instant> {
    match source {
      SourceId::Primary => &mut self.primary_last_seen,
      SourceId::Secondary => &mut self.secondary_last_seen,
    }
  }
}
