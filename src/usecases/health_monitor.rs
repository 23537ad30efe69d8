//! Per-Source Health Bookkeeping
//!
//! Tracks one upstream source's failure streak and liveness. Mutated
//! only by the failover controller's evaluation loop; never shared
//! across sources. All cross-source decisions belong to the routing
//! engine, not here.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::routing::FailureKind;

/// Health record for a single upstream source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceHealth {
  /// Back-to-back connection-level failures, reset on any success.
  pub consecutive_failures: u32,
  /// When the source last delivered a success (event or healthy signal).
  pub last_success_at: Option<DateTime<Utc>>,
  /// When the source last reported a connection-level failure.
  pub last_failure_at: Option<DateTime<Utc>>,
  /// Whether the source is currently considered usable.
  pub is_live: bool,
}

impl SourceHealth {
  /// A source starts unproven: not live until its first success.
  pub fn new() -> Self {
    Self {
      consecutive_failures: 0,
      last_success_at: None,
      last_failure_at: None,
      is_live: false,
    }
  }

  /// Record a successful message or healthy signal.
  ///
  /// Resets the failure streak and marks the source live.
  pub fn record_success(&mut self, now: DateTime<Utc>) {
    self.consecutive_failures = 0;
    self.last_success_at = Some(now);
    self.is_live = true;
  }

  /// Record a connection-level failure and return the new streak.
  ///
  /// Liveness is only revoked once the streak reaches `threshold`;
  /// a single bad poll does not take a source out of rotation.
  pub fn record_failure(
    &mut self,
    now: DateTime<Utc>,
    _kind: FailureKind,
    threshold: u32,
  ) -> u32 {
    self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    self.last_failure_at = Some(now);
    if self.consecutive_failures >= threshold {
      self.is_live = false;
    }
    self.consecutive_failures
  }

  /// Force the source down without touching the failure streak.
  ///
  /// Used when the silence watchdog fires: the source produced no
  /// failures, it just stopped talking.
  pub fn mark_down(&mut self) {
    self.is_live = false;
  }
}

impl Default for SourceHealth {
  fn default() -> Self {
    Self::new()
  }
}
