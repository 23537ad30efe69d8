//! Routing state and failover audit types.
//!
//! `RoutingState` is the single source of truth for which upstream feed
//! is authoritative. It is owned exclusively by the failover controller's
//! serialized evaluation loop; every other component observes it through
//! `SourceChanged` notifications or the readiness probe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::SourceId;

/// Process-wide routing state.
///
/// Created in `Startup` at process start and never explicitly destroyed.
/// `BothUnavailable` is a valid steady state, not an error: the controller
/// keeps re-evaluating on every subsequent signal until a source heals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingState {
    /// Waiting for the primary feed's first authenticated event.
    Startup,
    /// Primary (push) feed is authoritative.
    PrimaryActive,
    /// Secondary (poll) feed is authoritative.
    FallbackActive,
    /// Neither feed is usable; nothing is forwarded.
    BothUnavailable,
}

impl RoutingState {
    /// The feed whose events are currently forwarded, if any.
    ///
    /// This is the single forwarding decision point: an event is forwarded
    /// iff its source matches this value.
    pub fn active_source(self) -> Option<SourceId> {
        match self {
            Self::PrimaryActive => Some(SourceId::Primary),
            Self::FallbackActive => Some(SourceId::Secondary),
            Self::Startup | Self::BothUnavailable => None,
        }
    }
}

impl std::fmt::Display for RoutingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::PrimaryActive => write!(f, "primary_active"),
            Self::FallbackActive => write!(f, "fallback_active"),
            Self::BothUnavailable => write!(f, "both_unavailable"),
        }
    }
}

/// Why a routing transition happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchReason {
    /// Primary delivered its first event during startup.
    Startup,
    /// Primary never produced an event within the auth timeout.
    AuthTimeout,
    /// Active source went silent past the message timeout.
    Timeout,
    /// Consecutive connection-level failures crossed the threshold.
    Failures,
    /// Primary stayed stable for the full grace period.
    Recovered,
    /// Fallback died while the primary was mid-recovery; primary promoted
    /// early rather than going dark.
    FallbackFailed,
}

impl std::fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::AuthTimeout => write!(f, "auth_timeout"),
            Self::Timeout => write!(f, "timeout"),
            Self::Failures => write!(f, "failures"),
            Self::Recovered => write!(f, "recovered"),
            Self::FallbackFailed => write!(f, "fallback_failed"),
        }
    }
}

/// Connection-level failure taxonomy.
///
/// Only these count toward a source's consecutive-failure threshold.
/// Transient per-message parse errors never become a `FailureKind`; the
/// feed adapters log and skip them without reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Upstream rejected our credentials.
    AuthRejected,
    /// Socket closed or connection refused.
    ConnectionClosed,
    /// No data within the expected window.
    Timeout,
    /// Poll endpoint returned a non-success HTTP status.
    HttpStatus(u16),
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AuthRejected => write!(f, "auth_rejected"),
            Self::ConnectionClosed => write!(f, "connection_closed"),
            Self::Timeout => write!(f, "timeout"),
            Self::HttpStatus(code) => write!(f, "http_{code}"),
        }
    }
}

/// Audit notification emitted on every routing transition.
///
/// Strictly ordered relative to the forwarded event stream: no event
/// tagged with the old source is forwarded after the notification
/// announcing the new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceChanged {
    /// Unique notification identifier for audit trails.
    pub id: Uuid,
    /// State before the transition.
    pub from: RoutingState,
    /// State after the transition.
    pub to: RoutingState,
    /// Trigger that caused the transition.
    pub reason: SwitchReason,
    /// Wall-clock time of the transition decision.
    pub timestamp: DateTime<Utc>,
}

impl SourceChanged {
    /// Build a notification for a transition decided now.
    pub fn now(from: RoutingState, to: RoutingState, reason: SwitchReason) -> Self {
        Self {
            id: Uuid::new_v4(),
            from,
            to,
            reason,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_source_follows_state() {
        assert_eq!(RoutingState::Startup.active_source(), None);
        assert_eq!(
            RoutingState::PrimaryActive.active_source(),
            Some(SourceId::Primary)
        );
        assert_eq!(
            RoutingState::FallbackActive.active_source(),
            Some(SourceId::Secondary)
        );
        assert_eq!(RoutingState::BothUnavailable.active_source(), None);
    }

    #[test]
    fn reasons_render_snake_case() {
        assert_eq!(SwitchReason::Timeout.to_string(), "timeout");
        assert_eq!(SwitchReason::AuthTimeout.to_string(), "auth_timeout");
        assert_eq!(SwitchReason::FallbackFailed.to_string(), "fallback_failed");
    }

    #[test]
    fn failure_kind_includes_http_status() {
        assert_eq!(FailureKind::HttpStatus(503).to_string(), "http_503");
        assert_eq!(FailureKind::AuthRejected.to_string(), "auth_rejected");
    }

    #[test]
    fn source_changed_serializes_states_snake_case() {
        let change = SourceChanged::now(
            RoutingState::PrimaryActive,
            RoutingState::FallbackActive,
            SwitchReason::Timeout,
        );
        let json = serde_json::to_string(&change).unwrap();
        assert!(json.contains("\"primary_active\""));
        assert!(json.contains("\"fallback_active\""));
        assert!(json.contains("\"timeout\""));
    }
}
