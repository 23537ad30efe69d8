//! Configuration Module - TOML-based Router Configuration
//!
//! Loads and validates configuration from `config.toml`. All endpoint
//! URLs, failover thresholds, and symbol lists are externalized here -
//! nothing is hardcoded in the domain layer. The push feed API token is
//! the one exception: it comes from the environment, never from a file.

pub mod loader;

use std::time::Duration;

use serde::Deserialize;

/// Top-level router configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any feed connects.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Service identity and logging.
  pub service: ServiceConfig,
  /// Symbols tracked by both feeds.
  pub symbols: Vec<String>,
  /// Primary (push/WebSocket) feed endpoint.
  pub push_feed: PushFeedConfig,
  /// Secondary (poll/HTTP) feed endpoint.
  pub poll_feed: PollFeedConfig,
  /// Failover thresholds and grace periods.
  #[serde(default)]
  pub failover: FailoverConfig,
  /// Metrics and health endpoints.
  #[serde(default)]
  pub metrics: MetricsConfig,
}

/// Service identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
  /// Human-readable service name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
}

/// Push feed (primary source) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PushFeedConfig {
  /// WebSocket endpoint URL.
  pub ws_url: String,
}

/// Poll feed (secondary source) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollFeedConfig {
  /// Quote endpoint base URL.
  pub base_url: String,
  /// Polling cadence in seconds.
  #[serde(default = "default_poll_interval")]
  pub poll_interval_secs: u64,
  /// Per-request HTTP timeout in seconds.
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
}

impl PollFeedConfig {
  /// Polling cadence as a `Duration`.
  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs)
  }

  /// Per-request timeout as a `Duration`.
  pub fn request_timeout(&self) -> Duration {
    Duration::from_secs(self.request_timeout_secs)
  }
}

/// Failover controller thresholds.
///
/// All timers are wall-clock durations scoped to the controller loop.
#[derive(Debug, Clone, Deserialize)]
pub struct FailoverConfig {
  /// How long the primary has to connect, authenticate, and deliver
  /// its first event during startup.
  #[serde(default = "default_auth_timeout")]
  pub auth_timeout_secs: u64,
  /// Maximum silence from the active source before failover.
  #[serde(default = "default_message_timeout")]
  pub message_timeout_secs: u64,
  /// Back-to-back connection-level failures before a source is
  /// considered down.
  #[serde(default = "default_max_failures")]
  pub max_consecutive_failures: u32,
  /// Stabilization window a recovered primary must survive before
  /// being promoted back.
  #[serde(default = "default_grace_period")]
  pub grace_period_secs: u64,
  /// Cadence of the proactive staleness check, used even when no new
  /// signals arrive.
  #[serde(default = "default_health_check_interval")]
  pub health_check_interval_secs: u64,
}

impl FailoverConfig {
  /// Startup auth window as a `Duration`.
  pub fn auth_timeout(&self) -> Duration {
    Duration::from_secs(self.auth_timeout_secs)
  }

  /// Active-source silence window as a `Duration`.
  pub fn message_timeout(&self) -> Duration {
    Duration::from_secs(self.message_timeout_secs)
  }

  /// Recovery stabilization window as a `Duration`.
  pub fn grace_period(&self) -> Duration {
    Duration::from_secs(self.grace_period_secs)
  }

  /// Staleness check cadence as a `Duration`.
  pub fn health_check_interval(&self) -> Duration {
    Duration::from_secs(self.health_check_interval_secs)
  }
}

impl Default for FailoverConfig {
  fn default() -> Self {
    Self {
      auth_timeout_secs: default_auth_timeout(),
      message_timeout_secs: default_message_timeout(),
      max_consecutive_failures: default_max_failures(),
      grace_period_secs: default_grace_period(),
      health_check_interval_secs: default_health_check_interval(),
    }
  }
}

/// Metrics and health endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
  /// Enable Prometheus metrics export.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Metrics server bind address.
  #[serde(default = "default_metrics_addr")]
  pub bind_address: String,
  /// Health probe (/live, /ready, /state) port.
  #[serde(default = "default_health_port")]
  pub health_port: u16,
}

impl Default for MetricsConfig {
  fn default() -> Self {
    Self {
      enabled: default_true(),
      bind_address: default_metrics_addr(),
      health_port: default_health_port(),
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_poll_interval() -> u64 {
  5
}

fn default_request_timeout() -> u64 {
  10
}

fn default_auth_timeout() -> u64 {
  10
}

fn default_message_timeout() -> u64 {
  30
}

fn default_max_failures() -> u32 {
  3
}

fn default_grace_period() -> u64 {
  10
}

fn default_health_check_interval() -> u64 {
  60
}

fn default_metrics_addr() -> String {
  "0.0.0.0:9090".to_string()
}

fn default_health_port() -> u16 {
  8080
}
