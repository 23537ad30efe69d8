//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, validating all parameters,
//! and providing clear error messages for misconfiguration.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::AppConfig;

/// Load and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  validate_config(&config)?;

  info!(
    symbols = config.symbols.len(),
    message_timeout_secs = config.failover.message_timeout_secs,
    grace_period_secs = config.failover.grace_period_secs,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty symbol list and endpoint URLs
/// - Positive timer durations
/// - A failure threshold of at least one
fn validate_config(config: &AppConfig) -> Result<()> {
  anyhow::ensure!(
    !config.symbols.is_empty(),
    "At least one symbol must be configured"
  );
  for (i, symbol) in config.symbols.iter().enumerate() {
    anyhow::ensure!(!symbol.is_empty(), "Symbol {} is empty", i);
  }

  anyhow::ensure!(
    !config.push_feed.ws_url.is_empty(),
    "Push feed WebSocket URL must not be empty"
  );
  anyhow::ensure!(
    !config.poll_feed.base_url.is_empty(),
    "Poll feed base URL must not be empty"
  );
  anyhow::ensure!(
    config.poll_feed.poll_interval_secs > 0,
    "poll_interval_secs must be positive"
  );
  anyhow::ensure!(
    config.poll_feed.request_timeout_secs > 0,
    "request_timeout_secs must be positive"
  );

  let failover = &config.failover;
  anyhow::ensure!(
    failover.auth_timeout_secs > 0,
    "auth_timeout_secs must be positive"
  );
  anyhow::ensure!(
    failover.message_timeout_secs > 0,
    "message_timeout_secs must be positive"
  );
  anyhow::ensure!(
    failover.grace_period_secs > 0,
    "grace_period_secs must be positive"
  );
  anyhow::ensure!(
    failover.health_check_interval_secs > 0,
    "health_check_interval_secs must be positive"
  );
  anyhow::ensure!(
    failover.max_consecutive_failures >= 1,
    "max_consecutive_failures must be at least 1, got {}",
    failover.max_consecutive_failures
  );

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn minimal_toml() -> String {
    r#"
      symbols = ["AAPL", "MSFT"]

      [service]
      name = "feed-router"

      [push_feed]
      ws_url = "wss://push.example.com/ws"

      [poll_feed]
      base_url = "https://poll.example.com"
    "#
    .to_string()
  }

  #[test]
  fn test_load_nonexistent_file() {
    let result = load_config("nonexistent.toml");
    assert!(result.is_err());
  }

  #[test]
  fn test_minimal_config_gets_failover_defaults() {
    let config: AppConfig = toml::from_str(&minimal_toml()).unwrap();
    validate_config(&config).unwrap();

    assert_eq!(config.failover.auth_timeout_secs, 10);
    assert_eq!(config.failover.message_timeout_secs, 30);
    assert_eq!(config.failover.max_consecutive_failures, 3);
    assert_eq!(config.failover.grace_period_secs, 10);
    assert_eq!(config.failover.health_check_interval_secs, 60);
    assert_eq!(config.service.log_level, "info");
  }

  #[test]
  fn test_empty_symbols_rejected() {
    let toml = minimal_toml().replace(r#"["AAPL", "MSFT"]"#, "[]");
    let config: AppConfig = toml::from_str(&toml).unwrap();
    assert!(validate_config(&config).is_err());
  }

  #[test]
  fn test_zero_failure_threshold_rejected() {
    let mut toml = minimal_toml();
    toml.push_str("\n[failover]\nmax_consecutive_failures = 0\n");
    let config: AppConfig = toml::from_str(&toml).unwrap();
    assert!(validate_config(&config).is_err());
  }
}
