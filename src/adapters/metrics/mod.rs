//! Metrics and Monitoring Adapters
//!
//! Provides Prometheus metrics export and health check endpoints
//! (/live, /ready, /state) via axum 0.7. Readiness follows the routing
//! state: the service reports not-ready only while both upstream
//! sources are unavailable.

pub mod health;
pub mod prometheus;

pub use health::HealthServer;
pub use prometheus::MetricsRegistry;
