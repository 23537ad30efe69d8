//! Health Check Server - Liveness and Readiness Probes
//!
//! Exposes /live, /ready, and /state endpoints via axum 0.7 for Docker
//! health checks and monitoring. Readiness tracks the routing state:
//! the router serves data in every state except `BothUnavailable`, so
//! that is the only state that flips the probe to 503.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tokio::sync::{broadcast, watch};
use tracing::{info, instrument};

use crate::domain::routing::RoutingState;

/// Axum-based health check HTTP server.
///
/// Observes the controller's routing state through a watch channel;
/// it never touches controller internals.
pub struct HealthServer {
    /// Live view of the routing state.
    state_rx: watch::Receiver<RoutingState>,
    /// Bind port (default 8080 from config).
    port: u16,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(state_rx: watch::Receiver<RoutingState>, port: u16) -> Self {
        Self { state_rx, port }
    }

    /// Start the health check server in the background.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/state", get(Self::state))
            .with_state(self.state_rx.clone());

        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        info!(address = %addr, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 503 only while neither source is usable.
    async fn readiness(
        State(state_rx): State<watch::Receiver<RoutingState>>,
    ) -> impl IntoResponse {
        match *state_rx.borrow() {
            RoutingState::BothUnavailable => (StatusCode::SERVICE_UNAVAILABLE, "NOT READY"),
            _ => (StatusCode::OK, "READY"),
        }
    }

    /// Current routing state for operators and dashboards.
    async fn state(
        State(state_rx): State<watch::Receiver<RoutingState>>,
    ) -> impl IntoResponse {
        let state = *state_rx.borrow();
        Json(serde_json::json!({ "state": state }))
    }
}
