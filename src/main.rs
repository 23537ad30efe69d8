//! Feed Router — Entry Point
//!
//! Routes live-market price events from two independently-failing
//! upstream sources — a low-latency WebSocket push feed and a
//! higher-latency HTTP poll feed — to downstream subscribers, with
//! automatic observable failover and recovery. Runs until
//! SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config.toml + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build metrics registry + broadcast fan-out
//! 4. Build failover controller (owns the routing state machine)
//! 5. Load push feed API token from env (PUSH_FEED_API_TOKEN)
//! 6. Spawn health server (/live, /ready, /state) + /metrics
//! 7. Spawn both feed clients and the controller loop
//! 8. Wait for SIGINT → graceful shutdown (signal→drain→exit)

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info};

mod adapters;
mod config;
mod domain;
mod ports;
mod usecases;

use adapters::fanout::BroadcastFanOut;
use adapters::feeds::{PollFeed, PushFeed};
use adapters::metrics::{HealthServer, MetricsRegistry};
use domain::event::SourceId;
use usecases::FailoverController;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration from config.toml ──────────────
    let config = config::loader::load_config("config.toml")
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(&config.service.log_level)
            }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        symbols = config.symbols.len(),
        message_timeout_secs = config.failover.message_timeout_secs,
        "Starting feed router"
    );

    // ── 3. Shutdown signal channel ──────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);

    // ── 4. Metrics registry + fan-out ───────────────────────
    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics")?);
    let fanout = Arc::new(BroadcastFanOut::with_metrics(Arc::clone(&metrics)));

    // ── 5. Failover controller (owns RoutingState) ──────────
    let controller = FailoverController::new(
        config.failover.clone(),
        Arc::clone(&fanout),
        shutdown_tx.subscribe(),
    );
    let state_rx = controller.state_receiver();

    // ── 6. Feed clients, each bound to its source role ──────
    let push_feed = Arc::new(
        PushFeed::from_env(
            &config.push_feed,
            &config.failover,
            config.symbols.clone(),
            controller.handle(SourceId::Primary),
            Some(Arc::clone(&metrics)),
        )
        .context("Failed to create push feed")?,
    );
    let poll_feed = Arc::new(
        PollFeed::new(
            &config.poll_feed,
            config.symbols.clone(),
            controller.handle(SourceId::Secondary),
            Some(Arc::clone(&metrics)),
        )
        .context("Failed to create poll feed")?,
    );

    // ── 7. Spawn health + metrics servers ───────────────────
    let health_server = HealthServer::new(state_rx, config.metrics.health_port);
    let health_handle = tokio::spawn({
        let shutdown_rx = shutdown_tx.subscribe();
        async move {
            if let Err(e) = health_server.run(shutdown_rx).await {
                error!(error = %e, "Health server failed");
            }
        }
    });

    let metrics_handle = if config.metrics.enabled {
        let bind_address = config.metrics.bind_address.clone();
        let shutdown_rx = shutdown_tx.subscribe();
        let metrics_ref = Arc::clone(&metrics);
        Some(tokio::spawn(async move {
            if let Err(e) = metrics_ref.serve(bind_address, shutdown_rx).await {
                error!(error = %e, "Metrics server failed");
            }
        }))
    } else {
        None
    };

    // ── 8. Spawn feed clients ───────────────────────────────
    let push_handle = tokio::spawn({
        let feed = Arc::clone(&push_feed);
        let shutdown_rx = shutdown_tx.subscribe();
        async move {
            if let Err(e) = feed.run(shutdown_rx).await {
                error!(error = %e, "Push feed task failed");
            }
        }
    });
    let poll_handle = tokio::spawn({
        let feed = Arc::clone(&poll_feed);
        let shutdown_rx = shutdown_tx.subscribe();
        async move {
            if let Err(e) = feed.run(shutdown_rx).await {
                error!(error = %e, "Poll feed task failed");
            }
        }
    });

    // ── 9. Spawn the controller loop ────────────────────────
    let controller_handle = tokio::spawn(async move {
        if let Err(e) = controller.run().await {
            error!(error = %e, "Failover controller failed");
        }
    });

    info!("All tasks spawned — feed router is running");

    // ── 10. Wait for SIGINT ─────────────────────────────────
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
        }
    }

    // ── Graceful shutdown ────────────────────────────────────

    // 1. Signal all tasks to stop
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    // 2. Wait for the controller to drain (up to 10s)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), controller_handle).await;

    // 3. Wait for feeds to close (up to 5s each)
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), push_handle).await;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), poll_handle).await;

    // 4. Stop the probe servers
    health_handle.abort();
    if let Some(handle) = metrics_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}
