//! Use Cases Layer - Routing Business Logic
//!
//! Orchestrates the failover state machine with the port interfaces.
//! All cross-source decisions live in `routing_engine`; everything else
//! is bookkeeping or plumbing.
//!
//! Use cases:
//! - `RoutingEngine`: pure, deterministic failover state machine
//! - `FailoverController`: async driver serializing all signals
//! - `SourceHealth`: per-source failure/liveness bookkeeping

pub mod failover_controller;
pub mod health_monitor;
pub mod routing_engine;

pub use failover_controller::FailoverController;
pub use health_monitor::SourceHealth;
pub use routing_engine::{Action, RoutingEngine};
