//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port contracts with concrete external dependencies
//! (WebSockets, HTTP clients, broadcast channels, Prometheus). Each
//! sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `feeds`: upstream market data clients (push WebSocket, poll HTTP)
//! - `fanout`: broadcast delivery of the authoritative stream
//! - `metrics`: Prometheus metrics export and health checks

pub mod fanout;
pub mod feeds;
pub mod metrics;
