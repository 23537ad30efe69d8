//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the contracts between the failover controller and the outside
//! world. Feed adapters push signals in through `SignalHandle`; the
//! controller pushes the decided stream out through `FanOut`.
//!
//! Port categories:
//! - `feed`: inbound signal contract the feed clients report through
//! - `fanout`: outbound delivery of the authoritative stream

pub mod fanout;
pub mod feed;
