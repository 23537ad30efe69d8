//! Domain layer - Core routing models.
//!
//! This module contains the pure domain types for the feed router.
//! No I/O dependencies allowed here (hexagonal architecture inner ring).
//! All types are serializable and testable in isolation.

pub mod event;
pub mod routing;

// Re-export core types for convenience
pub use event::{PriceEvent, SourceId, Symbol};
pub use routing::{FailureKind, RoutingState, SourceChanged, SwitchReason};
