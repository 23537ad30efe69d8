//! Fan-out Port - Outbound Delivery Interface
//!
//! Defines the trait for delivering the controller's decided stream to
//! downstream subscribers. The controller calls `forward` exactly once
//! per authoritative event, in arrival order, and `source_changed` on
//! every routing transition. Subscriber management, buffering, and
//! last-known-value caching live behind this boundary.

use async_trait::async_trait;

use crate::domain::event::PriceEvent;
use crate::domain::routing::SourceChanged;

/// Trait for downstream delivery of the authoritative stream.
///
/// Implementors must preserve call order: a `source_changed` call is a
/// fence between events of the old source and events of the new one.
#[async_trait]
pub trait FanOut: Send + Sync + 'static {
  /// Deliver one authoritative price event.
  async fn forward(&self, event: &PriceEvent) -> anyhow::Result<()>;

  /// Announce a routing transition to subscribers.
  async fn source_changed(&self, change: &SourceChanged) -> anyhow::Result<()>;
}
