//! Upstream Feed Adapters - Dual-Source Market Data Ingestion
//!
//! Provides the two independently-failing upstream clients:
//! - `push_ws`: low-latency WebSocket push feed (primary source)
//! - `poll_http`: higher-latency HTTP quote polling (secondary source)
//!
//! Both normalize into `PriceEvent` and report through a `SignalHandle`.
//! Connection errors stay contained here: the controller only ever sees
//! summary health signals, never raw I/O error types.

pub mod poll_http;
pub mod push_ws;

use std::time::Duration;

use crate::domain::routing::FailureKind;

pub use poll_http::PollFeed;
pub use push_ws::PushFeed;

/// Connection-level feed errors, mapped to the failure taxonomy the
/// controller understands. Per-message parse problems are deliberately
/// absent: those are logged and skipped without health impact.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("authentication rejected by upstream")]
    AuthRejected,

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("no message within {0:?}")]
    Silent(Duration),

    #[error("upstream returned HTTP {0}")]
    HttpStatus(u16),
}

impl FeedError {
    /// The health-signal classification for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthRejected => FailureKind::AuthRejected,
            Self::ConnectionClosed(_) => FailureKind::ConnectionClosed,
            Self::Silent(_) => FailureKind::Timeout,
            Self::HttpStatus(code) => FailureKind::HttpStatus(*code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_errors_map_to_failure_kinds() {
        assert_eq!(FeedError::AuthRejected.kind(), FailureKind::AuthRejected);
        assert_eq!(
            FeedError::Silent(Duration::from_secs(30)).kind(),
            FailureKind::Timeout
        );
        assert_eq!(
            FeedError::HttpStatus(503).kind(),
            FailureKind::HttpStatus(503)
        );
    }
}
