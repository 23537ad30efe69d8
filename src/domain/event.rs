//! Price event types.
//!
//! `PriceEvent` is the common shape both upstream feeds normalize into
//! before reaching the router. Events are immutable once created and
//! tagged with the source that produced them.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lightweight ticker symbol used at the ports boundary.
pub type Symbol = String;

/// Role of an upstream data source.
///
/// `Primary` is the low-latency push (WebSocket) feed, preferred when
/// healthy. `Secondary` is the higher-latency poll (HTTP) feed used as
/// fallback. The router is source-agnostic beyond this role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Primary,
    Secondary,
}

impl SourceId {
    /// The other role. Useful when reasoning about the inactive source.
    pub fn other(self) -> Self {
        match self {
            Self::Primary => Self::Secondary,
            Self::Secondary => Self::Primary,
        }
    }
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Secondary => write!(f, "secondary"),
        }
    }
}

/// A normalized market price update from either upstream feed.
///
/// Consumed exactly once by the failover controller, which either
/// forwards it unmodified (active source) or discards it after
/// updating health bookkeeping (inactive source).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEvent {
    /// Ticker symbol (e.g., "AAPL", "BTC-USD").
    pub symbol: Symbol,
    /// Last traded / quoted price.
    pub price: Decimal,
    /// Upstream timestamp in Unix milliseconds.
    pub timestamp_ms: u64,
    /// Which feed produced this event.
    pub source: SourceId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn source_id_other_flips_role() {
        assert_eq!(SourceId::Primary.other(), SourceId::Secondary);
        assert_eq!(SourceId::Secondary.other(), SourceId::Primary);
    }

    #[test]
    fn source_id_display_is_lowercase() {
        assert_eq!(SourceId::Primary.to_string(), "primary");
        assert_eq!(SourceId::Secondary.to_string(), "secondary");
    }

    #[test]
    fn price_event_round_trips_through_json() {
        let event = PriceEvent {
            symbol: "AAPL".to_string(),
            price: dec!(187.43),
            timestamp_ms: 1_700_000_000_000,
            source: SourceId::Primary,
        };

        let json = serde_json::to_string(&event).unwrap();
        let back: PriceEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert!(json.contains("\"primary\""));
    }
}
