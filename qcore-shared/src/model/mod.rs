//! # Shared Event Model (spec.md §3 "Data Model")
//!
//! The wire-and-storage representation for everything that flows through
//! the event bus and the alert engine. One `Event` enum, tagged on
//! `kind` so it serializes the way the teacher's messaging envelopes do
//! (a discriminant field plus a flattened payload), rather than as a
//! nested `{"Aggregate": {...}}` shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single OHLCV bar for one timeframe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    OneMin,
    FiveMin,
    FifteenMin,
    OneHour,
    OneDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilingKind {
    EightK,
    TenK,
    TenQ,
    S1,
    Other,
}

/// Every event the system routes between producers (market data ingestion,
/// the alert engine) and consumers (the event bus, alert strategies).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Aggregate {
        security_id: String,
        timeframe: Timeframe,
        bar: Bar,
        ts: DateTime<Utc>,
    },
    Quote {
        security_id: String,
        bid: f64,
        ask: f64,
        bid_size: u32,
        ask_size: u32,
        ts: DateTime<Utc>,
    },
    Trade {
        security_id: String,
        price: f64,
        size: u32,
        exchange: String,
        ts: DateTime<Utc>,
    },
    Alert {
        user_id: String,
        alert_id: String,
        strategy_id: String,
        security_id: String,
        ts: DateTime<Utc>,
        payload: serde_json::Value,
    },
    GlobalFiling {
        ticker: String,
        kind: FilingKind,
        ts: DateTime<Utc>,
        url: String,
    },
}

impl Event {
    /// The security this event is about, when it has one. `GlobalFiling`
    /// carries a ticker rather than a resolved security id, and `Alert`
    /// is about a user's subscription rather than a security in general,
    /// so both return `None` here and are routed by their own index.
    pub fn security_id(&self) -> Option<&str> {
        match self {
            Event::Aggregate { security_id, .. }
            | Event::Quote { security_id, .. }
            | Event::Trade { security_id, .. } => Some(security_id),
            Event::Alert { .. } | Event::GlobalFiling { .. } => None,
        }
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Event::Alert { user_id, .. } => Some(user_id),
            _ => None,
        }
    }

    pub fn ts(&self) -> DateTime<Utc> {
        match self {
            Event::Aggregate { ts, .. }
            | Event::Quote { ts, .. }
            | Event::Trade { ts, .. }
            | Event::Alert { ts, .. }
            | Event::GlobalFiling { ts, .. } => *ts,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Event::Aggregate { .. } => "aggregate",
            Event::Quote { .. } => "quote",
            Event::Trade { .. } => "trade",
            Event::Alert { .. } => "alert",
            Event::GlobalFiling { .. } => "global_filing",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trade_roundtrips_through_json() {
        let event = Event::Trade {
            security_id: "AAPL".to_string(),
            price: 190.25,
            size: 100,
            exchange: "XNAS".to_string(),
            ts: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
        assert_eq!(back.security_id(), Some("AAPL"));
    }

    #[test]
    fn alert_has_no_security_id_but_has_user_id() {
        let event = Event::Alert {
            user_id: "user-1".to_string(),
            alert_id: "alert-1".to_string(),
            strategy_id: "strategy-1".to_string(),
            security_id: "AAPL".to_string(),
            ts: Utc::now(),
            payload: serde_json::json!({"crossed": 190.0}),
        };
        assert_eq!(event.security_id(), None);
        assert_eq!(event.user_id(), Some("user-1"));
    }
}
