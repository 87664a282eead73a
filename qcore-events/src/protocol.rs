//! Wire envelopes (spec.md §6 "WebSocket outbound event envelope",
//! "WebSocket inbound op envelope").
//!
//! The spec's `securityId` is `int|null` on the wire; this workspace's
//! [`qcore_shared::Event`] already carries security ids as ticker strings
//! (see DESIGN.md), so the envelope carries them as strings rather than
//! introducing a separate integer id translation layer.

use qcore_shared::Event;
use serde::{Deserialize, Serialize};

/// A subscription target: either one security, or every security of a kind
/// (wire value `"*"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecurityRef {
    Wildcard(WildcardMarker),
    Id(String),
}

/// Serializes/deserializes as the literal string `"*"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WildcardMarker;

impl Serialize for WildcardMarker {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("*")
    }
}

impl<'de> Deserialize<'de> for WildcardMarker {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == "*" {
            Ok(WildcardMarker)
        } else {
            Err(serde::de::Error::custom("expected the literal \"*\""))
        }
    }
}

impl SecurityRef {
    pub fn wildcard() -> Self {
        SecurityRef::Wildcard(WildcardMarker)
    }

    pub fn id(id: impl Into<String>) -> Self {
        SecurityRef::Id(id.into())
    }
}

/// The event kinds routed through the bus, with the wire-format name each
/// one serializes as (spec.md §6: `"aggregate|quote|trade|alert|filing"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Aggregate,
    Quote,
    Trade,
    Alert,
    Filing,
}

impl EventKind {
    pub fn of(event: &Event) -> Self {
        match event {
            Event::Aggregate { .. } => EventKind::Aggregate,
            Event::Quote { .. } => EventKind::Quote,
            Event::Trade { .. } => EventKind::Trade,
            Event::Alert { .. } => EventKind::Alert,
            Event::GlobalFiling { .. } => EventKind::Filing,
        }
    }
}

/// `{ "op": "subscribe"|"unsubscribe", "kind": ..., "securityId": ... }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum InboundOp {
    Subscribe {
        kind: EventKind,
        #[serde(rename = "securityId")]
        security_id: SecurityRef,
    },
    Unsubscribe {
        kind: EventKind,
        #[serde(rename = "securityId")]
        security_id: SecurityRef,
    },
}

/// `{ "kind", "securityId", "ts", "payload" }` — the envelope actually
/// written to the socket for every dispatched event.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundEnvelope {
    pub kind: EventKind,
    #[serde(rename = "securityId")]
    pub security_id: Option<String>,
    pub ts: i64,
    pub payload: serde_json::Value,
}

impl OutboundEnvelope {
    pub fn from_event(event: &Event) -> Self {
        Self {
            kind: EventKind::of(event),
            security_id: event.security_id().map(str::to_string),
            ts: event.ts().timestamp_millis(),
            payload: serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_round_trips_as_literal_star() {
        let json = serde_json::to_string(&SecurityRef::wildcard()).unwrap();
        assert_eq!(json, "\"*\"");
        let back: SecurityRef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SecurityRef::wildcard());
    }

    #[test]
    fn inbound_subscribe_parses() {
        let raw = r#"{"op":"subscribe","kind":"quote","securityId":"AAPL"}"#;
        let op: InboundOp = serde_json::from_str(raw).unwrap();
        assert_eq!(
            op,
            InboundOp::Subscribe {
                kind: EventKind::Quote,
                security_id: SecurityRef::id("AAPL"),
            }
        );
    }

    #[test]
    fn global_filing_serializes_as_filing_kind() {
        let event = Event::GlobalFiling {
            ticker: "AAPL".to_string(),
            kind: qcore_shared::model::FilingKind::EightK,
            ts: chrono::Utc::now(),
            url: "https://example.com".to_string(),
        };
        let envelope = OutboundEnvelope::from_event(&event);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["kind"], "filing");
        assert_eq!(json["securityId"], serde_json::Value::Null);
    }
}
