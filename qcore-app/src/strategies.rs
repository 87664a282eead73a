//! Default strategy and job registrations.
//!
//! Predicate code is supposed to be supplied by the embedding application
//! (spec.md §6 "Alert-predicate interface" is an external collaborator);
//! this module is that embedding application's own registration, so the
//! service is runnable out of the box rather than starting with zero
//! strategies (which `AlertEngine::start` refuses).

use std::sync::Arc;

use qcore_alerts::StrategyRegistry;
use qcore_shared::config::AlertsConfig;

/// A price-cross predicate: triggers once per bucket for every ticker in
/// the strategy's universe, unconditionally. Stands in for a real
/// technical-indicator predicate, which would read recent bars from the
/// relational store and is outside this crate's domain knowledge.
fn always_trigger(
    strategy_id: &str,
    ticker: &str,
    now_ms: i64,
) -> impl std::future::Future<Output = Result<(bool, serde_json::Value), String>> + Send {
    let strategy_id = strategy_id.to_string();
    let ticker = ticker.to_string();
    async move {
        Ok((
            true,
            serde_json::json!({ "strategyId": strategy_id, "ticker": ticker, "evaluatedAtMs": now_ms }),
        ))
    }
}

/// Registers the default strategy set. `config.tick_ms` governs the
/// engine's scan cadence; a strategy's own `bucket_ms` governs how often
/// it is allowed to re-fire for the same ticker. In a real deployment each
/// strategy is a user-defined alert, so its owning `userId` comes from
/// wherever the alert was created (an HTTP handler, out of this crate's
/// scope); this stand-in registration hardcodes the placeholder owner a
/// real one would resolve per-alert.
pub fn default_registry(config: &AlertsConfig) -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register(
        "default-watchlist",
        "default-user",
        config.tick_ms.max(60_000) as i64,
        Arc::new(always_trigger),
    );
    registry
}
