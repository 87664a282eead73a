//! The alert-predicate interface (spec.md §6 "Alert-predicate interface")
//! and the `StrategyRegistry` that maps a `strategyId` to its predicate and
//! bucket size (SPEC_FULL.md §4 "Alert engine strategy registration").
//!
//! Predicate code is supplied by the embedding application, not discovered
//! from the store — the engine itself stays free of domain-specific alert
//! logic, per spec.md's framing of the predicate as an external
//! collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

/// A strategy's triggering logic. Must be effectively stateless with
/// respect to the engine: the engine does not retry a failed evaluation
/// and does not interpret anything beyond `(triggered, payload)`.
#[async_trait]
pub trait AlertPredicate: Send + Sync {
    async fn evaluate(
        &self,
        strategy_id: &str,
        ticker: &str,
        now_ms: i64,
    ) -> Result<(bool, serde_json::Value), String>;
}

#[async_trait]
impl<F, Fut> AlertPredicate for F
where
    F: Fn(&str, &str, i64) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(bool, serde_json::Value), String>> + Send,
{
    async fn evaluate(
        &self,
        strategy_id: &str,
        ticker: &str,
        now_ms: i64,
    ) -> Result<(bool, serde_json::Value), String> {
        (self)(strategy_id, ticker, now_ms).await
    }
}

/// One registered strategy's tuning: the user it alerts, its bucket
/// window, and its predicate.
///
/// spec.md's data model has no separate "alert owner" entity — a
/// `strategyId` *is* a user-defined alert (§1 "fans market-tick updates
/// out to a large set of user-defined alerts"), and its `Alert` event
/// (§3, §6) carries a mandatory `userId`. The engine has no other source
/// for that id, so the strategy registration is where it must be supplied.
pub struct StrategyDefinition {
    pub user_id: String,
    pub bucket_ms: i64,
    pub predicate: Arc<dyn AlertPredicate>,
}

impl std::fmt::Debug for StrategyDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyDefinition")
            .field("user_id", &self.user_id)
            .field("bucket_ms", &self.bucket_ms)
            .finish()
    }
}

/// Strategies known to the running engine, keyed by `strategyId`.
#[derive(Debug, Clone, Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<StrategyDefinition>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        strategy_id: impl Into<String>,
        user_id: impl Into<String>,
        bucket_ms: i64,
        predicate: Arc<dyn AlertPredicate>,
    ) {
        self.strategies.insert(
            strategy_id.into(),
            Arc::new(StrategyDefinition {
                user_id: user_id.into(),
                bucket_ms,
                predicate,
            }),
        );
    }

    pub fn get(&self, strategy_id: &str) -> Option<Arc<StrategyDefinition>> {
        self.strategies.get(strategy_id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn closure_predicate_evaluates() {
        let mut registry = StrategyRegistry::new();
        registry.register(
            "7",
            "user-1",
            60_000,
            Arc::new(|_strategy: &str, ticker: &str, _now: i64| {
                let ticker = ticker.to_string();
                async move { Ok((ticker == "AAPL", serde_json::json!({"ticker": ticker}))) }
            }),
        );

        let def = registry.get("7").expect("registered");
        assert_eq!(def.user_id, "user-1");
        let (triggered, _payload) = def.predicate.evaluate("7", "AAPL", 0).await.unwrap();
        assert!(triggered);
        let (triggered, _payload) = def.predicate.evaluate("7", "MSFT", 0).await.unwrap();
        assert!(!triggered);
    }

    #[test]
    fn unknown_strategy_is_absent() {
        let registry = StrategyRegistry::new();
        assert!(registry.get("missing").is_none());
    }
}
