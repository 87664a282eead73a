//! Per-strategy, per-ticker last-triggered bucket (spec.md §3
//! "StrategyLastBuckets", §4.3 step 2 "Per-ticker bucket dedup").
//!
//! A new trigger is recorded only if the current bucket strictly exceeds
//! the stored one, so a strategy whose predicate returns `true` on every
//! tick still emits at most one `Alert` per `(strategy, ticker)` bucket
//! window.

use std::collections::HashMap;

use qcore_shared::CacheStore;

use crate::error::AlertError;

fn last_key(strategy_id: &str) -> String {
    format!("STRAT:{strategy_id}:LAST")
}

/// Wraps the `STRAT:{id}:LAST` hash for one strategy.
#[derive(Clone)]
pub struct StrategyLastBuckets {
    cache: CacheStore,
}

impl StrategyLastBuckets {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Fetch the last-triggered bucket for each of `tickers` in one batched
    /// `hmGet` round trip. Absent entries map to `None`.
    pub async fn get_many(
        &self,
        strategy_id: &str,
        tickers: &[&str],
    ) -> Result<HashMap<String, Option<i64>>, AlertError> {
        if tickers.is_empty() {
            return Ok(HashMap::new());
        }
        let values = self.cache.hm_get(&last_key(strategy_id), tickers).await?;
        Ok(tickers
            .iter()
            .map(|t| t.to_string())
            .zip(values.into_iter().map(|v| v.and_then(|s| s.parse().ok())))
            .collect())
    }

    /// Batch-write the newly-triggered bucket for each `(ticker, bucket_ms)`
    /// pair in one `hmSet` round trip (spec.md §4.3 step 4: "Commit &
    /// emit").
    pub async fn commit_many(
        &self,
        strategy_id: &str,
        buckets: &[(&str, i64)],
    ) -> Result<(), AlertError> {
        if buckets.is_empty() {
            return Ok(());
        }
        let encoded: Vec<String> = buckets.iter().map(|(_, b)| b.to_string()).collect();
        let fields: Vec<(&str, &str)> = buckets
            .iter()
            .zip(encoded.iter())
            .map(|((ticker, _), encoded)| (*ticker, encoded.as_str()))
            .collect();
        self.cache.hm_set(&last_key(strategy_id), &fields).await?;
        Ok(())
    }

    /// Drop a strategy's bucket hash entirely, e.g. when the strategy is
    /// deleted by its authoritative writer (spec.md §4.3 "Garbage
    /// collection").
    pub async fn delete(&self, strategy_id: &str) -> Result<(), AlertError> {
        self.cache.del(&[&last_key(strategy_id)]).await?;
        Ok(())
    }
}

pub fn key(strategy_id: &str) -> String {
    last_key(strategy_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_follows_stable_pattern() {
        assert_eq!(key("7"), "STRAT:7:LAST");
    }
}
