//! The ticker-update index (spec.md §4.3 "State and keys", "Data-ingestion
//! path", "Garbage collection").

use chrono::Utc;
use qcore_shared::cache::ScoredMember;
use qcore_shared::CacheStore;

use crate::error::AlertError;

const TICK_UPD_KEY: &str = "TICK:UPD";

/// Wraps the `TICK:UPD` sorted set: ticker → last-update millis.
#[derive(Clone)]
pub struct TickerIndex {
    cache: CacheStore,
}

impl TickerIndex {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Record that `ticker` changed at `ts_millis`. Linearizable per
    /// ticker: `zAdd CH` makes this last-writer-wins by score.
    pub async fn mark_updated(&self, ticker: &str, ts_millis: i64) -> Result<bool, AlertError> {
        metrics::counter!("qcore_alerts_ticker_updates_total").increment(1);
        Ok(self
            .cache
            .z_add_ch(TICK_UPD_KEY, ts_millis as f64, ticker)
            .await?)
    }

    /// Tickers updated since `since_millis`, inclusive, unbounded above.
    pub async fn updated_since(&self, since_millis: i64) -> Result<Vec<ScoredMember>, AlertError> {
        Ok(self
            .cache
            .z_range_by_score(TICK_UPD_KEY, since_millis as f64, f64::INFINITY)
            .await?)
    }

    pub async fn len(&self) -> Result<u64, AlertError> {
        Ok(self.cache.z_card(TICK_UPD_KEY).await?)
    }

    /// Prune entries older than `max_age_days`. `max_age_days` must be at
    /// least as large as the widest strategy bucket window or a strategy
    /// could lose updates it hasn't scanned yet.
    pub async fn garbage_collect(&self, max_age_days: i64) -> Result<u64, AlertError> {
        let cutoff = Utc::now().timestamp_millis() - max_age_days * 86_400_000;
        metrics::counter!("qcore_alerts_cleanup_operations_total").increment(1);
        Ok(self.cache.z_rem_range_by_score(TICK_UPD_KEY, 0.0, cutoff as f64).await?)
    }
}

pub const fn key() -> &'static str {
    TICK_UPD_KEY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_stable() {
        assert_eq!(key(), "TICK:UPD");
    }
}
