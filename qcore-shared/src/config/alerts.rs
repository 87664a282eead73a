use serde::{Deserialize, Serialize};

/// Alert Evaluation Engine settings (spec.md §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Minimum wall-clock spacing between evaluation ticks, default 1000ms.
    pub tick_ms: u64,
    /// Universe size at or above which the server-side intersection script
    /// is used instead of an in-memory intersection.
    pub large_universe_threshold: usize,
    /// Stale `TICK:UPD` entries older than this many days are pruned.
    /// Must be >= the longest strategy bucket window.
    pub ticker_index_max_age_days: i64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1_000,
            large_universe_threshold: 100,
            ticker_index_max_age_days: 7,
        }
    }
}
