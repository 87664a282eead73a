//! Default scheduled jobs.
//!
//! spec.md's source process runs a daily teardown/restart cycle for its
//! market-stream/alert-loop jobs (§9 "Open questions from the source"),
//! but that cycle is explicitly not part of the core contract and this
//! service runs the alert loop continuously instead (started directly in
//! [`crate::bootstrap`], not through the scheduler). The one job worth
//! keeping is routine maintenance: pruning `TICK:UPD` (spec.md §4.3
//! "Garbage collection").

use std::sync::Arc;

use qcore_alerts::TickerIndex;
use qcore_scheduler::JobSpec;
use qcore_shared::config::AlertsConfig;

/// Runs once daily at 04:00 local time, well outside U.S. market hours.
pub fn ticker_index_gc(ticker_index: TickerIndex, config: &AlertsConfig) -> JobSpec {
    let max_age_days = config.ticker_index_max_age_days;
    JobSpec::direct(
        "TickerIndexGarbageCollect",
        vec![(4, 0)],
        false,
        false,
        Arc::new(move || {
            let ticker_index = ticker_index.clone();
            async move {
                let removed = ticker_index
                    .garbage_collect(max_age_days)
                    .await
                    .map_err(|e| e.to_string())?;
                tracing::info!(removed, "pruned stale ticker-update entries");
                Ok(())
            }
        }),
    )
}
