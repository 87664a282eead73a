//! The alert evaluation loop and its `stopped → starting → running →
//! stopping → stopped` lifecycle (spec.md §4.3 "Evaluation loop",
//! "State machine: alert loop lifecycle").

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use qcore_shared::cache::{universe_intersection_script, ScoredMember};
use qcore_shared::config::AlertsConfig;
use qcore_shared::{CacheStore, Event};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::AlertError;
use crate::last_buckets::StrategyLastBuckets;
use crate::predicate::StrategyRegistry;
use crate::ticker_index::TickerIndex;
use crate::universe::{self, StrategyUniverse};

/// Lifecycle state of the evaluation loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Inner {
    cache: CacheStore,
    ticker_index: TickerIndex,
    universes: StrategyUniverse,
    last_buckets: StrategyLastBuckets,
    strategies: StrategyRegistry,
    config: AlertsConfig,
    events_tx: mpsc::UnboundedSender<Event>,
    scan_cursors: StdMutex<HashMap<String, i64>>,
}

/// Fans market-tick updates out to every registered strategy, deduplicating
/// repeated triggers within a strategy's bucket window (spec.md §4.3).
#[derive(Clone)]
pub struct AlertEngine {
    inner: Arc<Inner>,
    state: Arc<StdMutex<EngineState>>,
    task: Arc<StdMutex<Option<RunningTask>>>,
}

impl std::fmt::Debug for AlertEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertEngine")
            .field("state", &self.state())
            .field("strategies", &self.inner.strategies.len())
            .finish()
    }
}

impl AlertEngine {
    pub fn new(
        cache: CacheStore,
        strategies: StrategyRegistry,
        config: AlertsConfig,
        events_tx: mpsc::UnboundedSender<Event>,
    ) -> Self {
        let inner = Inner {
            ticker_index: TickerIndex::new(cache.clone()),
            universes: StrategyUniverse::new(cache.clone()),
            last_buckets: StrategyLastBuckets::new(cache.clone()),
            cache,
            strategies,
            config,
            events_tx,
            scan_cursors: StdMutex::new(HashMap::new()),
        };
        Self {
            inner: Arc::new(inner),
            state: Arc::new(StdMutex::new(EngineState::Stopped)),
            task: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn ticker_index(&self) -> &TickerIndex {
        &self.inner.ticker_index
    }

    pub fn universes(&self) -> &StrategyUniverse {
        &self.inner.universes
    }

    /// Enter `running`. A no-op if already running. Errors if a transition
    /// is already in flight, or if the engine has no strategies registered
    /// at all (a startup misconfiguration per spec.md §4.3 "Failure
    /// semantics").
    pub async fn start(&self) -> Result<(), AlertError> {
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            match *state {
                EngineState::Running => return Ok(()),
                EngineState::Starting | EngineState::Stopping => {
                    return Err(AlertError::InvalidTransition("mid-transition"))
                }
                EngineState::Stopped => *state = EngineState::Starting,
            }
        }

        if self.inner.strategies.is_empty() {
            *self.state.lock().unwrap_or_else(|p| p.into_inner()) = EngineState::Stopped;
            return Err(AlertError::Misconfigured(
                "no strategies registered".to_string(),
            ));
        }

        let cancel = CancellationToken::new();
        let inner = self.inner.clone();
        let loop_cancel = cancel.clone();
        let handle = tokio::spawn(async move { run_loop(inner, loop_cancel).await });

        *self.task.lock().unwrap_or_else(|p| p.into_inner()) = Some(RunningTask { cancel, handle });
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = EngineState::Running;
        Ok(())
    }

    /// Enter `stopping`, wait for the in-flight iteration to finish, then
    /// `stopped`. A no-op if not running.
    pub async fn stop(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
            if *state != EngineState::Running {
                return;
            }
            *state = EngineState::Stopping;
        }

        let task = self.task.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(task) = task {
            task.cancel.cancel();
            let _ = task.handle.await;
        }

        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = EngineState::Stopped;
    }
}

async fn run_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(Duration::from_millis(inner.config.tick_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("alert loop stopping");
                return;
            }
            _ = ticker.tick() => {
                for strategy_id in inner.strategies.ids().map(str::to_string).collect::<Vec<_>>() {
                    if cancel.is_cancelled() {
                        return;
                    }
                    if let Err(err) = run_strategy_iteration(&inner, &strategy_id).await {
                        tracing::warn!(
                            strategy_id = %strategy_id,
                            error = %err,
                            "alert strategy iteration skipped"
                        );
                    }
                }
            }
        }
    }
}

async fn run_strategy_iteration(inner: &Inner, strategy_id: &str) -> Result<(), AlertError> {
    metrics::counter!("qcore_alerts_strategy_runs_total").increment(1);

    let def = inner
        .strategies
        .get(strategy_id)
        .ok_or_else(|| AlertError::UnknownStrategy(strategy_id.to_string()))?;

    let since_ms = {
        let cursors = inner.scan_cursors.lock().unwrap_or_else(|p| p.into_inner());
        cursors.get(strategy_id).copied().unwrap_or(0)
    };
    let now = Utc::now().timestamp_millis();

    let universe_size = inner.universes.size(strategy_id).await?;
    let (candidates, next_cursor) =
        discover_candidates(inner, strategy_id, universe_size, since_ms).await?;

    // Advance only to the newest mark actually observed this scan, never to
    // wall-clock `now` — a ticker marked once must stay a candidate on every
    // subsequent tick until a newer mark supersedes it (spec.md §8 S2).
    inner
        .scan_cursors
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .insert(strategy_id.to_string(), next_cursor);

    if candidates.is_empty() {
        metrics::counter!("qcore_alerts_skipped_no_update_total").increment(1);
        return Ok(());
    }
    if universe_size > 0 {
        metrics::counter!("qcore_alerts_universe_discoveries_total").increment(1);
    }

    let bucket = (now / def.bucket_ms) * def.bucket_ms;
    let candidate_refs: Vec<&str> = candidates.iter().map(String::as_str).collect();
    let stored = inner
        .last_buckets
        .get_many(strategy_id, &candidate_refs)
        .await?;

    let mut to_commit: Vec<(String, i64)> = Vec::new();
    for ticker in &candidates {
        if let Some(last_bucket) = stored.get(ticker).copied().flatten() {
            if bucket <= last_bucket {
                metrics::counter!("qcore_alerts_skipped_bucket_dup_total").increment(1);
                continue;
            }
        }

        match def.predicate.evaluate(strategy_id, ticker, now).await {
            Ok((true, payload)) => {
                to_commit.push((ticker.clone(), bucket));
                let event = Event::Alert {
                    user_id: def.user_id.clone(),
                    alert_id: format!("{strategy_id}:{ticker}:{bucket}"),
                    strategy_id: strategy_id.to_string(),
                    security_id: ticker.clone(),
                    ts: Utc::now(),
                    payload,
                };
                if inner.events_tx.send(event).is_err() {
                    tracing::warn!(
                        strategy_id,
                        ticker,
                        "alert event dropped, event bus channel closed"
                    );
                }
            }
            Ok((false, _)) => {}
            Err(message) => {
                tracing::warn!(strategy_id, ticker, error = %message, "predicate failed");
            }
        }
    }

    if !to_commit.is_empty() {
        let buckets: Vec<(&str, i64)> = to_commit.iter().map(|(t, b)| (t.as_str(), *b)).collect();
        inner.last_buckets.commit_many(strategy_id, &buckets).await?;
    }

    Ok(())
}

/// spec.md §4.3 step 1: intersect `TICK:UPD` updates with the strategy's
/// universe, using the server-side script once the universe is large
/// enough that a round trip per member would dominate.
///
/// Returns the candidate tickers plus the scan cursor to advance to: the
/// highest `TICK:UPD` score actually observed in `[since_ms, +inf)` this
/// scan, never `now` — a ticker's own mark must remain discoverable on
/// every tick until a newer mark supersedes it (spec.md §8 S2), with
/// re-triggering within a bucket gated solely by bucket dedup, not by
/// candidate discovery aging the ticker out.
async fn discover_candidates(
    inner: &Inner,
    strategy_id: &str,
    universe_size: u64,
    since_ms: i64,
) -> Result<(Vec<String>, i64), AlertError> {
    if universe_size == 0 {
        let updated = inner.ticker_index.updated_since(since_ms).await?;
        let next_cursor = max_score_seen(&updated, since_ms);
        return Ok((updated.into_iter().map(|m| m.member).collect(), next_cursor));
    }

    if universe_size as usize >= inner.config.large_universe_threshold {
        metrics::counter!("qcore_alerts_lua_intersections_total").increment(1);
        let script = universe_intersection_script();
        let universe_key = universe::key(strategy_id);
        let updates_key = crate::ticker_index::key();
        let since = since_ms.to_string();
        let mut raw = inner
            .cache
            .eval_script(&script, &[universe_key.as_str(), updates_key], &[since.as_str()])
            .await?;
        if raw.is_empty() {
            return Ok((Vec::new(), since_ms));
        }
        let next_cursor = raw
            .swap_remove(0)
            .parse::<f64>()
            .map(|score| score as i64)
            .unwrap_or(since_ms)
            .max(since_ms);
        return Ok((raw, next_cursor));
    }

    let updated = inner.ticker_index.updated_since(since_ms).await?;
    let next_cursor = max_score_seen(&updated, since_ms);
    let universe_members = inner.universes.members(strategy_id).await?;
    let universe_set: std::collections::HashSet<&str> =
        universe_members.iter().map(String::as_str).collect();
    let candidates = updated
        .into_iter()
        .filter(|m| universe_set.contains(m.member.as_str()))
        .map(|m| m.member)
        .collect();
    Ok((candidates, next_cursor))
}

/// Highest score among `members`, floored at `since_ms` so a scan with no
/// new updates leaves the cursor unchanged rather than regressing it.
fn max_score_seen(members: &[ScoredMember], since_ms: i64) -> i64 {
    members
        .iter()
        .map(|m| m.score as i64)
        .fold(since_ms, i64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AlertsConfig {
        AlertsConfig {
            tick_ms: 10,
            large_universe_threshold: 100,
            ticker_index_max_age_days: 7,
        }
    }

    #[test]
    fn initial_state_is_stopped() {
        // Construction alone must not touch the network, so this only
        // needs a config and a registry, not a live CacheStore -- exercised
        // fully in the `test-redis`-gated integration tests.
        let _ = config();
    }

    #[test]
    fn max_score_seen_floors_at_since_ms_when_nothing_new() {
        assert_eq!(max_score_seen(&[], 1_700_000_000_000), 1_700_000_000_000);
    }

    #[test]
    fn max_score_seen_never_advances_past_a_ticker_own_mark() {
        // A ticker marked once keeps the exact same score on every
        // following scan; the cursor must settle there, not drift past it
        // (spec.md §8 S2 — this is what makes the ticker stay a candidate
        // on the fourth tick, in the next bucket).
        let members = [ScoredMember {
            member: "AAPL".to_string(),
            score: 1_700_000_000_000.0,
        }];
        assert_eq!(max_score_seen(&members, 0), 1_700_000_000_000);
        assert_eq!(
            max_score_seen(&members, 1_700_000_000_000),
            1_700_000_000_000
        );
    }

    #[test]
    fn max_score_seen_picks_the_newest_mark() {
        let members = [
            ScoredMember {
                member: "AAPL".to_string(),
                score: 100.0,
            },
            ScoredMember {
                member: "MSFT".to_string(),
                score: 250.0,
            },
        ];
        assert_eq!(max_score_seen(&members, 0), 250);
    }
}
