//! Per-strategy ticker universe (spec.md §3 "StrategyUniverse", §4.3 "State
//! and keys").
//!
//! An empty universe means "global": the strategy is evaluated against
//! every updated ticker rather than a fixed subset. The universe is
//! replaced wholesale by its authoritative writer — never partially
//! mutated — so this type only exposes `replace`, not an incremental
//! `add`/`remove`.

use qcore_shared::CacheStore;

use crate::error::AlertError;

fn universe_key(strategy_id: &str) -> String {
    format!("STRAT:{strategy_id}:UNIV")
}

/// Wraps the `STRAT:{id}:UNIV` set for one strategy.
#[derive(Clone)]
pub struct StrategyUniverse {
    cache: CacheStore,
}

impl StrategyUniverse {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Replace the universe wholesale. An empty `tickers` makes the
    /// strategy global.
    pub async fn replace(&self, strategy_id: &str, tickers: &[&str]) -> Result<(), AlertError> {
        let key = universe_key(strategy_id);
        self.cache.del(&[&key]).await?;
        self.cache.s_add(&key, tickers).await?;
        Ok(())
    }

    /// The strategy's universe members, or empty if it is global.
    pub async fn members(&self, strategy_id: &str) -> Result<Vec<String>, AlertError> {
        Ok(self.cache.s_members(&universe_key(strategy_id)).await?)
    }

    /// Number of tickers in the universe. Used to decide whether the
    /// server-side intersection script is worth the extra round trip
    /// (spec.md §4.3 step 1: `large_universe_threshold`).
    pub async fn size(&self, strategy_id: &str) -> Result<u64, AlertError> {
        Ok(self.cache.s_card(&universe_key(strategy_id)).await?)
    }

    /// Drop a strategy's universe entirely, e.g. when the strategy is
    /// deleted by its authoritative writer.
    pub async fn delete(&self, strategy_id: &str) -> Result<(), AlertError> {
        self.cache.del(&[&universe_key(strategy_id)]).await?;
        Ok(())
    }
}

pub fn key(strategy_id: &str) -> String {
    universe_key(strategy_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_follows_stable_pattern() {
        assert_eq!(key("7"), "STRAT:7:UNIV");
    }
}
