//! # Cache Store
//!
//! The durable key-value side of the PSS (spec.md §4.1, §6 "PSS schema
//! contract"). Backed by a Redis-compatible server via a single
//! auto-reconnecting [`redis::aio::ConnectionManager`] shared across every
//! component, matching the teacher's `Arc`-wrapped provider pattern for its
//! messaging client.
//!
//! Every method times its Redis round trip against
//! [`RedisConfig::op_timeout_ms`] and maps a timeout to
//! [`PssError::TransientExhausted`] rather than letting it hang — cache
//! reads sit on the hot path of the alert engine's tick loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::config::RedisConfig;
use crate::error::{PssError, PssResult};
use crate::resilience::{CircuitBreaker, CircuitBreakerBehavior, CircuitBreakerConfig};

/// A single `(member, score)` pair, as returned by a sorted-set range query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredMember {
    pub member: String,
    pub score: f64,
}

/// Async wrapper over the cache operations the rest of the workspace needs.
#[derive(Clone)]
pub struct CacheStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("op_timeout", &self.op_timeout)
            .field("breaker", &self.breaker.state())
            .finish()
    }
}

impl CacheStore {
    /// Connect to the cache described by `config`.
    pub async fn connect(config: &RedisConfig) -> PssResult<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            op_timeout: Duration::from_millis(config.op_timeout_ms),
            breaker: Arc::new(CircuitBreaker::new("redis", CircuitBreakerConfig::default())),
        })
    }

    /// Whether the breaker protecting this cache considers it healthy.
    pub fn is_healthy(&self) -> bool {
        self.breaker.is_healthy()
    }

    /// Run `fut` if the circuit breaker allows it, timing and recording
    /// the outcome so a persistently-failing Redis fails fast instead of
    /// queuing up every caller's timeout (SPEC_FULL.md §3.4 "Resilience").
    async fn with_timeout<F, T>(&self, fut: F) -> PssResult<T>
    where
        F: std::future::Future<Output = redis::RedisResult<T>>,
    {
        if !self.breaker.should_allow() {
            return Err(PssError::CircuitOpen {
                component: "redis".to_string(),
            });
        }

        let started = Instant::now();
        let outcome = tokio::time::timeout(self.op_timeout, fut).await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Ok(value)) => {
                self.breaker.record_success(elapsed);
                Ok(value)
            }
            Ok(Err(e)) => {
                self.breaker.record_failure(elapsed);
                Err(PssError::Cache(e))
            }
            Err(_) => {
                self.breaker.record_failure(elapsed);
                Err(PssError::TransientExhausted(
                    "cache operation timed out".to_string(),
                ))
            }
        }
    }

    // ---- strings ------------------------------------------------------

    pub async fn get_string(&self, key: &str) -> PssResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.get(key)).await
    }

    pub async fn set_string(&self, key: &str, value: &str, ttl: Option<Duration>) -> PssResult<()> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => {
                self.with_timeout(conn.set_ex(key, value, ttl.as_secs().max(1)))
                    .await
            }
            None => self.with_timeout(conn.set(key, value)).await,
        }
    }

    pub async fn del(&self, keys: &[&str]) -> PssResult<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        self.with_timeout(conn.del(keys)).await
    }

    // ---- sorted sets ----------------------------------------------------

    /// `ZADD key CH score member` — returns `true` if the score changed
    /// (added or updated), `false` if the member already had that score.
    pub async fn z_add_ch(&self, key: &str, score: f64, member: &str) -> PssResult<bool> {
        let mut conn = self.conn.clone();
        let changed: i64 = self
            .with_timeout(
                redis::cmd("ZADD")
                    .arg(key)
                    .arg("CH")
                    .arg(score)
                    .arg(member)
                    .query_async(&mut conn),
            )
            .await?;
        Ok(changed > 0)
    }

    pub async fn z_score(&self, key: &str, member: &str) -> PssResult<Option<f64>> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.zscore(key, member)).await
    }

    pub async fn z_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> PssResult<Vec<ScoredMember>> {
        let mut conn = self.conn.clone();
        let raw: Vec<(String, f64)> = self
            .with_timeout(conn.zrangebyscore_withscores(key, min, max))
            .await?;
        Ok(raw
            .into_iter()
            .map(|(member, score)| ScoredMember { member, score })
            .collect())
    }

    pub async fn z_rem_range_by_score(&self, key: &str, min: f64, max: f64) -> PssResult<u64> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.zrembyscore(key, min, max)).await
    }

    pub async fn z_card(&self, key: &str) -> PssResult<u64> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.zcard(key)).await
    }

    // ---- sets -----------------------------------------------------------

    pub async fn s_add(&self, key: &str, members: &[&str]) -> PssResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        self.with_timeout(conn.sadd(key, members)).await
    }

    pub async fn s_card(&self, key: &str) -> PssResult<u64> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.scard(key)).await
    }

    pub async fn s_members(&self, key: &str) -> PssResult<Vec<String>> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.smembers(key)).await
    }

    // ---- hashes -----------------------------------------------------------

    pub async fn hm_set(&self, key: &str, fields: &[(&str, &str)]) -> PssResult<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        self.with_timeout(conn.hset_multiple(key, fields)).await
    }

    pub async fn hm_get(&self, key: &str, fields: &[&str]) -> PssResult<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        self.with_timeout(conn.hget(key, fields)).await
    }

    // ---- lists ------------------------------------------------------------

    pub async fn l_push(&self, key: &str, value: &str) -> PssResult<u64> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.rpush(key, value)).await
    }

    /// Blocking pop with `timeout` (0 = block indefinitely). Returns `None`
    /// on timeout.
    pub async fn r_pop_blocking(&self, key: &str, timeout: Duration) -> PssResult<Option<String>> {
        let mut conn = self.conn.clone();
        let result: Option<(String, String)> = self
            .with_timeout(conn.blpop(key, timeout.as_secs_f64()))
            .await?;
        Ok(result.map(|(_key, value)| value))
    }

    pub async fn l_len(&self, key: &str) -> PssResult<u64> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.llen(key)).await
    }

    // ---- scripts ------------------------------------------------------------

    /// Evaluate a Lua script server-side, atomically, in one round trip.
    ///
    /// Used for the alert engine's universe/ticker-update intersection
    /// (spec.md §4.3 "Server-side intersection script") so a large universe
    /// never costs more than one network call.
    pub async fn eval_script(
        &self,
        script: &Script,
        keys: &[&str],
        args: &[&str],
    ) -> PssResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut invocation = script.prepare_invoke();
        for key in keys {
            invocation.key(*key);
        }
        for arg in args {
            invocation.arg(*arg);
        }
        self.with_timeout(invocation.invoke_async(&mut conn)).await
    }
}

/// Server-side intersection of a sorted-set range with a set's members.
///
/// `KEYS[1]` = universe set key, `KEYS[2]` = ticker-update sorted-set key,
/// `ARGV[1]` = `sinceMs`. Returns `[maxScoreSeen, ticker, ticker, ...]`: the
/// first element is the highest score found in the *full* `sinceMs..+inf`
/// range (before universe filtering, so the caller can advance its scan
/// cursor to exactly the newest mark actually observed, never past it),
/// followed by the intersection. A ticker's own mark is never skipped by
/// the next scan until a newer mark supersedes it.
pub fn universe_intersection_script() -> Script {
    Script::new(
        r#"
        local universe_key = KEYS[1]
        local updates_key = KEYS[2]
        local since_ms = ARGV[1]
        local raw = redis.call('ZRANGEBYSCORE', updates_key, since_ms, '+inf', 'WITHSCORES')
        local universe = redis.call('SMEMBERS', universe_key)
        local universe_set = {}
        for _, ticker in ipairs(universe) do
            universe_set[ticker] = true
        end
        local max_score = tonumber(since_ms)
        local result = {}
        local i = 1
        while i <= #raw do
            local ticker = raw[i]
            local score = tonumber(raw[i + 1])
            if score > max_score then
                max_score = score
            end
            if universe_set[ticker] then
                table.insert(result, ticker)
            end
            i = i + 2
        end
        table.insert(result, 1, tostring(max_score))
        return result
        "#,
    )
}

#[cfg(all(test, feature = "test-redis"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn zadd_ch_reports_change() {
        let store = CacheStore::connect(&RedisConfig::default()).await.unwrap();
        let key = "qcore:test:zadd";
        store.del(&[key]).await.unwrap();

        assert!(store.z_add_ch(key, 100.0, "AAPL").await.unwrap());
        assert!(!store.z_add_ch(key, 100.0, "AAPL").await.unwrap());
        assert!(store.z_add_ch(key, 200.0, "AAPL").await.unwrap());
    }
}
