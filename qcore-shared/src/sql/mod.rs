//! # Relational Store (spec.md §4.1 "PSS: relational side")
//!
//! Thin wrapper over a `sqlx::PgPool` that threads every statement through
//! [`retry_sql`], and a transactional `with_tx` block for the scheduler's
//! and alert engine's multi-statement writes (e.g. persisting a run report
//! alongside the job's `lastCompletion` timestamp in one commit).

use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::PostgresConfig;
use crate::error::{PssError, PssResult};
use crate::resilience::retry::{retry_sql, RetryError};
use crate::resilience::{CircuitBreaker, CircuitBreakerBehavior, CircuitBreakerConfig};

/// Async wrapper over the relational half of the PSS.
#[derive(Clone)]
pub struct SqlStore {
    pool: PgPool,
    breaker: Arc<CircuitBreaker>,
}

impl std::fmt::Debug for SqlStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStore")
            .field("size", &self.pool.size())
            .field("breaker", &self.breaker.state())
            .finish()
    }
}

fn map_retry_error(err: RetryError<sqlx::Error>) -> PssError {
    match err {
        RetryError::Cancelled => PssError::ContextCancelled,
        RetryError::Exhausted { source, .. } => PssError::Sql(source),
        RetryError::Permanent(inner) => PssError::Sql(inner.0),
    }
}

impl SqlStore {
    pub async fn connect(config: &PostgresConfig) -> PssResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_millis(config.statement_timeout_ms))
            .connect(&config.url)
            .await?;
        Ok(Self {
            pool,
            breaker: Arc::new(CircuitBreaker::new("postgres", CircuitBreakerConfig::default())),
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Whether the breaker protecting this pool considers it healthy.
    pub fn is_healthy(&self) -> bool {
        self.breaker.is_healthy()
    }

    /// Gate a retried SQL call behind the circuit breaker, timing the
    /// whole retried operation as a single unit so a persistently-failing
    /// Postgres fails fast for subsequent callers (SPEC_FULL.md §3.4
    /// "Resilience") instead of letting every caller pay the full retry
    /// budget.
    async fn guarded<Fut, T>(&self, fut: Fut) -> PssResult<T>
    where
        Fut: std::future::Future<Output = Result<T, RetryError<sqlx::Error>>>,
    {
        if !self.breaker.should_allow() {
            return Err(PssError::CircuitOpen {
                component: "postgres".to_string(),
            });
        }

        let started = Instant::now();
        let result = fut.await.map_err(map_retry_error);
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => self.breaker.record_success(elapsed),
            Err(_) => self.breaker.record_failure(elapsed),
        }
        result
    }

    /// Execute a statement that returns no rows, retried per the SQL retry
    /// budget.
    pub async fn sql_exec<F, Fut>(&self, cancel: &CancellationToken, mut op: F) -> PssResult<u64>
    where
        F: FnMut(PgPool) -> Fut,
        Fut: std::future::Future<Output = Result<u64, sqlx::Error>>,
    {
        let pool = self.pool.clone();
        self.guarded(retry_sql(cancel, || op(pool.clone()))).await
    }

    /// Run a read, retried per the SQL retry budget.
    pub async fn sql_query<F, Fut, T>(&self, cancel: &CancellationToken, mut op: F) -> PssResult<T>
    where
        F: FnMut(PgPool) -> Fut,
        Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
    {
        let pool = self.pool.clone();
        self.guarded(retry_sql(cancel, || op(pool.clone()))).await
    }

    /// Run `body` inside a transaction, committing on `Ok` and rolling back
    /// on `Err`. The whole transaction is retried as a unit on a transient
    /// failure, so `body` must be safe to run more than once.
    pub async fn with_tx<F, Fut, T>(&self, cancel: &CancellationToken, mut body: F) -> PssResult<T>
    where
        F: FnMut(Transaction<'static, Postgres>) -> Fut,
        Fut: std::future::Future<Output = Result<(Transaction<'static, Postgres>, T), sqlx::Error>>,
    {
        let pool = self.pool.clone();
        self.guarded(retry_sql(cancel, || {
            let pool = pool.clone();
            async {
                let tx = pool.begin().await?;
                let (tx, value) = body(tx).await?;
                tx.commit().await?;
                Ok(value)
            }
        }))
        .await
    }
}
