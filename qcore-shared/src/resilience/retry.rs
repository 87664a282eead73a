//! # SQL Retry Budget (spec.md §4.1)
//!
//! `sqlExec`/`sqlQuery` retry transient errors (connection closed, reset,
//! refused, timeout, admin shutdown — SQLSTATE classes `08xxx` and
//! `57P01`-`57P03`) with exponential backoff starting at 500ms, doubling,
//! capped at 30s: up to 5 attempts for generic transient errors, 10 for
//! connection errors. Non-transient errors fail immediately. Context
//! cancellation aborts immediately without a further attempt.

use std::time::Duration;
use tokio_util::sync::CancellationToken;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const GENERIC_TRANSIENT_ATTEMPTS: u32 = 5;
const CONNECTION_ERROR_ATTEMPTS: u32 = 10;

/// Classification of a SQL error for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlErrorClass {
    /// Connection-level failure (closed, reset, refused) — the more
    /// generous retry budget.
    Connection,
    /// Other transient failure (timeout, admin shutdown) — the standard
    /// retry budget.
    Transient,
    /// Not retryable (e.g. undefined column, constraint violation).
    Permanent,
}

/// Classify a `sqlx::Error` per the SQLSTATE classes in spec.md §4.1.
pub fn classify(err: &sqlx::Error) -> SqlErrorClass {
    match err {
        sqlx::Error::Io(_) => SqlErrorClass::Connection,
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => SqlErrorClass::Connection,
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string()).unwrap_or_default();
            if code.starts_with("08") {
                SqlErrorClass::Connection
            } else if code == "57P01" || code == "57P02" || code == "57P03" {
                SqlErrorClass::Transient
            } else {
                SqlErrorClass::Permanent
            }
        }
        _ => SqlErrorClass::Permanent,
    }
}

/// Outcome of an exhausted retry budget, distinct from the underlying error
/// so callers can tell "the database said no" from "we gave up".
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    #[error("cancelled before completion")]
    Cancelled,
    #[error("retry budget exhausted after {attempts} attempts: {source}")]
    Exhausted { attempts: u32, source: E },
    #[error(transparent)]
    Permanent(#[from] PermanentError<E>),
}

/// Wrapper marking an error as non-retryable, returned immediately.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PermanentError<E>(pub E);

/// Retry `op` according to the SQL retry budget, honoring `cancel`.
///
/// `op` is called fresh on every attempt (it must be idempotent to retry
/// safely, per the task queue's idempotence contract for write operations).
pub async fn retry_sql<F, Fut, T>(
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, RetryError<sqlx::Error>>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    if cancel.is_cancelled() {
        return Err(RetryError::Cancelled);
    }

    let mut attempt = 0u32;
    let mut backoff = INITIAL_BACKOFF;

    loop {
        attempt += 1;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            r = op() => r,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err) => {
                let class = classify(&err);
                let max_attempts = match class {
                    SqlErrorClass::Connection => CONNECTION_ERROR_ATTEMPTS,
                    SqlErrorClass::Transient => GENERIC_TRANSIENT_ATTEMPTS,
                    SqlErrorClass::Permanent => {
                        return Err(RetryError::Permanent(PermanentError(err)))
                    }
                };

                if attempt >= max_attempts {
                    tracing::warn!(
                        attempts = attempt,
                        error = %err,
                        "sql retry budget exhausted"
                    );
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }

                tracing::debug!(
                    attempt,
                    max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %err,
                    "retrying transient sql error"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(RetryError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }

                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = retry_sql(&cancel, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(sqlx::Error::PoolTimedOut)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cancellation_aborts_immediately() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result: Result<i32, _> = retry_sql(&cancel, || async { Ok(1) }).await;
        assert!(matches!(result, Err(RetryError::Cancelled)));
    }

    #[test]
    fn classifies_pool_timeout_as_connection() {
        assert_eq!(classify(&sqlx::Error::PoolTimedOut), SqlErrorClass::Connection);
    }
}
