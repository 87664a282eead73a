//! # Core Error Kinds
//!
//! Cross-cutting error classification shared by every component. Per-crate
//! error enums (`PssError` in this crate, `QueueError`, `AlertError`,
//! `SchedulerError`, `EventBusError` in their respective crates) generally
//! carry or convert into one of these kinds so callers at a boundary (HTTP
//! handler, WebSocket close frame, health check) can make a uniform
//! decision without matching every concrete error type.

use thiserror::Error;

/// The error taxonomy from the design's error handling section.
///
/// This is deliberately coarse — it exists so library layers can agree on
/// *what kind* of failure occurred without every caller needing to know
/// the full concrete error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorKind {
    /// A retryable I/O failure that exhausted its retry budget.
    Transient,
    /// A malformed request or an invalid state transition.
    Contract,
    /// The referenced entity (task, job, subscription) does not exist.
    NotFound,
    /// The caller's credentials were invalid or expired.
    Authorization,
    /// An invariant was violated; logged with full context and reported via
    /// a health metric, but must not propagate past the owning worker.
    Internal,
}

/// Errors surfaced by the Persistent State Store.
#[derive(Debug, Error)]
pub enum PssError {
    #[error("transient store error exhausted its retry budget: {0}")]
    TransientExhausted(String),

    #[error("operation cancelled before completion")]
    ContextCancelled,

    #[error("store rejected the operation: {0}")]
    Domain(String),

    #[error("circuit breaker open for {component}")]
    CircuitOpen { component: String },

    #[error("cache backend error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("relational store error: {0}")]
    Sql(#[from] sqlx::Error),

    #[error("failed to (de)serialize stored value: {0}")]
    Serde(#[from] serde_json::Error),
}

impl PssError {
    /// Classify this error for callers that only care about the coarse kind.
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            PssError::TransientExhausted(_) | PssError::CircuitOpen { .. } => {
                CoreErrorKind::Transient
            }
            PssError::ContextCancelled => CoreErrorKind::Contract,
            PssError::Domain(_) | PssError::Cache(_) | PssError::Sql(_) | PssError::Serde(_) => {
                CoreErrorKind::Internal
            }
        }
    }

    /// Whether retrying this exact operation again, unmodified, could help.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), CoreErrorKind::Transient)
    }
}

/// Convenience alias used throughout the PSS implementation.
pub type PssResult<T> = Result<T, PssError>;
