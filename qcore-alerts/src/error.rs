use qcore_shared::{CoreErrorKind, PssError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("persistent store error: {0}")]
    Store(#[from] PssError),

    #[error("strategy {0} is not registered")]
    UnknownStrategy(String),

    #[error("predicate for strategy {strategy_id} ticker {ticker} failed: {message}")]
    Predicate {
        strategy_id: String,
        ticker: String,
        message: String,
    },

    #[error("engine is misconfigured and refuses to start: {0}")]
    Misconfigured(String),

    #[error("engine is already {0}")]
    InvalidTransition(&'static str),
}

impl AlertError {
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            AlertError::Store(e) => e.kind(),
            AlertError::UnknownStrategy(_) => CoreErrorKind::NotFound,
            AlertError::Predicate { .. } => CoreErrorKind::Internal,
            AlertError::Misconfigured(_) => CoreErrorKind::Contract,
            AlertError::InvalidTransition(_) => CoreErrorKind::Contract,
        }
    }
}
