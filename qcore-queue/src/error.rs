use qcore_shared::{CoreErrorKind, PssError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("task {0} not found")]
    NotFound(String),

    #[error("persistent store error: {0}")]
    Store(#[from] PssError),

    #[error("task payload could not be (de)serialized: {0}")]
    Serde(#[from] serde_json::Error),
}

impl QueueError {
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            QueueError::NotFound(_) => CoreErrorKind::NotFound,
            QueueError::Store(e) => e.kind(),
            QueueError::Serde(_) => CoreErrorKind::Contract,
        }
    }

    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), CoreErrorKind::Transient)
    }
}
