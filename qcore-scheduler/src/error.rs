use qcore_queue::QueueError;
use qcore_shared::{CoreErrorKind, PssError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job {0} is already registered")]
    DuplicateJob(String),

    #[error("job {0} is not registered")]
    UnknownJob(String),

    #[error("persistent store error: {0}")]
    Store(#[from] PssError),

    #[error("task queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("job {0} failed: {1}")]
    JobFailed(String, String),
}

impl SchedulerError {
    pub fn kind(&self) -> CoreErrorKind {
        match self {
            SchedulerError::DuplicateJob(_) => CoreErrorKind::Internal,
            SchedulerError::UnknownJob(_) => CoreErrorKind::NotFound,
            SchedulerError::Store(e) => e.kind(),
            SchedulerError::Queue(e) => e.kind(),
            SchedulerError::JobFailed(..) => CoreErrorKind::Internal,
        }
    }
}
