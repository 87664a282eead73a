use qcore_queue::QueueError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("no function registered for {0}")]
    UnknownFunction(String),

    #[error(transparent)]
    Queue(#[from] QueueError),
}
