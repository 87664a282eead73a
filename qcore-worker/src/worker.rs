//! The consumer side of the Task Queue protocol (spec.md §4.2 step 2):
//! pop, execute, write a terminal result.

use std::sync::Arc;

use qcore_queue::TaskQueue;
use tokio_util::sync::CancellationToken;

use crate::error::WorkerError;
use crate::handle::TaskHandle;
use crate::registry::FunctionRegistry;

/// Runs the pop/execute/complete loop against one [`TaskQueue`], dispatching
/// through a [`FunctionRegistry`].
#[derive(Clone)]
pub struct Worker {
    queue: TaskQueue,
    registry: Arc<FunctionRegistry>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker").finish()
    }
}

impl Worker {
    pub fn new(queue: TaskQueue, registry: FunctionRegistry) -> Self {
        Self {
            queue,
            registry: Arc::new(registry),
        }
    }

    /// Run until `cancel` fires. Each popped task id is processed to
    /// completion before the next pop, mirroring the teacher's single
    /// in-flight-per-worker consumption model; run several `Worker`s
    /// concurrently for parallelism.
    pub async fn run(&self, cancel: CancellationToken) {
        loop {
            let popped = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = self.queue.pop_next() => result,
            };

            match popped {
                Ok(Some(task_id)) => self.process_one(&task_id).await,
                Ok(None) => continue,
                Err(err) => {
                    tracing::warn!(error = %err, "queue pop failed, backing off");
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(std::time::Duration::from_secs(1)) => {}
                    }
                }
            }
        }
    }

    async fn process_one(&self, task_id: &str) {
        if let Err(err) = self.try_process_one(task_id).await {
            tracing::error!(task_id, error = %err, "task processing failed before a terminal write");
            let _ = self.queue.fail(task_id, err.to_string()).await;
        }
    }

    async fn try_process_one(&self, task_id: &str) -> Result<(), WorkerError> {
        let task = self.queue.mark_running(task_id).await?;

        let function = self
            .registry
            .get(&task.func)
            .ok_or_else(|| WorkerError::UnknownFunction(task.func.clone()))?;

        let handle = TaskHandle::new(self.queue.clone(), task_id.to_string());
        let outcome = function.call(task.args.clone(), &handle).await;
        handle.flush().await;

        match outcome {
            Ok(result) => self.queue.complete(task_id, result).await?,
            Err(message) => self.queue.fail(task_id, message).await?,
        }
        Ok(())
    }
}
