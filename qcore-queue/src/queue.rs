//! The Task Queue (spec.md §4.2): producer enqueues, workers pop and
//! complete, pollers read snapshots.

use std::time::Duration;

use chrono::Utc;
use qcore_shared::config::QueueConfig;
use qcore_shared::CacheStore;
use uuid::Uuid;

use crate::error::QueueError;
use crate::task::{LogEntry, Task, TaskState};

/// Producer/poller/worker-facing handle onto the queue's PSS state.
///
/// Cheap to clone: it only wraps the shared [`CacheStore`] and a small
/// config struct, matching the teacher's `Arc`-wrapped client pattern.
#[derive(Clone)]
pub struct TaskQueue {
    cache: CacheStore,
    config: QueueConfig,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("queue_key", &self.config.queue_key)
            .finish()
    }
}

impl TaskQueue {
    pub fn new(cache: CacheStore, config: QueueConfig) -> Self {
        Self { cache, config }
    }

    /// Generate a task id, write the envelope to the PSS, and append it to
    /// the FIFO queue list. Returns the new task's id immediately — the
    /// caller does not wait for a worker to pick it up.
    pub async fn enqueue(
        &self,
        func: impl Into<String>,
        args: serde_json::Value,
    ) -> Result<String, QueueError> {
        let id = Uuid::now_v7().to_string();
        let task = Task::new(id.clone(), func.into(), args);
        self.save(&task).await?;
        self.cache.l_push(&self.config.queue_key, &id).await?;
        Ok(id)
    }

    /// Read the current snapshot of a task. Callers should only read
    /// `result`/`error` once `task.state.is_terminal()`.
    pub async fn poll(&self, task_id: &str) -> Result<Task, QueueError> {
        self.load(task_id).await
    }

    /// Blocking pop of the next task id for a worker to process, or `None`
    /// if nothing arrived before `timeout` elapsed.
    pub async fn pop_next(&self) -> Result<Option<String>, QueueError> {
        let timeout = Duration::from_millis(self.config.poll_timeout_ms);
        Ok(self
            .cache
            .r_pop_blocking(&self.config.queue_key, timeout)
            .await?)
    }

    /// Transition a popped task to `running`.
    pub async fn mark_running(&self, task_id: &str) -> Result<Task, QueueError> {
        let mut task = self.load(task_id).await?;
        task.state = TaskState::Running;
        task.updated_at = Utc::now();
        self.save(&task).await?;
        Ok(task)
    }

    /// Record a successful result and expire the task after the configured
    /// TTL.
    pub async fn complete(
        &self,
        task_id: &str,
        result: serde_json::Value,
    ) -> Result<(), QueueError> {
        let mut task = self.load(task_id).await?;
        task.state = TaskState::Completed;
        task.result = Some(result);
        task.updated_at = Utc::now();
        self.save_with_ttl(&task).await
    }

    /// Record a failure and expire the task after the configured TTL.
    pub async fn fail(&self, task_id: &str, error: impl Into<String>) -> Result<(), QueueError> {
        let mut task = self.load(task_id).await?;
        task.state = TaskState::Failed;
        task.error = Some(error.into());
        task.updated_at = Utc::now();
        self.save_with_ttl(&task).await
    }

    /// Mark a task cancelled before a worker ever picked it up.
    pub async fn cancel(&self, task_id: &str) -> Result<(), QueueError> {
        let mut task = self.load(task_id).await?;
        task.state = TaskState::Cancelled;
        task.updated_at = Utc::now();
        self.save_with_ttl(&task).await
    }

    /// Append a log entry and persist the task, bounding the in-memory
    /// buffer to the last 256 entries. Workers typically batch several
    /// appends through `qcore_worker::TaskHandle` rather than calling this
    /// on every log line; this is the primitive it flushes through.
    pub async fn append_log(
        &self,
        task_id: &str,
        level: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), QueueError> {
        let mut task = self.load(task_id).await?;
        task.logs.push(LogEntry {
            timestamp: Utc::now(),
            level: level.into(),
            message: message.into(),
        });
        if task.logs.len() > 256 {
            let overflow = task.logs.len() - 256;
            task.logs.drain(0..overflow);
        }
        task.updated_at = Utc::now();
        self.save(&task).await
    }

    /// Overwrite a task's log buffer wholesale (bounded to the last 256
    /// entries), used by a worker's batched flush instead of one
    /// `append_log` round trip per line.
    pub async fn set_logs(&self, task_id: &str, mut logs: Vec<LogEntry>) -> Result<(), QueueError> {
        if logs.len() > 256 {
            let overflow = logs.len() - 256;
            logs.drain(0..overflow);
        }
        let mut task = self.load(task_id).await?;
        task.logs = logs;
        task.updated_at = Utc::now();
        self.save(&task).await
    }

    async fn load(&self, task_id: &str) -> Result<Task, QueueError> {
        let raw = self
            .cache
            .get_string(&Task::cache_key(task_id))
            .await?
            .ok_or_else(|| QueueError::NotFound(task_id.to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, task: &Task) -> Result<(), QueueError> {
        let raw = serde_json::to_string(task)?;
        self.cache
            .set_string(&Task::cache_key(&task.id), &raw, None)
            .await?;
        Ok(())
    }

    async fn save_with_ttl(&self, task: &Task) -> Result<(), QueueError> {
        let raw = serde_json::to_string(task)?;
        let ttl = Duration::from_secs(self.config.task_ttl_secs);
        self.cache
            .set_string(&Task::cache_key(&task.id), &raw, Some(ttl))
            .await?;
        Ok(())
    }
}
