//! `TaskHandle`: a running function's view onto its own task (spec.md §6
//! "logs" field; SPEC_FULL.md §4 "Task logs").

use std::sync::Mutex;

use chrono::Utc;
use qcore_queue::{LogEntry, TaskQueue};

const MAX_BUFFERED: usize = 256;
const FLUSH_EVERY: usize = 8;

/// Passed to a registered function while it runs. Buffers log lines in
/// memory (bounded to 256) and flushes them to the PSS every 8th append,
/// plus a final flush when the caller completes or fails the task, so a
/// chatty function doesn't turn every `log()` call into a round trip.
pub struct TaskHandle {
    queue: TaskQueue,
    task_id: String,
    buffer: Mutex<Vec<LogEntry>>,
    appended_since_flush: Mutex<usize>,
}

impl TaskHandle {
    pub(crate) fn new(queue: TaskQueue, task_id: String) -> Self {
        Self {
            queue,
            task_id,
            buffer: Mutex::new(Vec::new()),
            appended_since_flush: Mutex::new(0),
        }
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Append a log line, flushing to the PSS every `FLUSH_EVERY` calls.
    pub async fn log(&self, level: impl Into<String>, message: impl Into<String>) {
        let should_flush = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
            buffer.push(LogEntry {
                timestamp: Utc::now(),
                level: level.into(),
                message: message.into(),
            });
            if buffer.len() > MAX_BUFFERED {
                let overflow = buffer.len() - MAX_BUFFERED;
                buffer.drain(0..overflow);
            }
            let mut count = self.appended_since_flush.lock().unwrap_or_else(|p| p.into_inner());
            *count += 1;
            *count >= FLUSH_EVERY
        };

        if should_flush {
            self.flush().await;
        }
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.log("info", message).await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.log("error", message).await;
    }

    /// Write the buffered logs to the PSS. Errors are logged, not
    /// propagated — losing a batch of progress logs must not fail the
    /// task itself.
    pub async fn flush(&self) {
        let snapshot = {
            let buffer = self.buffer.lock().unwrap_or_else(|p| p.into_inner());
            buffer.clone()
        };
        *self
            .appended_since_flush
            .lock()
            .unwrap_or_else(|p| p.into_inner()) = 0;

        if let Err(err) = self.queue.set_logs(&self.task_id, snapshot).await {
            tracing::warn!(task_id = %self.task_id, error = %err, "failed to flush task logs");
        }
    }
}
