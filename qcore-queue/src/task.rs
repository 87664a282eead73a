//! The Task envelope (spec.md §6 "Task envelope").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A task's lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    /// `completed`, `failed` and `cancelled` are terminal: a poller only
    /// reads `result` once one of these is observed.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// A single log line appended by a worker while it runs a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// The wire-compatible task envelope stored at `task:{id}` and polled by
/// callers (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub func: String,
    pub args: serde_json::Value,
    pub state: TaskState,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub logs: Vec<LogEntry>,
}

impl Task {
    pub fn new(id: String, func: String, args: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            id,
            func,
            args,
            state: TaskState::Queued,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            logs: Vec::new(),
        }
    }

    pub fn cache_key(id: &str) -> String {
        format!("task:{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_terminal_states_expose_results() {
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Completed.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }

    #[test]
    fn new_task_serializes_with_queued_state() {
        let task = Task::new("t1".to_string(), "send_email".to_string(), serde_json::json!({}));
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["state"], "queued");
        assert_eq!(json["result"], serde_json::Value::Null);
    }
}
