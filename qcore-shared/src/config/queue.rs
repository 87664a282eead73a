use serde::{Deserialize, Serialize};

/// Task Queue settings (spec.md §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Name of the FIFO list key tasks are enqueued onto.
    pub queue_key: String,
    /// How long a terminal task's record survives in the cache.
    pub task_ttl_secs: u64,
    /// Timeout applied to a single poll call (§5: 2s).
    pub poll_timeout_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            queue_key: "queue".to_string(),
            task_ttl_secs: 24 * 60 * 60,
            poll_timeout_ms: 2_000,
        }
    }
}
