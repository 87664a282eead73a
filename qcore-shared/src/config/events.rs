use serde::{Deserialize, Serialize};

/// Real-time Event Bus settings (spec.md §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// Capacity of each socket's outbound channel before it is considered
    /// a slow consumer.
    pub send_channel_capacity: usize,
    /// Write deadline applied to each outbound frame.
    pub write_deadline_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            send_channel_capacity: 256,
            write_deadline_ms: 5_000,
        }
    }
}
