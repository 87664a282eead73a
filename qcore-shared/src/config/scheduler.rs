use serde::{Deserialize, Serialize};

/// Job Scheduler settings (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Single configured IANA timezone all job schedules are interpreted in.
    pub timezone: String,
    /// Main loop cadence; always 60s per the design, kept configurable for
    /// tests that want a faster tick.
    pub tick_interval_secs: u64,
    /// Poll cadence for jobs dispatched through the Task Queue.
    pub queue_poll_interval_secs: u64,
    /// Maximum number of polls before giving up on a queued job run.
    pub queue_poll_max_attempts: u32,
    /// Whether to clear `job:lastrun:*` / `job:lastcompletion:*` at startup.
    /// See DESIGN.md for the Open Question this resolves.
    pub clear_persisted_state_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            tick_interval_secs: 60,
            queue_poll_interval_secs: 10,
            queue_poll_max_attempts: 30,
            clear_persisted_state_on_start: false,
        }
    }
}
