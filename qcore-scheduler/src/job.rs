//! Job declarations (spec.md §3 "ScheduledJob", §4.4 "Configuration").

use std::sync::Arc;

use async_trait::async_trait;

/// A single invocable job body, run synchronously in a fresh worker task.
#[async_trait]
pub trait JobFunction: Send + Sync {
    async fn run(&self) -> Result<(), String>;
}

#[async_trait]
impl<F, Fut> JobFunction for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<(), String>> + Send,
{
    async fn run(&self) -> Result<(), String> {
        (self)().await
    }
}

/// How a job's body is executed: in-process, or handed off to the Task
/// Queue for an out-of-process worker (spec.md §4.4 "Execution dispatch":
/// names beginning `queue:`).
pub enum JobBody {
    Direct(Arc<dyn JobFunction>),
    Queued {
        func: String,
        args: serde_json::Value,
    },
}

impl std::fmt::Debug for JobBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobBody::Direct(_) => f.write_str("JobBody::Direct"),
            JobBody::Queued { func, .. } => {
                f.debug_struct("JobBody::Queued").field("func", func).finish()
            }
        }
    }
}

/// A job's static declaration: name, schedule, and dispatch policy.
#[derive(Debug)]
pub struct JobSpec {
    pub name: String,
    /// Local-tz `(hour, minute)` times this job should run at.
    pub schedule: Vec<(u32, u32)>,
    pub run_on_init: bool,
    pub skip_on_weekends: bool,
    pub body: JobBody,
}

impl JobSpec {
    pub fn direct(
        name: impl Into<String>,
        schedule: Vec<(u32, u32)>,
        run_on_init: bool,
        skip_on_weekends: bool,
        function: Arc<dyn JobFunction>,
    ) -> Self {
        Self {
            name: name.into(),
            schedule,
            run_on_init,
            skip_on_weekends,
            body: JobBody::Direct(function),
        }
    }

    pub fn queued(
        name: impl Into<String>,
        schedule: Vec<(u32, u32)>,
        run_on_init: bool,
        skip_on_weekends: bool,
        func: impl Into<String>,
        args: serde_json::Value,
    ) -> Self {
        let name = name.into();
        assert!(
            name.starts_with("queue:"),
            "queued job names must start with `queue:` per spec.md §4.4"
        );
        Self {
            name,
            schedule,
            run_on_init,
            skip_on_weekends,
            body: JobBody::Queued {
                func: func.into(),
                args,
            },
        }
    }

    /// Most recent `(hour, minute)` in `schedule` that is `<= (hour,
    /// minute)`, used for catch-up detection (SPEC_FULL.md §4: "a job with
    /// multiple times per day catches up to the most recent missed time").
    pub fn most_recent_due_time(&self, hour: u32, minute: u32) -> Option<(u32, u32)> {
        self.schedule
            .iter()
            .filter(|&&(h, m)| (h, m) <= (hour, minute))
            .max()
            .copied()
    }

    pub fn earliest_scheduled_time(&self) -> Option<(u32, u32)> {
        self.schedule.iter().min().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> JobSpec {
        JobSpec::direct(
            "cleanup",
            vec![(8, 0), (14, 30), (20, 0)],
            false,
            false,
            Arc::new(|| async { Ok(()) }),
        )
    }

    #[test]
    fn most_recent_due_time_picks_latest_missed_slot() {
        let spec = spec();
        assert_eq!(spec.most_recent_due_time(15, 0), Some((14, 30)));
        assert_eq!(spec.most_recent_due_time(21, 0), Some((20, 0)));
        assert_eq!(spec.most_recent_due_time(7, 0), None);
    }

    #[test]
    #[should_panic(expected = "queue:")]
    fn queued_job_name_must_be_prefixed() {
        JobSpec::queued("not_prefixed", vec![(8, 0)], false, false, "f", serde_json::json!({}));
    }
}
