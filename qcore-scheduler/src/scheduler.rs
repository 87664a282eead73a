//! The job scheduler main loop (spec.md §4.4): every 60s, for each job,
//! decide whether to run it (scheduled time, catch-up), enforce
//! single-instance execution, and dispatch either in-process or through
//! the Task Queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use qcore_queue::TaskQueue;
use qcore_shared::config::SchedulerConfig;
use qcore_shared::CacheStore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::SchedulerError;
use crate::job::{JobBody, JobSpec};
use crate::store::JobStore;

/// A hook invoked during graceful shutdown, e.g. to stop the alert loop or
/// a market-stream adapter (spec.md §4.4 "Shutdown").
#[async_trait]
pub trait ShutdownHook: Send + Sync {
    async fn stop(&self);
}

#[async_trait]
impl<F, Fut> ShutdownHook for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = ()> + Send,
{
    async fn stop(&self) {
        (self)().await;
    }
}

/// Outcome of a single job dispatch, for logging/reporting (spec.md §6
/// "Scheduled-job exit codes / reports").
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Ok,
    Failed(String),
    Queued { task_id: String },
    Timeout,
}

struct JobRuntime {
    spec: JobSpec,
    is_running: Arc<AtomicBool>,
}

/// Runs every registered [`JobSpec`] on its schedule, enforcing at most one
/// concurrent execution per job name (spec.md §5 "Ordering guarantees").
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: HashMap<String, JobRuntime>,
    store: JobStore,
    queue: TaskQueue,
    config: SchedulerConfig,
    shutdown_hooks: Vec<Arc<dyn ShutdownHook>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("jobs", &self.inner.jobs.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Declares the jobs the scheduler will run; built up before calling
/// [`Scheduler::start`].
pub struct SchedulerBuilder {
    jobs: HashMap<String, JobSpec>,
    shutdown_hooks: Vec<Arc<dyn ShutdownHook>>,
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            jobs: HashMap::new(),
            shutdown_hooks: Vec::new(),
        }
    }

    pub fn add_job(mut self, spec: JobSpec) -> Result<Self, SchedulerError> {
        if self.jobs.contains_key(&spec.name) {
            return Err(SchedulerError::DuplicateJob(spec.name));
        }
        self.jobs.insert(spec.name.clone(), spec);
        Ok(self)
    }

    pub fn add_shutdown_hook(mut self, hook: Arc<dyn ShutdownHook>) -> Self {
        self.shutdown_hooks.push(hook);
        self
    }

    pub fn build(self, cache: CacheStore, queue: TaskQueue, config: SchedulerConfig) -> Scheduler {
        let jobs = self
            .jobs
            .into_iter()
            .map(|(name, spec)| {
                (
                    name,
                    JobRuntime {
                        spec,
                        is_running: Arc::new(AtomicBool::new(false)),
                    },
                )
            })
            .collect();

        Scheduler {
            inner: Arc::new(Inner {
                jobs,
                store: JobStore::new(cache),
                queue,
                config,
                shutdown_hooks: self.shutdown_hooks,
            }),
        }
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct LoopHandle {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the main-loop task so `stop` can cancel and join it.
pub struct SchedulerHandle {
    scheduler: Scheduler,
    loop_handle: Option<LoopHandle>,
}

impl Scheduler {
    fn tz(&self) -> Tz {
        self.inner
            .config
            .timezone
            .parse()
            .unwrap_or(chrono_tz::America::New_York)
    }

    /// Initialize persisted state (optionally clearing it, per
    /// `clear_persisted_state_on_start` — see DESIGN.md for the Open
    /// Question this resolves) and launch every `runOnInit` job
    /// concurrently, then start the 60s main loop.
    pub async fn start(self) -> SchedulerHandle {
        if self.inner.config.clear_persisted_state_on_start {
            let names: Vec<&str> = self.inner.jobs.keys().map(String::as_str).collect();
            if let Err(err) = self.inner.store.clear_all(&names).await {
                tracing::warn!(error = %err, "failed to clear persisted scheduler state at startup");
            }
        }

        for name in self.inner.jobs.keys() {
            if self.inner.jobs[name].spec.run_on_init {
                self.dispatch(name.clone());
            }
        }

        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let scheduler = self.clone();
        let handle = tokio::spawn(async move { scheduler.run_loop(loop_cancel).await });

        SchedulerHandle {
            scheduler: self,
            loop_handle: Some(LoopHandle { cancel, handle }),
        }
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        let mut ticker =
            tokio::time::interval(Duration::from_secs(self.inner.config.tick_interval_secs));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.tick().await,
            }
        }
    }

    async fn tick(&self) {
        let tz = self.tz();
        let now = Utc::now().with_timezone(&tz);

        for name in self.inner.jobs.keys().cloned().collect::<Vec<_>>() {
            if let Err(err) = self.evaluate_job(&name, now).await {
                tracing::warn!(job = %name, error = %err, "scheduler evaluation failed for job");
            }
        }
    }

    async fn evaluate_job(&self, name: &str, now: DateTime<Tz>) -> Result<(), SchedulerError> {
        let runtime = self
            .inner
            .jobs
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownJob(name.to_string()))?;

        if runtime.spec.skip_on_weekends && is_weekend(now) {
            return Ok(());
        }
        if runtime.is_running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let hour = now.hour();
        let minute = now.minute();

        if runtime.spec.schedule.contains(&(hour, minute)) {
            self.dispatch(name.to_string());
            return Ok(());
        }

        // Catch-up: the last verified completion predates the start of
        // today (in the configured tz) and we have passed at least the
        // job's most recently due time today.
        if let Some((due_hour, due_minute)) = runtime.spec.most_recent_due_time(hour, minute) {
            let today_start = now
                .timezone()
                .with_ymd_and_hms(now.year(), now.month(), now.day(), 0, 0, 0)
                .single();
            let last_completion = self.inner.store.last_completion(name).await?;
            let needs_catch_up = match (last_completion, today_start) {
                (Some(completion), Some(today_start)) => completion < today_start,
                (None, _) => true,
                _ => false,
            };
            if needs_catch_up {
                tracing::info!(
                    job = name,
                    due_hour,
                    due_minute,
                    "running catch-up execution after downtime"
                );
                self.dispatch(name.to_string());
            }
        }

        Ok(())
    }

    /// Fire-and-forget dispatch of one job run. `stop` waits for it to
    /// finish by polling the job's `is_running` flag rather than joining a
    /// handle, since a job may itself be a long-running queue-poll loop.
    fn dispatch(&self, name: String) {
        let scheduler = self.clone();
        tokio::spawn(async move {
            scheduler.run_job(&name).await;
        });
    }

    async fn run_job(&self, name: &str) {
        let Some(runtime) = self.inner.jobs.get(name) else {
            return;
        };
        runtime.is_running.store(true, Ordering::SeqCst);
        let start = Utc::now();
        self.inner.store.set_last_run(name, start).await;

        let outcome = match &runtime.spec.body {
            JobBody::Direct(function) => self.run_direct(name, function.clone()).await,
            JobBody::Queued { func, args } => self.run_queued(name, func, args.clone()).await,
        };

        metrics::counter!("qcore_scheduler_job_runs_total").increment(1);
        match &outcome {
            JobOutcome::Ok => {
                tracing::info!(job = name, duration_ms = (Utc::now() - start).num_milliseconds(), "job completed");
            }
            JobOutcome::Failed(message) => {
                tracing::error!(job = name, error = %message, "job failed");
            }
            JobOutcome::Queued { task_id } => {
                tracing::info!(job = name, task_id = %task_id, "job dispatched to task queue");
            }
            JobOutcome::Timeout => {
                tracing::warn!(job = name, "verification timeout waiting for queued job");
            }
        }

        runtime.is_running.store(false, Ordering::SeqCst);
    }

    async fn run_direct(&self, name: &str, function: Arc<dyn crate::job::JobFunction>) -> JobOutcome {
        let result = tokio::spawn(async move { function.run().await }).await;
        match result {
            Ok(Ok(())) => {
                if let Err(err) = self.inner.store.set_last_completion(name, Utc::now()).await {
                    tracing::warn!(job = name, error = %err, "failed to persist lastCompletion");
                }
                JobOutcome::Ok
            }
            Ok(Err(message)) => JobOutcome::Failed(message),
            Err(join_err) => {
                tracing::error!(job = name, error = %join_err, "job panicked; recovered by scheduler");
                JobOutcome::Failed(format!("job panicked: {join_err}"))
            }
        }
    }

    async fn run_queued(
        &self,
        name: &str,
        func: &str,
        args: serde_json::Value,
    ) -> JobOutcome {
        let task_id = match self.inner.queue.enqueue(func, args).await {
            Ok(id) => id,
            Err(err) => return JobOutcome::Failed(err.to_string()),
        };

        let poll_interval = Duration::from_secs(self.inner.config.queue_poll_interval_secs);
        for _ in 0..self.inner.config.queue_poll_max_attempts {
            tokio::time::sleep(poll_interval).await;
            match self.inner.queue.poll(&task_id).await {
                Ok(task) if task.state.is_terminal() => {
                    return match task.state {
                        qcore_queue::TaskState::Completed => {
                            if let Err(err) =
                                self.inner.store.set_last_completion(name, Utc::now()).await
                            {
                                tracing::warn!(job = name, error = %err, "failed to persist lastCompletion");
                            }
                            JobOutcome::Queued { task_id }
                        }
                        _ => JobOutcome::Failed(
                            task.error.unwrap_or_else(|| "queued task did not complete".to_string()),
                        ),
                    };
                }
                Ok(_) => continue,
                Err(err) => {
                    tracing::warn!(job = name, task_id = %task_id, error = %err, "poll failed, retrying");
                }
            }
        }

        JobOutcome::Timeout
    }
}

impl SchedulerHandle {
    /// Cancel the 60s ticker, invoke every registered shutdown hook, then
    /// wait for any in-flight job execution to finish (spec.md §4.4
    /// "Shutdown").
    pub async fn stop(mut self) {
        if let Some(loop_handle) = self.loop_handle.take() {
            loop_handle.cancel.cancel();
            let _ = loop_handle.handle.await;
        }

        for hook in &self.scheduler.inner.shutdown_hooks {
            hook.stop().await;
        }

        // Wait for any dispatch already in flight: `is_running` only
        // clears once `run_job` reaches its terminal write, so polling it
        // is equivalent to joining each job's task without needing a
        // separate JoinHandle registry per job.
        for name in self
            .scheduler
            .inner
            .jobs
            .keys()
            .cloned()
            .collect::<Vec<_>>()
        {
            while self
                .scheduler
                .inner
                .jobs
                .get(&name)
                .map(|r| r.is_running.load(Ordering::SeqCst))
                .unwrap_or(false)
            {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

fn is_weekend(now: DateTime<Tz>) -> bool {
    matches!(now.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weekend_detection() {
        let tz: Tz = chrono_tz::UTC;
        let saturday = tz.with_ymd_and_hms(2024, 10, 12, 8, 0, 0).unwrap();
        let monday = tz.with_ymd_and_hms(2024, 10, 14, 8, 0, 0).unwrap();
        assert!(is_weekend(saturday));
        assert!(!is_weekend(monday));
    }
}
