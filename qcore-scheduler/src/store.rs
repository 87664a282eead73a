//! `job:lastrun:{name}` / `job:lastcompletion:{name}` persistence (spec.md
//! §4.4 "Persistence keys").

use chrono::{DateTime, Utc};
use qcore_shared::CacheStore;

use crate::error::SchedulerError;

fn lastrun_key(name: &str) -> String {
    format!("job:lastrun:{name}")
}

fn lastcompletion_key(name: &str) -> String {
    format!("job:lastcompletion:{name}")
}

/// Thin wrapper over the scheduler's two persisted timestamps per job.
#[derive(Clone)]
pub struct JobStore {
    cache: CacheStore,
}

impl JobStore {
    pub fn new(cache: CacheStore) -> Self {
        Self { cache }
    }

    /// Best-effort: called immediately when a run starts, so its failure
    /// must not block dispatch.
    pub async fn set_last_run(&self, name: &str, at: DateTime<Utc>) {
        if let Err(err) = self
            .cache
            .set_string(&lastrun_key(name), &at.to_rfc3339(), None)
            .await
        {
            tracing::warn!(job = name, error = %err, "failed to persist lastRun");
        }
    }

    pub async fn last_run(&self, name: &str) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        Ok(self.get(&lastrun_key(name)).await?)
    }

    /// Only called once a run is verified complete: synchronously for
    /// direct jobs, asynchronously (via the queue-poll monitor) for
    /// queued jobs.
    pub async fn set_last_completion(
        &self,
        name: &str,
        at: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        self.cache
            .set_string(&lastcompletion_key(name), &at.to_rfc3339(), None)
            .await?;
        Ok(())
    }

    pub async fn last_completion(&self, name: &str) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        self.get(&lastcompletion_key(name)).await
    }

    async fn get(&self, key: &str) -> Result<Option<DateTime<Utc>>, SchedulerError> {
        let Some(raw) = self.cache.get_string(key).await? else {
            return Ok(None);
        };
        Ok(DateTime::parse_from_rfc3339(&raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)))
    }

    /// Clear every `job:lastrun:*`/`job:lastcompletion:*` entry known to
    /// `names` (SPEC_FULL.md's resolution of the scheduler's startup Open
    /// Question; see DESIGN.md).
    pub async fn clear_all(&self, names: &[&str]) -> Result<(), SchedulerError> {
        let keys: Vec<String> = names
            .iter()
            .flat_map(|n| [lastrun_key(n), lastcompletion_key(n)])
            .collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        self.cache.del(&refs).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_follow_stable_pattern() {
        assert_eq!(lastrun_key("StopServices"), "job:lastrun:StopServices");
        assert_eq!(
            lastcompletion_key("StopServices"),
            "job:lastcompletion:StopServices"
        );
    }
}
