//! # Layered Configuration
//!
//! Configuration is loaded from a base TOML file, merged with an
//! environment-specific overlay, and finally overridden by `QCORE_`-prefixed
//! environment variables — the same three-tier shape the platform's other
//! services use so operators only need to learn one config story.
//!
//! ```toml
//! [redis]
//! url = "redis://127.0.0.1:6379"
//!
//! [postgres]
//! url = "postgres://localhost/qcore"
//! max_connections = 10
//!
//! [scheduler]
//! timezone = "America/New_York"
//! ```
//!
//! Every section derives `Default` so a field left unset in every layer
//! still produces a usable value; callers needing to build config
//! programmatically (tests, embedding applications) can use the `bon`
//! builder derived on [`CoreConfig`] instead of going through a file.

mod alerts;
mod events;
mod postgres;
mod queue;
mod redis_store;
mod scheduler;

pub use alerts::AlertsConfig;
pub use events::EventsConfig;
pub use postgres::PostgresConfig;
pub use queue::QueueConfig;
pub use redis_store::RedisConfig;
pub use scheduler::SchedulerConfig;

use serde::{Deserialize, Serialize};

/// Top-level configuration for the whole workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize, bon::Builder)]
pub struct CoreConfig {
    #[serde(default)]
    #[builder(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    #[builder(default)]
    pub postgres: PostgresConfig,
    #[serde(default)]
    #[builder(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    #[builder(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    #[builder(default)]
    pub events: EventsConfig,
    #[serde(default)]
    #[builder(default)]
    pub queue: QueueConfig,
}

impl CoreConfig {
    /// Load configuration from `config/base.toml`, overlaid with
    /// `config/{env}.toml` (where `env` comes from `QCORE_ENV`, default
    /// `development`), overlaid with `QCORE_`-prefixed environment
    /// variables (e.g. `QCORE_REDIS__URL`).
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("QCORE_ENV").unwrap_or_else(|_| "development".to_string());

        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/base").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("QCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_usable() {
        let cfg = CoreConfig::default();
        assert_eq!(cfg.scheduler.timezone, "America/New_York");
        assert!(cfg.alerts.tick_ms > 0);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = CoreConfig::builder()
            .scheduler(SchedulerConfig {
                timezone: "UTC".to_string(),
                ..Default::default()
            })
            .build();
        assert_eq!(cfg.scheduler.timezone, "UTC");
    }
}
