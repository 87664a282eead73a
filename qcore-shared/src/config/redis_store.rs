use serde::{Deserialize, Serialize};

/// Cache (Redis-compatible) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    /// Timeout applied to individual cache reads/writes (§5: 2-5s).
    pub op_timeout_ms: u64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            op_timeout_ms: 3_000,
        }
    }
}
