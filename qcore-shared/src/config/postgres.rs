use serde::{Deserialize, Serialize};

/// Relational store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    /// Timeout applied to individual SQL statements (§5: 10-30s).
    pub statement_timeout_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/qcore".to_string(),
            max_connections: 10,
            statement_timeout_ms: 20_000,
        }
    }
}
