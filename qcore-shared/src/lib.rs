//! Shared foundation for the qcore workspace: the Persistent State Store
//! (cache + relational halves), layered configuration, error types,
//! resilience primitives (circuit breaker, SQL retry budget) and logging
//! init, used by every other `qcore-*` crate.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod resilience;
pub mod sql;

pub use cache::CacheStore;
pub use config::CoreConfig;
pub use error::{CoreErrorKind, PssError, PssResult};
pub use model::Event;
pub use sql::SqlStore;
