//! Alert Evaluation Engine (spec.md §4.3): per-strategy ticker universes,
//! a time-indexed set of recently-updated tickers, bucket-based
//! deduplication, and the `stopped → starting → running → stopping →
//! stopped` evaluation loop.

mod engine;
mod error;
mod last_buckets;
mod predicate;
mod ticker_index;
mod universe;

pub use engine::{AlertEngine, EngineState};
pub use error::AlertError;
pub use last_buckets::StrategyLastBuckets;
pub use predicate::{AlertPredicate, StrategyDefinition, StrategyRegistry};
pub use ticker_index::TickerIndex;
pub use universe::StrategyUniverse;
