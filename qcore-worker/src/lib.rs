//! Out-of-process worker harness: the consumer side of the Task Queue
//! protocol, with a named-function registry (spec.md §4.2).

mod error;
mod handle;
mod registry;
mod worker;

pub use error::WorkerError;
pub use handle::TaskHandle;
pub use registry::{FunctionRegistry, TaskFunction};
pub use worker::Worker;
