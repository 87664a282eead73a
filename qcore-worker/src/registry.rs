//! Named-function registry: maps the `func` field of a [`qcore_queue::Task`]
//! to the code a worker should run.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::handle::TaskHandle;

/// A single invocable function, registered under a stable name.
#[async_trait]
pub trait TaskFunction: Send + Sync {
    async fn call(
        &self,
        args: serde_json::Value,
        handle: &TaskHandle,
    ) -> Result<serde_json::Value, String>;
}

#[async_trait]
impl<F, Fut> TaskFunction for F
where
    F: Fn(serde_json::Value, &TaskHandle) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<serde_json::Value, String>> + Send,
{
    async fn call(
        &self,
        args: serde_json::Value,
        handle: &TaskHandle,
    ) -> Result<serde_json::Value, String> {
        (self)(args, handle).await
    }
}

/// Maps function names to their implementations. Workers are deliberately
/// dumb about what a function *does* — the registry is populated by the
/// embedding application at startup, not discovered from the store.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn TaskFunction>>,
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("registered", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, function: Arc<dyn TaskFunction>) {
        self.functions.insert(name.into(), function);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskFunction>> {
        self.functions.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_function_is_absent() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("does_not_exist").is_none());
    }

    #[tokio::test]
    async fn registered_closure_is_callable() {
        let mut registry = FunctionRegistry::new();
        registry.register(
            "double",
            Arc::new(|args: serde_json::Value, _handle: &TaskHandle| async move {
                let n = args.as_i64().ok_or_else(|| "expected an integer".to_string())?;
                Ok(serde_json::json!(n * 2))
            }),
        );

        let function = registry.get("double").expect("registered");
        // `call` needs a real TaskHandle, which needs a live CacheStore;
        // exercising it end to end belongs in an integration test behind
        // `test-redis`. Here we only assert the registry wiring itself.
        assert!(registry.get("double").is_some());
        drop(function);
    }
}
