// Worker Registry
// Maps a worker type name to a factory producing a fresh worker per job

use crate::domain::WorkerType;
use crate::error::{AppError, Result};
use crate::port::JobWorker;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Factory producing one worker instance per job
pub type WorkerFactory = Arc<dyn Fn() -> Box<dyn JobWorker> + Send + Sync>;

/// Registry of known worker types, filled at process start
#[derive(Default)]
pub struct WorkerRegistry {
    factories: RwLock<HashMap<String, WorkerFactory>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under `worker_type`, replacing any previous one
    pub fn register<F>(&self, worker_type: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn JobWorker> + Send + Sync + 'static,
    {
        let worker_type = worker_type.into();
        info!(worker_type = %worker_type, "Registered worker");
        self.factories
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(worker_type, Arc::new(factory));
    }

    /// Resolve a worker type to a fresh worker instance
    pub fn resolve(&self, worker_type: &WorkerType) -> Result<Box<dyn JobWorker>> {
        let factory = self
            .factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(worker_type.as_str())
            .cloned()
            .ok_or_else(|| {
                AppError::WorkerNotFound(format!(
                    "no worker registered for type '{}'",
                    worker_type
                ))
            })?;
        Ok(factory())
    }

    pub fn contains(&self, worker_type: &str) -> bool {
        self.factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(worker_type)
    }

    /// Registered worker type names, sorted
    pub fn worker_types(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .factories
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, JobPayload};
    use crate::error::ErrorKind;
    use crate::port::worker::mocks::{MockBehavior, MockWorker};

    #[tokio::test]
    async fn test_resolve_registered_worker() {
        let registry = WorkerRegistry::new();
        registry.register("echo", || Box::new(MockWorker::new(MockBehavior::Echo)));

        let worker = registry.resolve(&WorkerType::new("echo")).unwrap();
        let output = worker
            .execute(JobId::new(1), &JobPayload::new(serde_json::json!({"a": 1})))
            .await
            .unwrap();
        assert_eq!(output.to_json().unwrap(), serde_json::json!({"a": 1}));
        assert!(registry.contains("echo"));
    }

    #[test]
    fn test_unknown_worker_is_typed_error() {
        let registry = WorkerRegistry::new();
        let err = registry
            .resolve(&WorkerType::new("missing"))
            .err()
            .expect("should not resolve");
        assert_eq!(err.kind(), ErrorKind::WorkerNotFound);
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_worker_types_sorted() {
        let registry = WorkerRegistry::new();
        registry.register("shell", || Box::new(MockWorker::new(MockBehavior::Echo)));
        registry.register("echo", || Box::new(MockWorker::new(MockBehavior::Echo)));
        assert_eq!(registry.worker_types(), vec!["echo", "shell"]);
    }
}
