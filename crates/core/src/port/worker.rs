// Job Worker Port
// Pluggable handler selected by a job's worker type

use crate::domain::{JobId, JobPayload};
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Worker failure (recorded into the job log, never propagated to the trigger)
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Timed out after {0}ms")]
    Timeout(i64),

    #[error("Command exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("{0}")]
    Failed(String),
}

impl WorkerError {
    pub fn failed(msg: impl Into<String>) -> Self {
        WorkerError::Failed(msg.into())
    }
}

/// Worker output, encoded to JSON when the result is persisted
///
/// Implemented for every `Serialize + Send + Sync` type, so workers can return
/// their own result structs. Encoding may fail (e.g. maps with non-string
/// keys), which the dispatcher turns into an `Error` status.
pub trait JobOutput: Send + Sync {
    fn to_json(&self) -> serde_json::Result<serde_json::Value>;
}

impl<T: Serialize + Send + Sync> JobOutput for T {
    fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}

/// Worker contract
///
/// A fresh worker is produced per job by the factory registered for its
/// worker type; `execute` consumes the payload and yields an output or fails.
#[async_trait]
pub trait JobWorker: Send + Sync {
    async fn execute(
        &self,
        job_id: JobId,
        payload: &JobPayload,
    ) -> Result<Box<dyn JobOutput>, WorkerError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Mock worker behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Return the payload as the result
        Echo,
        /// Return a fixed JSON value
        Return(serde_json::Value),
        /// Always fail with message
        Fail(String),
        /// Panic with message (for panic isolation testing)
        Panic(String),
        /// Return output that cannot be encoded as JSON
        Unencodable,
    }

    /// Mock Job Worker for testing
    pub struct MockWorker {
        behavior: MockBehavior,
        call_count: Arc<AtomicUsize>,
    }

    impl MockWorker {
        pub fn new(behavior: MockBehavior) -> Self {
            Self::with_counter(behavior, Arc::new(AtomicUsize::new(0)))
        }

        /// Share one counter across all workers built by a factory
        pub fn with_counter(behavior: MockBehavior, call_count: Arc<AtomicUsize>) -> Self {
            Self {
                behavior,
                call_count,
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobWorker for MockWorker {
        async fn execute(
            &self,
            _job_id: JobId,
            payload: &JobPayload,
        ) -> Result<Box<dyn JobOutput>, WorkerError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                MockBehavior::Echo => Ok(Box::new(payload.as_value().clone())),
                MockBehavior::Return(value) => Ok(Box::new(value.clone())),
                MockBehavior::Fail(msg) => Err(WorkerError::failed(msg.clone())),
                MockBehavior::Panic(msg) => {
                    panic!("{}", msg); // Actually panic for panic isolation testing
                }
                MockBehavior::Unencodable => {
                    // tuple keys are not valid JSON object keys
                    let mut map: HashMap<(i32, i32), String> = HashMap::new();
                    map.insert((1, 2), "unencodable".to_string());
                    Ok(Box::new(map))
                }
            }
        }
    }
}
