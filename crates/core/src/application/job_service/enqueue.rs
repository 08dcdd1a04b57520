// Enqueue Use Case

use crate::domain::{JobId, JobPayload, NewJob, Priority, WorkerType, DEFAULT_PRIORITY};
use crate::error::{AppError, Result};
use crate::port::JobRepository;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Longest accepted worker type name
pub const MAX_WORKER_TYPE_LEN: usize = 128;

/// Deepest accepted payload nesting
pub const MAX_PAYLOAD_DEPTH: usize = 32;

/// Enqueue request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueRequest {
    pub worker_type: String,
    pub payload: serde_json::Value,

    #[serde(default = "default_priority")]
    pub priority: Priority,

    #[serde(default)]
    pub delete_on_finish: bool,
}

fn default_priority() -> Priority {
    DEFAULT_PRIORITY
}

impl EnqueueRequest {
    pub fn new(worker_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            worker_type: worker_type.into(),
            payload,
            priority: DEFAULT_PRIORITY,
            delete_on_finish: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn delete_on_finish(mut self, delete_on_finish: bool) -> Self {
        self.delete_on_finish = delete_on_finish;
        self
    }
}

/// Reject requests the store should never see
pub fn validate_request(req: &EnqueueRequest) -> Result<()> {
    let worker_type = req.worker_type.as_str();
    if worker_type.is_empty() {
        return Err(AppError::Validation("worker type must not be empty".into()));
    }
    if worker_type.len() > MAX_WORKER_TYPE_LEN {
        return Err(AppError::Validation(format!(
            "worker type too long ({} > {} chars)",
            worker_type.len(),
            MAX_WORKER_TYPE_LEN
        )));
    }
    if !worker_type
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
    {
        return Err(AppError::Validation(format!(
            "worker type '{}' must be alphanumeric (plus '_', '-', '.', ':')",
            worker_type
        )));
    }
    if json_depth(&req.payload) > MAX_PAYLOAD_DEPTH {
        return Err(AppError::Validation(format!(
            "payload is too deeply nested (max depth {})",
            MAX_PAYLOAD_DEPTH
        )));
    }
    Ok(())
}

fn json_depth(value: &serde_json::Value) -> usize {
    match value {
        serde_json::Value::Array(items) => 1 + items.iter().map(json_depth).max().unwrap_or(0),
        serde_json::Value::Object(map) => 1 + map.values().map(json_depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Execute enqueue use case
pub async fn execute(job_repo: &dyn JobRepository, req: EnqueueRequest) -> Result<JobId> {
    validate_request(&req)?;

    let job = NewJob::new(WorkerType::new(req.worker_type), JobPayload::new(req.payload))
        .with_priority(req.priority)
        .delete_on_finish(req.delete_on_finish);

    let id = job_repo.insert(&job).await?;

    info!(
        job_id = %id,
        worker_type = %job.worker_type,
        priority = job.priority,
        "Job enqueued"
    );

    Ok(id)
}
