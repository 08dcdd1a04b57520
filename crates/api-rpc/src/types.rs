//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use queueserver_core::domain::{Job, JobId, JobStatus, LogEntry, Priority};
use serde::{Deserialize, Serialize};

/// Params of methods that take none (`{}`, `[]` or absent are all accepted)
pub type NoParams = Option<serde_json::Value>;

/// job.enqueue.v1 - Enqueue a job
///
/// Params are `queueserver_core::application::EnqueueRequest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnqueueResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Params of every method addressing one job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIdRequest {
    pub job_id: JobId,
}

/// job.cancel.v1 - Cancel (delete) a non-running job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

/// job.clone.v1 - Copy a job into a fresh queued row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneRequest {
    pub job_id: JobId,
    #[serde(default)]
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloneResponse {
    pub source_job_id: JobId,
    pub job_id: JobId,
}

/// job.get.v1 - Job detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    pub id: JobId,
    pub worker_type: String,
    pub status: JobStatus,
    pub priority: Priority,
    pub delete_on_finish: bool,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub log_entries: usize,
    pub create_time: i64,
    pub last_update_time: i64,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            worker_type: job.worker_type.as_str().to_string(),
            status: job.status,
            priority: job.priority,
            delete_on_finish: job.delete_on_finish,
            payload: job.payload.into_value(),
            result: job.result,
            log_entries: job.log.len(),
            create_time: job.create_time,
            last_update_time: job.last_update_time,
        }
    }
}

/// job.list.v1 - Paged listing
///
/// Params are `queueserver_core::domain::JobListQuery`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub jobs: Vec<JobView>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
}

/// job.log.v1 - Diagnostic trail of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogResponse {
    pub job_id: JobId,
    pub entries: Vec<LogEntry>,
}

/// job.result.v1 - Result of a terminal job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRequest {
    pub job_id: JobId,
    #[serde(default = "default_delete_job")]
    pub delete_job: bool,
}

fn default_delete_job() -> bool {
    true
}

/// queue.execute_next.v1 - One scheduling cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteNextResponse {
    /// `finished`, `deleted`, `failed`, or `idle` when nothing was queued
    pub outcome: String,
    pub job_id: Option<JobId>,
}

/// queue.drain.v1 - Run cycles until the queue is empty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainResponse {
    pub finished: u64,
    pub deleted: u64,
    pub failed: u64,
    pub errors: u64,
    pub processed: u64,
}

/// admin.cleanup.v1 - Manual retention pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupRequest {
    /// Defaults to the daemon's configured retention
    #[serde(default)]
    pub max_age_days: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub deleted_jobs: u64,
    pub compacted: bool,
    pub reclaimed_mb: f64,
}

/// admin.stats.v1 - Queue and storage statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_jobs: i64,
    pub queued_jobs: i64,
    pub running_jobs: i64,
    pub finished_jobs: i64,
    pub error_jobs: i64,
    pub has_next_job: bool,
    pub db_size_bytes: i64,
    pub worker_types: Vec<String>,
    pub uptime_seconds: i64,
}
