// Job Domain Model

use crate::domain::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Job ID (auto-assigned by the store, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(i64);

impl JobId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for JobId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Job Status
///
/// `Queued -> Running -> {Finished, Error}`. Terminal rows never move again;
/// repeating a job means cloning it into a new row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Running,
    Finished,
    Error,
}

impl JobStatus {
    pub const ALL: [JobStatus; 4] = [
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Finished,
        JobStatus::Error,
    ];

    /// Small integer code persisted in the `status` column
    pub fn code(self) -> i64 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Running => 1,
            JobStatus::Finished => 2,
            JobStatus::Error => 3,
        }
    }

    pub fn from_code(code: i64) -> Result<Self> {
        match code {
            0 => Ok(JobStatus::Queued),
            1 => Ok(JobStatus::Running),
            2 => Ok(JobStatus::Finished),
            3 => Ok(JobStatus::Error),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "QUEUED",
            JobStatus::Running => "RUNNING",
            JobStatus::Finished => "FINISHED",
            JobStatus::Error => "ERROR",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }

    /// Legal edges of the lifecycle (self-transitions are handled by callers as no-ops)
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Finished)
                | (JobStatus::Running, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "QUEUED" => Ok(JobStatus::Queued),
            "RUNNING" => Ok(JobStatus::Running),
            "FINISHED" => Ok(JobStatus::Finished),
            "ERROR" => Ok(JobStatus::Error),
            _ => Err(DomainError::UnknownStatus(s.to_string())),
        }
    }
}

/// Worker type identifier, resolved through the worker registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerType(String);

impl WorkerType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Priority (higher number = higher priority)
pub type Priority = i32;

/// Priority used when a producer does not specify one
pub const DEFAULT_PRIORITY: Priority = 1;

/// Job Payload (opaque JSON consumed by the worker)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// One line of a job's diagnostic trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: i64, // epoch ms
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: JobPayload,
    pub worker_type: WorkerType,
    pub status: JobStatus,
    pub priority: Priority,
    pub delete_on_finish: bool,

    /// Present only once the job finished successfully
    pub result: Option<serde_json::Value>,
    pub log: Vec<LogEntry>,

    pub create_time: i64,      // epoch ms
    pub last_update_time: i64, // epoch ms
}

impl Job {
    /// Move to `next`, stamping `last_update_time`.
    ///
    /// Returns `Ok(false)` when the job already holds `next` (idempotent no-op).
    pub fn transition_to(&mut self, next: JobStatus, now_millis: i64) -> Result<bool> {
        if self.status == next {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        self.last_update_time = now_millis;
        Ok(true)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Insert request for the store (status and timestamps are assigned by the store)
#[derive(Debug, Clone)]
pub struct NewJob {
    pub payload: JobPayload,
    pub worker_type: WorkerType,
    pub priority: Priority,
    pub delete_on_finish: bool,
}

impl NewJob {
    pub fn new(worker_type: WorkerType, payload: JobPayload) -> Self {
        Self {
            payload,
            worker_type,
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

/// Partial update; `None` leaves a column untouched
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    /// `Some(None)` clears the stored result
    pub result: Option<Option<serde_json::Value>>,
    pub log: Option<Vec<LogEntry>>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn log(log: Vec<LogEntry>) -> Self {
        Self {
            log: Some(log),
            ..Default::default()
        }
    }

    /// Whether this update must refresh `last_update_time`
    pub fn touches_lifecycle(&self) -> bool {
        self.status.is_some() || self.result.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.result.is_none() && self.log.is_none()
    }
}
