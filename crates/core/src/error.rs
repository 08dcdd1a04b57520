// Central Error Type for the Application

use crate::domain::{DomainError, JobId, JobStatus};
use std::fmt;
use thiserror::Error;

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Worker not found: {0}")]
    WorkerNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Job not terminal: {0}")]
    JobNotTerminal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Stable, inspectable error kind (what RPC codes and callers match on)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidTransition,
    WorkerNotFound,
    Serialization,
    Persistence,
    JobNotTerminal,
    Validation,
    Config,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::WorkerNotFound => "worker_not_found",
            ErrorKind::Serialization => "serialization_error",
            ErrorKind::Persistence => "persistence_error",
            ErrorKind::JobNotTerminal => "job_not_terminal",
            ErrorKind::Validation => "validation_error",
            ErrorKind::Config => "config_error",
            ErrorKind::Io => "io_error",
            ErrorKind::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::InvalidTransition(_) => ErrorKind::InvalidTransition,
            AppError::WorkerNotFound(_) => ErrorKind::WorkerNotFound,
            AppError::Serialization(_) => ErrorKind::Serialization,
            AppError::Persistence(_) => ErrorKind::Persistence,
            AppError::JobNotTerminal(_) => ErrorKind::JobNotTerminal,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Io(_) => ErrorKind::Io,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn job_not_found(id: JobId) -> Self {
        AppError::NotFound(format!("Job {} not found", id))
    }

    pub fn transition(id: JobId, from: JobStatus, to: JobStatus) -> Self {
        AppError::InvalidTransition(format!("job {}: {} -> {}", id, from, to))
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidStateTransition { .. } => {
                AppError::InvalidTransition(err.to_string())
            }
            DomainError::UnknownStatus(_) => AppError::Persistence(err.to_string()),
            DomainError::UnknownSortField(_) | DomainError::ValidationError(_) => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

// Note: sqlx::Error conversion is handled in infra-sqlite crate
// by converting to AppError::Persistence(String)
