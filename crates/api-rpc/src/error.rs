//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use jsonrpsee::types::ErrorObjectOwned;
use queueserver_core::error::{AppError, ErrorKind};
use serde_json::json;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const INVALID_TRANSITION: i32 = 4002;
    pub const JOB_NOT_TERMINAL: i32 = 4003;
    pub const WORKER_NOT_FOUND: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const PERSISTENCE_ERROR: i32 = 5001;
    pub const SYSTEM_ERROR: i32 = 5002;
    pub const SERIALIZATION_ERROR: i32 = 5003;
}

/// Numeric code for an error kind
pub fn code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Validation => code::VALIDATION_ERROR,
        ErrorKind::NotFound => code::NOT_FOUND,
        ErrorKind::InvalidTransition => code::INVALID_TRANSITION,
        ErrorKind::JobNotTerminal => code::JOB_NOT_TERMINAL,
        ErrorKind::WorkerNotFound => code::WORKER_NOT_FOUND,
        ErrorKind::Persistence => code::PERSISTENCE_ERROR,
        ErrorKind::Io => code::SYSTEM_ERROR,
        ErrorKind::Serialization => code::SERIALIZATION_ERROR,
        ErrorKind::Config | ErrorKind::Internal => code::INTERNAL_ERROR,
    }
}

/// Convert AppError to JSON-RPC ErrorObject
///
/// `data.kind` carries the stable error kind for programmatic callers.
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let kind = err.kind();
    ErrorObjectOwned::owned(
        code_for(kind),
        err.to_string(),
        Some(json!({ "kind": kind.as_str() })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use queueserver_core::domain::{JobId, JobStatus};

    #[test]
    fn test_error_mapping() {
        let err = to_rpc_error(AppError::job_not_found(JobId::new(9)));
        assert_eq!(err.code(), code::NOT_FOUND);
        assert!(err.message().contains('9'));
        assert_eq!(
            err.data().map(|d| d.get()),
            Some(r#"{"kind":"not_found"}"#)
        );

        let err = to_rpc_error(AppError::transition(
            JobId::new(1),
            JobStatus::Finished,
            JobStatus::Running,
        ));
        assert_eq!(err.code(), code::INVALID_TRANSITION);

        let err = to_rpc_error(AppError::Persistence("disk full".into()));
        assert_eq!(err.code(), code::PERSISTENCE_ERROR);
    }
}
