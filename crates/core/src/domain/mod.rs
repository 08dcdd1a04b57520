// Domain Layer - Pure business logic and entities

pub mod error;
pub mod job;
pub mod query;

// Re-exports
pub use error::DomainError;
pub use job::{
    Job, JobId, JobPayload, JobStatus, JobUpdate, LogEntry, NewJob, Priority, WorkerType,
    DEFAULT_PRIORITY,
};
pub use query::{DequeueOrder, JobListQuery, JobPage, SortDirection, SortField, MAX_PAGE_SIZE};
