// Port Layer - Interfaces for external dependencies

pub mod job_repository;
pub mod maintenance;
pub mod time_provider; // For deterministic testing
pub mod worker;

// Re-exports
pub use job_repository::JobRepository;
pub use maintenance::{CleanupReport, Maintenance, MaintenanceConfig, MaintenanceStats};
pub use time_provider::TimeProvider;
pub use worker::{JobOutput, JobWorker, WorkerError};
