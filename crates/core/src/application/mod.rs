// Application Layer - Use Cases and Business Logic

pub mod dispatcher;
pub mod job_service;
pub mod maintenance;
pub mod recovery;
pub mod registry;

// Re-exports
pub use dispatcher::{
    shutdown_channel, DispatchOutcome, Dispatcher, DrainReport, ShutdownSender, ShutdownToken,
};
pub use job_service::{EnqueueRequest, JobResultView, JobService};
pub use maintenance::{MaintenanceScheduler, MAX_CLEANUP_INTERVAL_HOURS};
pub use recovery::RecoveryService;
pub use registry::{WorkerFactory, WorkerRegistry};
