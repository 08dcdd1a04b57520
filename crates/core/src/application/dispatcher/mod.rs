// Dispatcher - poll / execute / report cycle

pub mod constants;
mod panic_guard;
mod shutdown;

use constants::*;
pub use panic_guard::{describe_join_error, panic_message};
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::job_service::JobService;
use crate::application::registry::WorkerRegistry;
use crate::domain::{Job, JobId, JobStatus};
use crate::error::{AppError, ErrorKind, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// How a single claimed job ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "job_id", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Worker succeeded, result stored, status `Finished`
    Finished(JobId),
    /// Worker succeeded on a `delete_on_finish` job; row removed
    Deleted(JobId),
    /// Worker failed, panicked, or its result could not be stored; status `Error`
    Failed(JobId),
}

/// Tally of one drain pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub finished: u64,
    pub deleted: u64,
    pub failed: u64,
    /// Cycles that raised (e.g. unknown worker type) and were skipped
    pub errors: u64,
}

impl DrainReport {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Finished(_) => self.finished += 1,
            DispatchOutcome::Deleted(_) => self.deleted += 1,
            DispatchOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn processed(&self) -> u64 {
        self.finished + self.deleted + self.failed + self.errors
    }
}

/// Single consumer of the job queue
pub struct Dispatcher {
    jobs: Arc<JobService>,
    registry: Arc<WorkerRegistry>,
    poll_interval: Duration,
}

impl Dispatcher {
    pub fn new(jobs: Arc<JobService>, registry: Arc<WorkerRegistry>) -> Self {
        Self {
            jobs,
            registry,
            poll_interval: IDLE_SLEEP_DURATION,
        }
    }

    /// Idle sleep between polls of an empty queue (floored at `MIN_POLL_INTERVAL`)
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
        self
    }

    /// Run one cycle: claim, resolve, execute, report
    ///
    /// `Ok(None)` means the queue was empty. Worker failures end as
    /// `DispatchOutcome::Failed`; store failures and unknown worker types
    /// are returned as errors. Once a job is claimed it never stays
    /// `Running` on an error path unless the store rejects the final
    /// `Error` write as well.
    pub async fn execute_next(&self) -> Result<Option<DispatchOutcome>> {
        // Claimed atomically: the row is already RUNNING
        let job = match self.jobs.repository().claim_next().await? {
            Some(j) => j,
            None => return Ok(None),
        };
        let job_id = job.id;

        info!(job_id = %job_id, worker_type = %job.worker_type, "Processing job");

        match self.process_claimed(job).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                self.fail_after_claim(job_id, &e).await;
                Err(e)
            }
        }
    }

    async fn process_claimed(&self, job: Job) -> Result<DispatchOutcome> {
        let job_id = job.id;

        let worker = match self.registry.resolve(&job.worker_type) {
            Ok(w) => w,
            Err(e) => {
                // Consumed rather than left QUEUED, so it cannot block the queue forever
                warn!(job_id = %job_id, error = %e, "Job has no registered worker");
                return Err(e);
            }
        };

        // Spawned so a panicking worker cannot take the consumer down
        let payload = job.payload;
        let handle =
            tokio::task::spawn(async move { worker.execute(job_id, &payload).await });

        let output = match handle.await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(job_id = %job_id, error = %e, "Job failed");
                self.fail_job(job_id, format!("Worker failed: {}", e)).await?;
                return Ok(DispatchOutcome::Failed(job_id));
            }
            Err(join_err) => {
                let detail = describe_join_error(join_err);
                error!(job_id = %job_id, detail = %detail, "Job aborted");
                self.fail_job(job_id, detail).await?;
                return Ok(DispatchOutcome::Failed(job_id));
            }
        };

        if job.delete_on_finish {
            self.jobs.repository().delete(job_id).await?;
            info!(job_id = %job_id, "Job completed and removed");
            return Ok(DispatchOutcome::Deleted(job_id));
        }

        if !self.jobs.set_result(job_id, output.as_ref()).await? {
            self.jobs.set_status(job_id, JobStatus::Error).await?;
            return Ok(DispatchOutcome::Failed(job_id));
        }

        self.jobs.set_status(job_id, JobStatus::Finished).await?;
        info!(job_id = %job_id, "Job completed");
        Ok(DispatchOutcome::Finished(job_id))
    }

    /// Best-effort `Error` for a claimed job whose cycle raised `cause`
    ///
    /// Skipped when the row is already terminal or gone.
    async fn fail_after_claim(&self, job_id: JobId, cause: &AppError) {
        match self.jobs.repository().find_by_id(job_id).await {
            Ok(Some(job)) if job.status == JobStatus::Running => {}
            Ok(_) => return,
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Could not inspect job after failed cycle");
                return;
            }
        }

        if let Err(e) = self.fail_job(job_id, cause.to_string()).await {
            error!(
                job_id = %job_id,
                cause = %cause,
                error = %e,
                "Job left RUNNING: failure could not be recorded"
            );
        }
    }

    /// Execute jobs until none is eligible
    ///
    /// Per-job errors are logged and skipped; a persistence error aborts the
    /// drain because the next cycle would hit the same store.
    pub async fn drain(&self) -> Result<DrainReport> {
        let mut report = DrainReport::default();

        loop {
            match self.execute_next().await {
                Ok(None) => break,
                Ok(Some(outcome)) => report.record(outcome),
                Err(e) if e.kind() == ErrorKind::Persistence => {
                    error!(error = %e, "Drain aborted by store failure");
                    return Err(e);
                }
                Err(e) => {
                    report.errors += 1;
                    error!(error = %e, "Job cycle failed, continuing drain");
                }
            }
        }

        info!(
            finished = report.finished,
            deleted = report.deleted,
            failed = report.failed,
            errors = report.errors,
            "Queue drained"
        );
        Ok(report)
    }

    /// Polling consumer loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(poll_interval_ms = self.poll_interval.as_millis() as u64, "Consumer started");
        loop {
            if shutdown.is_shutdown() {
                info!("Consumer shutting down");
                break;
            }
            match self.execute_next().await {
                Ok(Some(_)) => {}
                Ok(None) => {
                    tokio::select! {
                        _ = sleep(self.poll_interval) => {},
                        _ = shutdown.wait() => {
                            info!("Consumer interrupted during idle");
                            break;
                        }
                    }
                }
                Err(e) if e.kind() == ErrorKind::Persistence => {
                    error!(error = %e, "Consumer error");
                    tokio::select! {
                        _ = sleep(ERROR_RECOVERY_SLEEP_DURATION) => {},
                        _ = shutdown.wait() => {
                            info!("Consumer interrupted during error recovery");
                            break;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Job cycle failed"),
            }
        }
        info!("Consumer stopped");
        Ok(())
    }

    /// Record the failure in the job log, then mark it `Error`
    async fn fail_job(&self, job_id: JobId, detail: String) -> Result<()> {
        self.jobs.append_log(job_id, detail).await?;
        self.jobs.set_status(job_id, JobStatus::Error).await
    }
}
