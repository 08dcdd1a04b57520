// Job Service - lifecycle guards, results and logs on top of the store

pub mod enqueue;

pub use enqueue::{validate_request, EnqueueRequest};

use crate::domain::{
    Job, JobId, JobListQuery, JobPage, JobStatus, JobUpdate, LogEntry, NewJob, Priority,
};
use crate::error::{AppError, Result};
use crate::port::{JobOutput, JobRepository, TimeProvider};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a terminal job as handed to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResultView {
    pub id: JobId,
    pub status: JobStatus,
    pub result: Option<serde_json::Value>,
}

/// Job Service
///
/// Every admin/RPC operation and every dispatcher write goes through here,
/// so the lifecycle guards are applied in one place.
pub struct JobService {
    job_repo: Arc<dyn JobRepository>,
    time_provider: Arc<dyn TimeProvider>,
}

impl JobService {
    pub fn new(job_repo: Arc<dyn JobRepository>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            job_repo,
            time_provider,
        }
    }

    pub fn repository(&self) -> &Arc<dyn JobRepository> {
        &self.job_repo
    }

    /// Enqueue a new job
    pub async fn enqueue(&self, req: EnqueueRequest) -> Result<JobId> {
        enqueue::execute(self.job_repo.as_ref(), req).await
    }

    pub async fn get_job(&self, id: JobId) -> Result<Job> {
        self.job_repo.fetch_by_id(id).await
    }

    pub async fn status(&self, id: JobId) -> Result<JobStatus> {
        Ok(self.job_repo.fetch_by_id(id).await?.status)
    }

    pub async fn list_jobs(&self, query: &JobListQuery) -> Result<JobPage> {
        self.job_repo.list_paged(query).await
    }

    pub async fn count_queued(&self) -> Result<i64> {
        self.job_repo.count_queued().await
    }

    pub async fn has_next_job(&self) -> Result<bool> {
        Ok(self.job_repo.count_queued().await? > 0)
    }

    /// Cancel (delete) a job that is not running
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        for _ in 0..2 {
            if self.job_repo.delete_unless_running(id).await? {
                info!(job_id = %id, "Job cancelled");
                return Ok(());
            }
            match self.job_repo.find_by_id(id).await? {
                None => return Err(AppError::job_not_found(id)),
                Some(job) if job.status == JobStatus::Running => {
                    return Err(AppError::InvalidTransition(format!(
                        "job {} is running and cannot be cancelled",
                        id
                    )));
                }
                // Finished between the two statements; try once more
                Some(_) => continue,
            }
        }
        Err(AppError::Internal(format!("job {} could not be cancelled", id)))
    }

    /// Re-queue a copy of an existing job under a new id
    ///
    /// The source row is only read; its status and result are ignored.
    pub async fn clone_job(&self, id: JobId, priority: Priority) -> Result<JobId> {
        let source = self.job_repo.fetch_by_id(id).await?;

        let copy = NewJob::new(source.worker_type, source.payload)
            .with_priority(priority)
            .delete_on_finish(source.delete_on_finish);

        let new_id = self.job_repo.insert(&copy).await?;
        info!(source_id = %id, job_id = %new_id, priority = priority, "Job cloned");
        Ok(new_id)
    }

    /// Move a job to `status`
    ///
    /// Same-status requests succeed without touching the row. The write is a
    /// single conditional update on the status read just before.
    pub async fn set_status(&self, id: JobId, status: JobStatus) -> Result<()> {
        let job = self.job_repo.fetch_by_id(id).await?;
        if job.status == status {
            return Ok(());
        }
        if !job.status.can_transition_to(status) {
            return Err(AppError::transition(id, job.status, status));
        }

        if self.job_repo.transition(id, job.status, status).await? {
            debug!(job_id = %id, from = %job.status, to = %status, "Job status changed");
            return Ok(());
        }

        // Lost a race against another writer
        let current = self.job_repo.fetch_by_id(id).await?;
        if current.status == status {
            Ok(())
        } else {
            Err(AppError::transition(id, current.status, status))
        }
    }

    /// Persist a worker's output as the job result
    ///
    /// Returns `Ok(false)` when the output cannot be encoded; the failure is
    /// recorded in the job log and the caller decides the final status.
    pub async fn set_result(&self, id: JobId, output: &dyn JobOutput) -> Result<bool> {
        let job = self.job_repo.fetch_by_id(id).await?;
        ensure_result_writable(&job)?;

        let value = match output.to_json() {
            Ok(value) => value,
            Err(e) => {
                warn!(job_id = %id, error = %e, "Job result could not be serialized");
                self.append_log(id, format!("Result serialization failed: {}", e))
                    .await?;
                return Ok(false);
            }
        };

        if self.job_repo.store_result(id, &value).await? {
            return Ok(true);
        }

        // Row moved to a terminal status (or vanished) in the meantime
        let current = self.job_repo.fetch_by_id(id).await?;
        ensure_result_writable(&current)?;
        Err(AppError::Internal(format!(
            "result of job {} was not stored",
            id
        )))
    }

    /// Append one entry to the job log (full read-modify-write of the log column)
    pub async fn append_log(&self, id: JobId, message: impl Into<String>) -> Result<()> {
        let job = self.job_repo.fetch_by_id(id).await?;
        let mut log = job.log;
        log.push(LogEntry::new(self.time_provider.now_millis(), message));
        self.job_repo.update(id, &JobUpdate::log(log)).await
    }

    /// Log entries, oldest first
    pub async fn get_log(&self, id: JobId) -> Result<Vec<LogEntry>> {
        Ok(self.job_repo.fetch_by_id(id).await?.log)
    }

    /// Result of a terminal job, optionally deleting the row afterwards
    pub async fn get_result(&self, id: JobId, delete_job: bool) -> Result<JobResultView> {
        let job = self.job_repo.fetch_by_id(id).await?;

        match job.status {
            JobStatus::Queued => {
                return Err(AppError::JobNotTerminal(format!(
                    "job {} is still queued",
                    id
                )))
            }
            JobStatus::Running => {
                return Err(AppError::JobNotTerminal(format!(
                    "job {} is still running",
                    id
                )))
            }
            JobStatus::Finished | JobStatus::Error => {}
        }

        if delete_job {
            self.job_repo.delete(id).await?;
            debug!(job_id = %id, "Job deleted after result fetch");
        }

        Ok(JobResultView {
            id,
            status: job.status,
            result: job.result,
        })
    }
}

fn ensure_result_writable(job: &Job) -> Result<()> {
    match job.status {
        JobStatus::Finished => Err(AppError::InvalidTransition(format!(
            "job {} is already finished; its result cannot be changed",
            job.id
        ))),
        JobStatus::Error => Err(AppError::InvalidTransition(format!(
            "job {} ended with an error; its result cannot be set",
            job.id
        ))),
        JobStatus::Queued | JobStatus::Running => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::port::job_repository::mocks::InMemoryJobRepository;
    use crate::port::time_provider::mocks::ManualTimeProvider;
    use crate::port::worker::mocks::{MockBehavior, MockWorker};
    use crate::port::JobWorker;
    use serde_json::json;

    fn setup() -> (JobService, Arc<InMemoryJobRepository>, Arc<ManualTimeProvider>) {
        let clock = Arc::new(ManualTimeProvider::new(1_000));
        let repo = Arc::new(InMemoryJobRepository::new(clock.clone()));
        let service = JobService::new(repo.clone(), clock.clone());
        (service, repo, clock)
    }

    #[tokio::test]
    async fn test_enqueue_assigns_fresh_ids() {
        let (service, _, _) = setup();

        let a = service.enqueue(EnqueueRequest::new("echo", json!(1))).await.unwrap();
        let b = service.enqueue(EnqueueRequest::new("echo", json!(2))).await.unwrap();
        assert_ne!(a, b);

        let job = service.get_job(b).await.unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.create_time, job.last_update_time);
        assert!(job.log.is_empty());
        assert!(job.result.is_none());
    }

    #[tokio::test]
    async fn test_cancel_running_job_fails() {
        let (service, _, _) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();
        service.set_status(id, JobStatus::Running).await.unwrap();

        let err = service.cancel(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert_eq!(service.status(id).await.unwrap(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_cancel_queued_job_deletes_it() {
        let (service, _, _) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();

        service.cancel(id).await.unwrap();
        let err = service.get_job(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = service.cancel(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_set_status_same_value_is_noop() {
        let (service, _, clock) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();

        clock.advance(500);
        service.set_status(id, JobStatus::Queued).await.unwrap();
        let job = service.get_job(id).await.unwrap();
        assert_eq!(job.last_update_time, 1_000);

        service.set_status(id, JobStatus::Running).await.unwrap();
        let job = service.get_job(id).await.unwrap();
        assert_eq!(job.last_update_time, 1_500);
    }

    #[tokio::test]
    async fn test_terminal_job_cannot_go_back() {
        let (service, _, _) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();
        service.set_status(id, JobStatus::Running).await.unwrap();
        service.set_status(id, JobStatus::Error).await.unwrap();

        for next in [JobStatus::Queued, JobStatus::Running, JobStatus::Finished] {
            let err = service.set_status(id, next).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        }
        assert_eq!(service.status(id).await.unwrap(), JobStatus::Error);
    }

    #[tokio::test]
    async fn test_set_result_on_terminal_job_fails() {
        let (service, _, _) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();
        service.set_status(id, JobStatus::Running).await.unwrap();
        assert!(service.set_result(id, &json!({"v": 1})).await.unwrap());
        service.set_status(id, JobStatus::Finished).await.unwrap();

        let err = service.set_result(id, &json!({"v": 2})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidTransition);
        assert!(err.to_string().contains("already finished"));

        let job = service.get_job(id).await.unwrap();
        assert_eq!(job.result, Some(json!({"v": 1})));

        let failed = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();
        service.set_status(failed, JobStatus::Running).await.unwrap();
        service.set_status(failed, JobStatus::Error).await.unwrap();
        let err = service.set_result(failed, &json!(1)).await.unwrap_err();
        assert!(err.to_string().contains("ended with an error"));
    }

    #[tokio::test]
    async fn test_set_result_serialization_failure_is_logged() {
        let (service, _, _) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();
        service.set_status(id, JobStatus::Running).await.unwrap();

        let output = MockWorker::new(MockBehavior::Unencodable)
            .execute(id, &crate::domain::JobPayload::new(json!({})))
            .await
            .unwrap();

        let stored = service.set_result(id, output.as_ref()).await.unwrap();
        assert!(!stored);

        let log = service.get_log(id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].message.contains("Result serialization failed"));
        assert!(service.get_job(id).await.unwrap().result.is_none());
    }

    #[tokio::test]
    async fn test_get_result_requires_terminal_status() {
        let (service, _, _) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();

        let err = service.get_result(id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JobNotTerminal);
        assert!(err.to_string().contains("still queued"));

        service.set_status(id, JobStatus::Running).await.unwrap();
        let err = service.get_result(id, false).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::JobNotTerminal);
        assert!(err.to_string().contains("still running"));
    }

    #[tokio::test]
    async fn test_get_result_with_delete_is_read_once() {
        let (service, _, _) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();
        service.set_status(id, JobStatus::Running).await.unwrap();
        service.set_result(id, &json!({"answer": 42})).await.unwrap();
        service.set_status(id, JobStatus::Finished).await.unwrap();

        let view = service.get_result(id, false).await.unwrap();
        assert_eq!(view.result, Some(json!({"answer": 42})));

        let view = service.get_result(id, true).await.unwrap();
        assert_eq!(view.status, JobStatus::Finished);
        assert_eq!(view.result, Some(json!({"answer": 42})));

        let err = service.get_result(id, true).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_append_log_keeps_order() {
        let (service, _, clock) = setup();
        let id = service.enqueue(EnqueueRequest::new("echo", json!({}))).await.unwrap();

        service.append_log(id, "first").await.unwrap();
        clock.advance(10);
        service.append_log(id, "second").await.unwrap();

        let log = service.get_log(id).await.unwrap();
        let messages: Vec<&str> = log.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
        assert!(log[0].timestamp < log[1].timestamp);

        // Log appends alone do not count as lifecycle updates
        assert_eq!(service.get_job(id).await.unwrap().last_update_time, 1_000);
    }

    #[tokio::test]
    async fn test_clone_copies_work_not_state() {
        let (service, _, _) = setup();
        let id = service
            .enqueue(EnqueueRequest::new("mail", json!({"to": "a@b.c"})).with_priority(3))
            .await
            .unwrap();
        service.set_status(id, JobStatus::Running).await.unwrap();
        service.set_result(id, &json!("sent")).await.unwrap();
        service.set_status(id, JobStatus::Finished).await.unwrap();
        let before = service.get_job(id).await.unwrap();

        let copy_id = service.clone_job(id, 9).await.unwrap();
        assert_ne!(copy_id, id);

        let copy = service.get_job(copy_id).await.unwrap();
        assert_eq!(copy.worker_type, before.worker_type);
        assert_eq!(copy.payload, before.payload);
        assert_eq!(copy.priority, 9);
        assert_eq!(copy.status, JobStatus::Queued);
        assert!(copy.result.is_none());

        let after = service.get_job(id).await.unwrap();
        assert_eq!(after.status, JobStatus::Finished);
        assert_eq!(after.priority, 3);
        assert_eq!(after.result, before.result);
    }

    #[tokio::test]
    async fn test_clone_unknown_job_is_not_found() {
        let (service, repo, _) = setup();
        let err = service.clone_job(JobId::new(404), 1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(repo.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_write_failure_is_persistence_error() {
        let (service, repo, _) = setup();
        repo.set_fail_writes(true);
        let err = service
            .enqueue(EnqueueRequest::new("echo", json!({})))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Persistence);
    }
}
