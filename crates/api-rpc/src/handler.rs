//! RPC Method Handlers
//!
//! Thin pass-throughs: every rule lives in `JobService` and `Dispatcher`.

use crate::error::to_rpc_error;
use crate::types::{
    CancelResponse, CleanupRequest, CleanupResponse, CloneRequest, CloneResponse, DrainResponse,
    EnqueueResponse, ExecuteNextResponse, JobIdRequest, JobView, ListResponse, LogResponse,
    ResultRequest, StatsResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use queueserver_core::application::{
    DispatchOutcome, Dispatcher, EnqueueRequest, JobResultView, JobService,
    MaintenanceScheduler, WorkerRegistry,
};
use queueserver_core::domain::{JobListQuery, JobStatus, DEFAULT_PRIORITY};
use queueserver_core::port::Maintenance;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

type RpcResult<T> = Result<T, ErrorObjectOwned>;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    jobs: Arc<JobService>,
    dispatcher: Arc<Dispatcher>,
    registry: Arc<WorkerRegistry>,
    maintenance: Arc<dyn Maintenance>,
    cleanup: MaintenanceScheduler,
    start_time: Instant,
}

impl RpcHandler {
    pub fn new(
        jobs: Arc<JobService>,
        dispatcher: Arc<Dispatcher>,
        registry: Arc<WorkerRegistry>,
        maintenance: Arc<dyn Maintenance>,
        cleanup: MaintenanceScheduler,
    ) -> Self {
        Self {
            jobs,
            dispatcher,
            registry,
            maintenance,
            cleanup,
            start_time: Instant::now(),
        }
    }

    /// job.enqueue.v1
    pub async fn enqueue(&self, params: EnqueueRequest) -> RpcResult<EnqueueResponse> {
        let job_id = self.jobs.enqueue(params).await.map_err(to_rpc_error)?;
        Ok(EnqueueResponse {
            job_id,
            status: JobStatus::Queued,
        })
    }

    /// job.cancel.v1
    pub async fn cancel(&self, params: JobIdRequest) -> RpcResult<CancelResponse> {
        self.jobs.cancel(params.job_id).await.map_err(to_rpc_error)?;
        Ok(CancelResponse {
            job_id: params.job_id,
            cancelled: true,
        })
    }

    /// job.clone.v1
    pub async fn clone_job(&self, params: CloneRequest) -> RpcResult<CloneResponse> {
        let priority = params.priority.unwrap_or(DEFAULT_PRIORITY);
        let job_id = self
            .jobs
            .clone_job(params.job_id, priority)
            .await
            .map_err(to_rpc_error)?;
        Ok(CloneResponse {
            source_job_id: params.job_id,
            job_id,
        })
    }

    /// job.get.v1
    pub async fn get_job(&self, params: JobIdRequest) -> RpcResult<JobView> {
        let job = self.jobs.get_job(params.job_id).await.map_err(to_rpc_error)?;
        Ok(job.into())
    }

    /// job.list.v1
    pub async fn list_jobs(&self, params: JobListQuery) -> RpcResult<ListResponse> {
        let page = self.jobs.list_jobs(&params).await.map_err(to_rpc_error)?;
        Ok(ListResponse {
            jobs: page.jobs.into_iter().map(JobView::from).collect(),
            total: page.total,
            page: params.page.max(1),
            page_size: params.limit(),
        })
    }

    /// job.log.v1
    pub async fn get_log(&self, params: JobIdRequest) -> RpcResult<LogResponse> {
        let entries = self.jobs.get_log(params.job_id).await.map_err(to_rpc_error)?;
        Ok(LogResponse {
            job_id: params.job_id,
            entries,
        })
    }

    /// job.result.v1
    pub async fn get_result(&self, params: ResultRequest) -> RpcResult<JobResultView> {
        self.jobs
            .get_result(params.job_id, params.delete_job)
            .await
            .map_err(to_rpc_error)
    }

    /// queue.execute_next.v1
    pub async fn execute_next(&self) -> RpcResult<ExecuteNextResponse> {
        let outcome = self.dispatcher.execute_next().await.map_err(to_rpc_error)?;
        debug!(outcome = ?outcome, "Trigger cycle completed");

        let (outcome, job_id) = match outcome {
            None => ("idle", None),
            Some(DispatchOutcome::Finished(id)) => ("finished", Some(id)),
            Some(DispatchOutcome::Deleted(id)) => ("deleted", Some(id)),
            Some(DispatchOutcome::Failed(id)) => ("failed", Some(id)),
        };
        Ok(ExecuteNextResponse {
            outcome: outcome.to_string(),
            job_id,
        })
    }

    /// queue.drain.v1
    pub async fn drain(&self) -> RpcResult<DrainResponse> {
        let report = self.dispatcher.drain().await.map_err(to_rpc_error)?;
        Ok(DrainResponse {
            finished: report.finished,
            deleted: report.deleted,
            failed: report.failed,
            errors: report.errors,
            processed: report.processed(),
        })
    }

    /// admin.cleanup.v1
    pub async fn cleanup(&self, params: CleanupRequest) -> RpcResult<CleanupResponse> {
        let report = match params.max_age_days {
            Some(days) => self.cleanup.cleanup_now(days).await,
            None => self.cleanup.run_now().await,
        }
        .map_err(to_rpc_error)?;

        Ok(CleanupResponse {
            deleted_jobs: report.deleted_jobs,
            compacted: report.compacted,
            reclaimed_mb: report.reclaimed_mb,
        })
    }

    /// admin.stats.v1
    pub async fn stats(&self) -> RpcResult<StatsResponse> {
        let stats = self.maintenance.get_stats().await.map_err(to_rpc_error)?;
        let has_next_job = self.jobs.has_next_job().await.map_err(to_rpc_error)?;

        Ok(StatsResponse {
            total_jobs: stats.job_count,
            queued_jobs: stats.queued_job_count,
            running_jobs: stats.running_job_count,
            finished_jobs: stats.finished_job_count,
            error_jobs: stats.error_job_count,
            has_next_job,
            db_size_bytes: stats.db_size_bytes,
            worker_types: self.registry.worker_types(),
            uptime_seconds: self.start_time.elapsed().as_secs() as i64,
        })
    }
}
