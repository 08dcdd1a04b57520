// Crash recovery on consumer start-up
use crate::application::job_service::JobService;
use crate::domain::{JobId, JobListQuery, JobStatus, SortDirection, SortField, MAX_PAGE_SIZE};
use std::sync::Arc;
use tracing::{info, warn};

/// Crash recovery service
///
/// With a single consumer per queue, any row still RUNNING when the consumer
/// starts was orphaned by a previous process. Such jobs are not retried
/// (no exactly-once guarantee); they are moved to ERROR with a log entry so
/// they become visible and can be cloned by an operator.
pub struct RecoveryService {
    jobs: Arc<JobService>,
}

impl RecoveryService {
    pub fn new(jobs: Arc<JobService>) -> Self {
        Self { jobs }
    }

    /// Mark orphaned RUNNING jobs as ERROR
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_interrupted_jobs(&self) -> crate::error::Result<usize> {
        let orphaned = self.running_job_ids().await?;
        info!(orphaned = orphaned.len(), "Starting interrupted job recovery");

        let mut recovered_count = 0;
        for id in orphaned {
            warn!(job_id = %id, "Recovering interrupted job");
            self.jobs
                .append_log(id, "Interrupted: consumer stopped while the job was running")
                .await?;
            self.jobs.set_status(id, JobStatus::Error).await?;
            recovered_count += 1;
        }

        info!(recovered_count = recovered_count, "Interrupted job recovery complete");
        Ok(recovered_count)
    }

    async fn running_job_ids(&self) -> crate::error::Result<Vec<JobId>> {
        let mut ids = Vec::new();
        let mut page = 1;
        loop {
            let query = JobListQuery {
                status: Some(JobStatus::Running),
                sort_field: SortField::Id,
                sort_direction: SortDirection::Asc,
                page,
                page_size: MAX_PAGE_SIZE,
                ..Default::default()
            };
            let result = self.jobs.list_jobs(&query).await?;
            let fetched = result.jobs.len();
            ids.extend(result.jobs.into_iter().map(|j| j.id));
            if fetched < MAX_PAGE_SIZE as usize {
                break;
            }
            page += 1;
        }
        Ok(ids)
    }
}
