// Echo worker: returns its payload unchanged
use async_trait::async_trait;
use queueserver_core::domain::{JobId, JobPayload};
use queueserver_core::port::{JobOutput, JobWorker, WorkerError};
use tracing::debug;

pub struct EchoWorker;

#[async_trait]
impl JobWorker for EchoWorker {
    async fn execute(
        &self,
        job_id: JobId,
        payload: &JobPayload,
    ) -> Result<Box<dyn JobOutput>, WorkerError> {
        debug!(job_id = %job_id, "Echoing payload");
        Ok(Box::new(payload.as_value().clone()))
    }
}
