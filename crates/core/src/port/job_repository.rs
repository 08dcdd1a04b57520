// Job Repository Port (Interface)

use crate::domain::{Job, JobId, JobListQuery, JobPage, JobStatus, JobUpdate, NewJob};
use crate::error::{AppError, Result};
use async_trait::async_trait;

/// Repository interface for Job persistence
///
/// Pure CRUD over job rows. Lifecycle rules live in the application layer;
/// the conditional variants exist so those rules can be applied with a
/// single-row write instead of a read-then-write pair.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Insert a new job in `Queued` status; both timestamps are set to now
    async fn insert(&self, job: &NewJob) -> Result<JobId>;

    /// Find job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>>;

    /// Find job by ID, failing with `NotFound` when absent
    async fn fetch_by_id(&self, id: JobId) -> Result<Job> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::job_not_found(id))
    }

    /// Partial update; refreshes `last_update_time` when status or result changes
    async fn update(&self, id: JobId, changes: &JobUpdate) -> Result<()>;

    /// Conditional status change (`WHERE status = from`)
    ///
    /// Returns false when the row was not in `from` (or does not exist).
    async fn transition(&self, id: JobId, from: JobStatus, to: JobStatus) -> Result<bool>;

    /// Store a serialized result unless the job is already terminal
    async fn store_result(&self, id: JobId, result: &serde_json::Value) -> Result<bool>;

    /// Delete a row unconditionally
    async fn delete(&self, id: JobId) -> Result<bool>;

    /// Delete a row unless it is `Running`
    async fn delete_unless_running(&self, id: JobId) -> Result<bool>;

    /// Peek at the next eligible `Queued` job without claiming it
    async fn fetch_next_eligible(&self) -> Result<Option<Job>>;

    /// Atomically claim the next eligible job (`Queued -> Running`)
    ///
    /// Exactly one concurrent caller receives a given row.
    async fn claim_next(&self) -> Result<Option<Job>>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;

    /// Count queued jobs
    async fn count_queued(&self) -> Result<i64> {
        self.count_by_status(JobStatus::Queued).await
    }

    /// Filtered, sorted, paged listing
    async fn list_paged(&self, query: &JobListQuery) -> Result<JobPage>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{DequeueOrder, SortDirection, SortField};
    use crate::port::TimeProvider;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory JobRepository for core tests
    pub struct InMemoryJobRepository {
        rows: Mutex<BTreeMap<JobId, Job>>,
        next_id: Mutex<i64>,
        order: DequeueOrder,
        time_provider: Arc<dyn TimeProvider>,
        fail_writes: AtomicBool,
    }

    impl InMemoryJobRepository {
        pub fn new(time_provider: Arc<dyn TimeProvider>) -> Self {
            Self::with_order(time_provider, DequeueOrder::default())
        }

        pub fn with_order(time_provider: Arc<dyn TimeProvider>, order: DequeueOrder) -> Self {
            Self {
                rows: Mutex::new(BTreeMap::new()),
                next_id: Mutex::new(0),
                order,
                time_provider,
                fail_writes: AtomicBool::new(false),
            }
        }

        /// Make every subsequent write fail with `Persistence`
        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        /// Overwrite a stored row (test setup only)
        pub fn put(&self, job: Job) {
            self.rows.lock().unwrap().insert(job.id, job);
        }

        pub fn len(&self) -> usize {
            self.rows.lock().unwrap().len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }

        fn check_writable(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AppError::Persistence("simulated write failure".into()));
            }
            Ok(())
        }

        fn next_eligible_id(&self, rows: &BTreeMap<JobId, Job>) -> Option<JobId> {
            let queued = rows.values().filter(|j| j.status == JobStatus::Queued);
            let chosen = match self.order {
                // BTreeMap iterates in id order, so the first max wins ties
                DequeueOrder::PriorityFirst => queued.fold(None::<&Job>, |best, j| match best {
                    Some(b) if b.priority >= j.priority => Some(b),
                    _ => Some(j),
                }),
                DequeueOrder::Fifo => queued.min_by_key(|j| j.id),
            };
            chosen.map(|j| j.id)
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryJobRepository {
        async fn insert(&self, job: &NewJob) -> Result<JobId> {
            self.check_writable()?;
            let now = self.time_provider.now_millis();
            let id = {
                let mut next = self.next_id.lock().unwrap();
                *next += 1;
                JobId::new(*next)
            };
            self.rows.lock().unwrap().insert(
                id,
                Job {
                    id,
                    payload: job.payload.clone(),
                    worker_type: job.worker_type.clone(),
                    status: JobStatus::Queued,
                    priority: job.priority,
                    delete_on_finish: job.delete_on_finish,
                    result: None,
                    log: Vec::new(),
                    create_time: now,
                    last_update_time: now,
                },
            );
            Ok(id)
        }

        async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
            Ok(self.rows.lock().unwrap().get(&id).cloned())
        }

        async fn update(&self, id: JobId, changes: &JobUpdate) -> Result<()> {
            self.check_writable()?;
            let now = self.time_provider.now_millis();
            let mut rows = self.rows.lock().unwrap();
            let job = rows.get_mut(&id).ok_or_else(|| AppError::job_not_found(id))?;
            if let Some(status) = changes.status {
                job.status = status;
            }
            if let Some(result) = &changes.result {
                job.result = result.clone();
            }
            if let Some(log) = &changes.log {
                job.log = log.clone();
            }
            if changes.touches_lifecycle() {
                job.last_update_time = now;
            }
            Ok(())
        }

        async fn transition(&self, id: JobId, from: JobStatus, to: JobStatus) -> Result<bool> {
            self.check_writable()?;
            let now = self.time_provider.now_millis();
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&id) {
                Some(job) if job.status == from => {
                    job.status = to;
                    job.last_update_time = now;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn store_result(&self, id: JobId, result: &serde_json::Value) -> Result<bool> {
            self.check_writable()?;
            let now = self.time_provider.now_millis();
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&id) {
                Some(job) if !job.is_terminal() => {
                    job.result = Some(result.clone());
                    job.last_update_time = now;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn delete(&self, id: JobId) -> Result<bool> {
            self.check_writable()?;
            Ok(self.rows.lock().unwrap().remove(&id).is_some())
        }

        async fn delete_unless_running(&self, id: JobId) -> Result<bool> {
            self.check_writable()?;
            let mut rows = self.rows.lock().unwrap();
            match rows.get(&id) {
                Some(job) if job.status != JobStatus::Running => {
                    rows.remove(&id);
                    Ok(true)
                }
                _ => Ok(false),
            }
        }

        async fn fetch_next_eligible(&self) -> Result<Option<Job>> {
            let rows = self.rows.lock().unwrap();
            Ok(self
                .next_eligible_id(&rows)
                .and_then(|id| rows.get(&id).cloned()))
        }

        async fn claim_next(&self) -> Result<Option<Job>> {
            self.check_writable()?;
            let now = self.time_provider.now_millis();
            let mut rows = self.rows.lock().unwrap();
            let Some(id) = self.next_eligible_id(&rows) else {
                return Ok(None);
            };
            let job = rows.get_mut(&id).expect("eligible id present");
            job.status = JobStatus::Running;
            job.last_update_time = now;
            Ok(Some(job.clone()))
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            let rows = self.rows.lock().unwrap();
            Ok(rows.values().filter(|j| j.status == status).count() as i64)
        }

        async fn list_paged(&self, query: &JobListQuery) -> Result<JobPage> {
            let rows = self.rows.lock().unwrap();
            let mut jobs: Vec<Job> = rows
                .values()
                .filter(|j| query.status.map_or(true, |s| j.status == s))
                .filter(|j| {
                    query
                        .worker_type
                        .as_deref()
                        .map_or(true, |w| j.worker_type.as_str() == w)
                })
                .cloned()
                .collect();
            let total = jobs.len() as i64;

            jobs.sort_by(|a, b| {
                let ord = match query.sort_field {
                    SortField::Id => a.id.cmp(&b.id),
                    SortField::WorkerType => a.worker_type.as_str().cmp(b.worker_type.as_str()),
                    SortField::Priority => a.priority.cmp(&b.priority),
                    SortField::Status => a.status.code().cmp(&b.status.code()),
                    SortField::CreateTime => a.create_time.cmp(&b.create_time),
                    SortField::LastUpdateTime => a.last_update_time.cmp(&b.last_update_time),
                };
                let ord = ord.then(a.id.cmp(&b.id));
                match query.sort_direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });

            let jobs = jobs
                .into_iter()
                .skip(query.offset() as usize)
                .take(query.limit() as usize)
                .collect();
            Ok(JobPage { jobs, total })
        }
    }
}
