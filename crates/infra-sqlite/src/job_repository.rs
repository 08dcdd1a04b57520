// SQLite JobRepository Implementation

use crate::error::map_sqlx_error;
use async_trait::async_trait;
use queueserver_core::domain::{
    DequeueOrder, Job, JobId, JobListQuery, JobPage, JobPayload, JobStatus, JobUpdate, LogEntry,
    NewJob, WorkerType,
};
use queueserver_core::error::{AppError, Result};
use queueserver_core::port::{JobRepository, TimeProvider};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;
use tracing::debug;

pub struct SqliteJobRepository {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
    order: DequeueOrder,
}

impl SqliteJobRepository {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self::with_order(pool, time_provider, DequeueOrder::default())
    }

    pub fn with_order(
        pool: SqlitePool,
        time_provider: Arc<dyn TimeProvider>,
        order: DequeueOrder,
    ) -> Self {
        Self {
            pool,
            time_provider,
            order,
        }
    }

    pub fn dequeue_order(&self) -> DequeueOrder {
        self.order
    }

    fn order_clause(&self) -> &'static str {
        match self.order {
            DequeueOrder::PriorityFirst => "priority DESC, id ASC",
            DequeueOrder::Fifo => "id ASC, priority DESC",
        }
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, query: &JobListQuery) {
    qb.push(" WHERE 1 = 1");
    if let Some(status) = query.status {
        qb.push(" AND status = ").push_bind(status.code());
    }
    if let Some(worker_type) = &query.worker_type {
        qb.push(" AND worker_type = ").push_bind(worker_type.clone());
    }
}

#[async_trait]
impl JobRepository for SqliteJobRepository {
    async fn insert(&self, job: &NewJob) -> Result<JobId> {
        let now = self.time_provider.now_millis();

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO jobs (
                payload, worker_type, status, priority, delete_on_finish,
                result, log, create_time, last_update_time
            ) VALUES (?, ?, ?, ?, ?, NULL, '[]', ?, ?)
            RETURNING id
            "#,
        )
        .bind(job.payload.as_value().to_string())
        .bind(job.worker_type.as_str())
        .bind(JobStatus::Queued.code())
        .bind(job.priority)
        .bind(job.delete_on_finish)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(JobId::new(id))
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn update(&self, id: JobId, changes: &JobUpdate) -> Result<()> {
        if changes.is_empty() {
            return self.fetch_by_id(id).await.map(|_| ());
        }

        let now = self.time_provider.now_millis();
        let log_json = changes
            .log
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let mut qb = QueryBuilder::<Sqlite>::new("UPDATE jobs SET ");
        let mut set = qb.separated(", ");
        if let Some(status) = changes.status {
            set.push("status = ").push_bind_unseparated(status.code());
        }
        if let Some(result) = &changes.result {
            set.push("result = ")
                .push_bind_unseparated(result.as_ref().map(|v| v.to_string()));
        }
        if let Some(log) = log_json {
            set.push("log = ").push_bind_unseparated(log);
        }
        if changes.touches_lifecycle() {
            set.push("last_update_time = ").push_bind_unseparated(now);
        }
        qb.push(" WHERE id = ").push_bind(id.get());

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(AppError::job_not_found(id));
        }
        Ok(())
    }

    async fn transition(&self, id: JobId, from: JobStatus, to: JobStatus) -> Result<bool> {
        // Conditional update: the WHERE clause is the compare-and-swap
        let now = self.time_provider.now_millis();
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = ?, last_update_time = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.code())
        .bind(now)
        .bind(id.get())
        .bind(from.code())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn store_result(&self, id: JobId, result: &serde_json::Value) -> Result<bool> {
        let now = self.time_provider.now_millis();
        let outcome = sqlx::query(
            r#"
            UPDATE jobs
            SET result = ?, last_update_time = ?
            WHERE id = ? AND status NOT IN (?, ?)
            "#,
        )
        .bind(result.to_string())
        .bind(now)
        .bind(id.get())
        .bind(JobStatus::Finished.code())
        .bind(JobStatus::Error.code())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(outcome.rows_affected() == 1)
    }

    async fn delete(&self, id: JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_unless_running(&self, id: JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ? AND status != ?")
            .bind(id.get())
            .bind(JobStatus::Running.code())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() == 1)
    }

    async fn fetch_next_eligible(&self) -> Result<Option<Job>> {
        let sql = format!(
            "SELECT * FROM jobs WHERE status = ? ORDER BY {} LIMIT 1",
            self.order_clause()
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobStatus::Queued.code())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn claim_next(&self) -> Result<Option<Job>> {
        // Select + status flip in one statement; SQLite serializes writers,
        // so two claimers can never receive the same row.
        let now = self.time_provider.now_millis();
        let sql = format!(
            r#"
            UPDATE jobs
            SET status = ?, last_update_time = ?
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = ?
                ORDER BY {}
                LIMIT 1
            )
              AND status = ?
            RETURNING *
            "#,
            self.order_clause()
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(JobStatus::Running.code())
            .bind(now)
            .bind(JobStatus::Queued.code())
            .bind(JobStatus::Queued.code())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = &row {
            debug!(job_id = row.id, worker_type = %row.worker_type, "Claimed job");
        }
        row.map(JobRow::into_job).transpose()
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.code())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }

    async fn list_paged(&self, query: &JobListQuery) -> Result<JobPage> {
        let mut count_qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM jobs");
        push_filters(&mut count_qb, query);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        // Column and direction come from closed enums, never from user text
        let column = query.sort_field.column();
        let direction = query.sort_direction.keyword();

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT * FROM jobs");
        push_filters(&mut qb, query);
        qb.push(format!(
            " ORDER BY {} {}, id {}",
            column, direction, direction
        ));
        qb.push(" LIMIT ").push_bind(i64::from(query.limit()));
        qb.push(" OFFSET ").push_bind(query.offset() as i64);

        let rows: Vec<JobRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let jobs = rows
            .into_iter()
            .map(JobRow::into_job)
            .collect::<Result<Vec<_>>>()?;

        Ok(JobPage { jobs, total })
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    payload: String,
    worker_type: String,
    status: i64,
    priority: i32,
    delete_on_finish: bool,
    result: Option<String>,
    log: String,
    create_time: i64,
    last_update_time: i64,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status = JobStatus::from_code(self.status)?;
        let payload: serde_json::Value = serde_json::from_str(&self.payload)?;
        let result: Option<serde_json::Value> = self
            .result
            .as_deref()
            .map(serde_json::from_str)
            .transpose()?;
        let log: Vec<LogEntry> = serde_json::from_str(&self.log)?;

        Ok(Job {
            id: JobId::new(self.id),
            payload: JobPayload::new(payload),
            worker_type: WorkerType::new(self.worker_type),
            status,
            priority: self.priority,
            delete_on_finish: self.delete_on_finish,
            result,
            log,
            create_time: self.create_time,
            last_update_time: self.last_update_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, database_url, run_migrations};
    use queueserver_core::domain::{SortDirection, SortField};
    use queueserver_core::port::time_provider::mocks::ManualTimeProvider;
    use serde_json::json;
    use std::collections::HashSet;

    async fn setup(order: DequeueOrder) -> (SqliteJobRepository, Arc<ManualTimeProvider>) {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = Arc::new(ManualTimeProvider::new(1_000));
        (
            SqliteJobRepository::with_order(pool, clock.clone(), order),
            clock,
        )
    }

    fn new_job(worker: &str, priority: i32) -> NewJob {
        NewJob::new(WorkerType::new(worker), JobPayload::new(json!({"w": worker})))
            .with_priority(priority)
    }

    #[tokio::test]
    async fn test_insert_and_find() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;

        let id = repo
            .insert(&new_job("echo", 3).delete_on_finish(true))
            .await
            .unwrap();
        let job = repo.find_by_id(id).await.unwrap().unwrap();

        assert_eq!(job.id, id);
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.priority, 3);
        assert!(job.delete_on_finish);
        assert_eq!(job.payload.as_value(), &json!({"w": "echo"}));
        assert_eq!(job.result, None);
        assert!(job.log.is_empty());
        assert_eq!(job.create_time, 1_000);
        assert_eq!(job.last_update_time, 1_000);
    }

    #[tokio::test]
    async fn test_ids_are_increasing() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let a = repo.insert(&new_job("echo", 1)).await.unwrap();
        let b = repo.insert(&new_job("echo", 1)).await.unwrap();
        assert!(b > a);
    }

    #[tokio::test]
    async fn test_find_missing_is_none() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        assert!(repo.find_by_id(JobId::new(42)).await.unwrap().is_none());
        let err = repo.fetch_by_id(JobId::new(42)).await.unwrap_err();
        assert_eq!(err.kind(), queueserver_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_claim_priority_first() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let a = repo.insert(&new_job("a", 1)).await.unwrap();
        let b = repo.insert(&new_job("b", 5)).await.unwrap();
        let c = repo.insert(&new_job("c", 1)).await.unwrap();

        let mut order = Vec::new();
        for _ in 0..3 {
            order.push(repo.claim_next().await.unwrap().unwrap().id);
        }
        assert_eq!(order, vec![b, a, c]);
        assert!(repo.claim_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_claim_fifo() {
        let (repo, _) = setup(DequeueOrder::Fifo).await;
        assert_eq!(repo.dequeue_order(), DequeueOrder::Fifo);
        let a = repo.insert(&new_job("a", 1)).await.unwrap();
        let b = repo.insert(&new_job("b", 5)).await.unwrap();
        let c = repo.insert(&new_job("c", 1)).await.unwrap();

        assert_eq!(repo.fetch_next_eligible().await.unwrap().unwrap().id, a);
        let mut order = Vec::new();
        while let Some(job) = repo.claim_next().await.unwrap() {
            assert_eq!(job.status, JobStatus::Running);
            order.push(job.id);
        }
        assert_eq!(order, vec![a, b, c]);
    }

    #[tokio::test]
    async fn test_peek_does_not_claim() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let id = repo.insert(&new_job("echo", 1)).await.unwrap();

        let peeked = repo.fetch_next_eligible().await.unwrap().unwrap();
        assert_eq!(peeked.id, id);
        assert_eq!(peeked.status, JobStatus::Queued);
        assert_eq!(repo.count_queued().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_claim_skips_non_queued() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let hi = repo.insert(&new_job("hi", 9)).await.unwrap();
        let lo = repo.insert(&new_job("lo", 1)).await.unwrap();
        assert!(repo
            .transition(hi, JobStatus::Queued, JobStatus::Running)
            .await
            .unwrap());

        assert_eq!(repo.claim_next().await.unwrap().unwrap().id, lo);
    }

    #[tokio::test]
    async fn test_concurrent_claims_are_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let pool = create_pool(&database_url(&dir.path().join("claims.db")))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        let clock = Arc::new(ManualTimeProvider::new(0));
        let repo = Arc::new(SqliteJobRepository::new(pool, clock));

        for i in 0..20 {
            repo.insert(&new_job("echo", i % 3)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                let mut claimed = Vec::new();
                while let Some(job) = repo.claim_next().await.unwrap() {
                    claimed.push(job.id);
                }
                claimed
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "job {} claimed twice", id);
            }
        }
        assert_eq!(seen.len(), 20);
        assert_eq!(repo.count_by_status(JobStatus::Running).await.unwrap(), 20);
    }

    #[tokio::test]
    async fn test_transition_is_conditional() {
        let (repo, clock) = setup(DequeueOrder::PriorityFirst).await;
        let id = repo.insert(&new_job("echo", 1)).await.unwrap();

        clock.advance(50);
        assert!(!repo
            .transition(id, JobStatus::Running, JobStatus::Finished)
            .await
            .unwrap());
        assert!(repo
            .transition(id, JobStatus::Queued, JobStatus::Running)
            .await
            .unwrap());

        let job = repo.fetch_by_id(id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.last_update_time, 1_050);
        assert_eq!(job.create_time, 1_000);
    }

    #[tokio::test]
    async fn test_store_result_refused_once_terminal() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let id = repo.insert(&new_job("echo", 1)).await.unwrap();

        assert!(repo.store_result(id, &json!({"n": 1})).await.unwrap());
        repo.update(id, &JobUpdate::status(JobStatus::Finished))
            .await
            .unwrap();
        assert!(!repo.store_result(id, &json!({"n": 2})).await.unwrap());

        let job = repo.fetch_by_id(id).await.unwrap();
        assert_eq!(job.result, Some(json!({"n": 1})));
    }

    #[tokio::test]
    async fn test_null_result_differs_from_absent() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let id = repo.insert(&new_job("echo", 1)).await.unwrap();

        assert!(repo
            .store_result(id, &serde_json::Value::Null)
            .await
            .unwrap());
        let job = repo.fetch_by_id(id).await.unwrap();
        assert_eq!(job.result, Some(serde_json::Value::Null));

        repo.update(
            id,
            &JobUpdate {
                result: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(repo.fetch_by_id(id).await.unwrap().result, None);
    }

    #[tokio::test]
    async fn test_log_update_keeps_last_update_time() {
        let (repo, clock) = setup(DequeueOrder::PriorityFirst).await;
        let id = repo.insert(&new_job("echo", 1)).await.unwrap();

        clock.advance(500);
        let log = vec![LogEntry::new(1_500, "first"), LogEntry::new(1_500, "second")];
        repo.update(id, &JobUpdate::log(log.clone())).await.unwrap();

        let job = repo.fetch_by_id(id).await.unwrap();
        assert_eq!(job.log, log);
        assert_eq!(job.last_update_time, 1_000);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let err = repo
            .update(JobId::new(7), &JobUpdate::status(JobStatus::Running))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), queueserver_core::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_unless_running() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        let queued = repo.insert(&new_job("echo", 1)).await.unwrap();
        let running = repo.insert(&new_job("echo", 1)).await.unwrap();
        repo.transition(running, JobStatus::Queued, JobStatus::Running)
            .await
            .unwrap();

        assert!(repo.delete_unless_running(queued).await.unwrap());
        assert!(!repo.delete_unless_running(running).await.unwrap());
        assert!(repo.find_by_id(running).await.unwrap().is_some());

        assert!(repo.delete(running).await.unwrap());
        assert!(!repo.delete(running).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_paged_filters_and_sorts() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        for p in [3, 1, 2] {
            repo.insert(&new_job("echo", p)).await.unwrap();
        }
        let shell = repo.insert(&new_job("shell", 9)).await.unwrap();
        repo.transition(shell, JobStatus::Queued, JobStatus::Running)
            .await
            .unwrap();

        let page = repo
            .list_paged(&JobListQuery {
                worker_type: Some("echo".into()),
                sort_field: SortField::Priority,
                sort_direction: SortDirection::Asc,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        let priorities: Vec<i32> = page.jobs.iter().map(|j| j.priority).collect();
        assert_eq!(priorities, vec![1, 2, 3]);

        let running = repo
            .list_paged(&JobListQuery {
                status: Some(JobStatus::Running),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(running.total, 1);
        assert_eq!(running.jobs[0].id, shell);
    }

    #[tokio::test]
    async fn test_list_paged_pages() {
        let (repo, _) = setup(DequeueOrder::PriorityFirst).await;
        for _ in 0..5 {
            repo.insert(&new_job("echo", 1)).await.unwrap();
        }

        let query = JobListQuery {
            sort_direction: SortDirection::Asc,
            page: 2,
            page_size: 2,
            ..Default::default()
        };
        let page = repo.list_paged(&query).await.unwrap();
        assert_eq!(page.total, 5);
        let ids: Vec<i64> = page.jobs.iter().map(|j| j.id.get()).collect();
        assert_eq!(ids, vec![3, 4]);

        let last = repo
            .list_paged(&JobListQuery { page: 3, ..query })
            .await
            .unwrap();
        assert_eq!(last.jobs.len(), 1);
    }
}
