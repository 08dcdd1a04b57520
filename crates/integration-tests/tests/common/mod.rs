//! Shared wiring for the integration tests: a file-backed queue in a temp dir
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use queueserver_core::application::{Dispatcher, JobService, WorkerRegistry};
use queueserver_core::domain::DequeueOrder;
use queueserver_core::port::time_provider::mocks::ManualTimeProvider;
use queueserver_core::port::worker::mocks::{MockBehavior, MockWorker};
use queueserver_infra_sqlite::{
    create_pool, database_url, run_migrations, SqliteJobRepository, SqliteMaintenance,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

pub const START_MILLIS: i64 = 1_700_000_000_000;
pub const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

pub struct Queue {
    pub jobs: Arc<JobService>,
    pub repo: Arc<SqliteJobRepository>,
    pub registry: Arc<WorkerRegistry>,
    pub dispatcher: Dispatcher,
    pub maintenance: Arc<SqliteMaintenance>,
    pub clock: Arc<ManualTimeProvider>,
    pub pool: SqlitePool,
}

impl Queue {
    /// Open (or reopen) the database at `path`
    pub async fn open(path: &Path, order: DequeueOrder, clock: Arc<ManualTimeProvider>) -> Self {
        let pool = create_pool(&database_url(path)).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let repo = Arc::new(SqliteJobRepository::with_order(
            pool.clone(),
            clock.clone(),
            order,
        ));
        let jobs = Arc::new(JobService::new(repo.clone(), clock.clone()));

        let registry = Arc::new(WorkerRegistry::new());
        registry.register("echo", || Box::new(MockWorker::new(MockBehavior::Echo)));
        registry.register("fail", || {
            Box::new(MockWorker::new(MockBehavior::Fail("worker exploded".into())))
        });
        registry.register("panic", || {
            Box::new(MockWorker::new(MockBehavior::Panic("worker panicked".into())))
        });
        registry.register("null", || {
            Box::new(MockWorker::new(MockBehavior::Return(serde_json::Value::Null)))
        });
        registry.register("unencodable", || {
            Box::new(MockWorker::new(MockBehavior::Unencodable))
        });

        let dispatcher = Dispatcher::new(jobs.clone(), registry.clone());
        let maintenance = Arc::new(SqliteMaintenance::new(pool.clone(), clock.clone()));

        Self {
            jobs,
            repo,
            registry,
            dispatcher,
            maintenance,
            clock,
            pool,
        }
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}

/// A temp dir holding one queue database
pub struct TestDb {
    pub dir: TempDir,
}

impl TestDb {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.path().join("queue.db")
    }

    pub async fn open(&self, order: DequeueOrder) -> Queue {
        Queue::open(&self.path(), order, Arc::new(ManualTimeProvider::new(START_MILLIS))).await
    }
}
