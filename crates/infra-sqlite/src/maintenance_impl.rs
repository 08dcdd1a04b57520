// SQLite Maintenance Implementation
use crate::error::map_sqlx_error;
use async_trait::async_trait;
use queueserver_core::domain::JobStatus;
use queueserver_core::error::{AppError, Result};
use queueserver_core::port::{Maintenance, MaintenanceStats, TimeProvider};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// SQLite maintenance implementation
pub struct SqliteMaintenance {
    pool: SqlitePool,
    time_provider: Arc<dyn TimeProvider>,
}

impl SqliteMaintenance {
    pub fn new(pool: SqlitePool, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            pool,
            time_provider,
        }
    }

    /// Get DB size in bytes
    async fn get_db_size(&self) -> Result<i64> {
        // Query database page count and page size
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(page_count * page_size)
    }

    async fn count(&self, status: JobStatus) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = ?")
            .bind(status.code())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

fn to_mb(bytes: i64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

#[async_trait]
impl Maintenance for SqliteMaintenance {
    async fn cleanup(&self, max_age_days: i64) -> Result<u64> {
        if max_age_days < 0 {
            return Err(AppError::Validation(format!(
                "max_age_days must not be negative (got {})",
                max_age_days
            )));
        }

        let now = self.time_provider.now_millis();
        let cutoff_time = now.saturating_sub(max_age_days.saturating_mul(MILLIS_PER_DAY));

        info!(
            max_age_days = max_age_days,
            cutoff_time = cutoff_time,
            "Running terminal job cleanup"
        );

        // Only FINISHED/ERROR rows are eligible; QUEUED/RUNNING are kept at any age
        let result = sqlx::query(
            r#"
            DELETE FROM jobs
            WHERE status IN (?, ?)
              AND last_update_time < ?
            "#,
        )
        .bind(JobStatus::Finished.code())
        .bind(JobStatus::Error.code())
        .bind(cutoff_time)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let deleted = result.rows_affected();
        info!(deleted_jobs = deleted, "Terminal job cleanup completed");

        Ok(deleted)
    }

    async fn compact(&self) -> Result<f64> {
        info!("Running VACUUM to optimize database...");

        // Get size before VACUUM
        let size_before = self.get_db_size().await?;

        // Run VACUUM (reclaims space and defragments)
        sqlx::query("VACUUM")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let size_after = self.get_db_size().await?;
        let reclaimed = to_mb((size_before - size_after).max(0));

        info!(
            size_before_mb = to_mb(size_before),
            size_after_mb = to_mb(size_after),
            reclaimed_mb = reclaimed,
            "VACUUM completed"
        );

        Ok(reclaimed)
    }

    async fn get_stats(&self) -> Result<MaintenanceStats> {
        let db_size_bytes = self.get_db_size().await?;

        let job_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(MaintenanceStats {
            db_size_mb: to_mb(db_size_bytes),
            db_size_bytes,
            job_count,
            queued_job_count: self.count(JobStatus::Queued).await?,
            running_job_count: self.count(JobStatus::Running).await?,
            finished_job_count: self.count(JobStatus::Finished).await?,
            error_job_count: self.count(JobStatus::Error).await?,
        })
    }
}
