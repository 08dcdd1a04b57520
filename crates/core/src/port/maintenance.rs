// Retention & storage maintenance port
use crate::error::Result;
use async_trait::async_trait;

/// Database maintenance statistics
#[derive(Debug, Clone, Default)]
pub struct MaintenanceStats {
    pub db_size_mb: f64,
    pub db_size_bytes: i64,
    pub job_count: i64,
    pub queued_job_count: i64,
    pub running_job_count: i64,
    pub finished_job_count: i64,
    pub error_job_count: i64,
}

/// Maintenance configuration
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// Retention period for terminal jobs (days)
    pub retention_days: i64,

    /// Run VACUUM after a cleanup that removed rows
    pub compact_after_cleanup: bool,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            retention_days: 7, // Keep terminal jobs for 7 days
            compact_after_cleanup: true,
        }
    }
}

/// Outcome of one retention pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanupReport {
    pub deleted_jobs: u64,
    pub compacted: bool,
    pub reclaimed_mb: f64,
}

/// Database maintenance operations
#[async_trait]
pub trait Maintenance: Send + Sync {
    /// Delete `Finished`/`Error` jobs whose last update is older than `max_age_days`
    ///
    /// `Queued` and `Running` rows are never touched, whatever their age.
    ///
    /// # Returns
    /// Number of jobs deleted
    async fn cleanup(&self, max_age_days: i64) -> Result<u64>;

    /// Reclaim storage (backend-dependent compaction)
    ///
    /// # Returns
    /// Space reclaimed in MB
    async fn compact(&self) -> Result<f64>;

    /// Get maintenance statistics
    async fn get_stats(&self) -> Result<MaintenanceStats>;

    /// Cleanup followed by the compaction hint
    async fn run_retention(&self, config: &MaintenanceConfig) -> Result<CleanupReport> {
        let deleted_jobs = self.cleanup(config.retention_days).await?;

        let (compacted, reclaimed_mb) = if config.compact_after_cleanup && deleted_jobs > 0 {
            (true, self.compact().await?)
        } else {
            (false, 0.0)
        };

        tracing::info!(
            deleted_jobs = deleted_jobs,
            compacted = compacted,
            reclaimed_mb = reclaimed_mb,
            "Retention cleanup completed"
        );

        Ok(CleanupReport {
            deleted_jobs,
            compacted,
            reclaimed_mb,
        })
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records calls; `cleanup` reports a fixed deletion count
    pub struct MockMaintenance {
        deleted_per_cleanup: u64,
        cleanup_calls: Mutex<Vec<i64>>,
        compact_calls: Mutex<usize>,
    }

    impl MockMaintenance {
        pub fn new(deleted_per_cleanup: u64) -> Self {
            Self {
                deleted_per_cleanup,
                cleanup_calls: Mutex::new(Vec::new()),
                compact_calls: Mutex::new(0),
            }
        }

        pub fn cleanup_calls(&self) -> Vec<i64> {
            self.cleanup_calls.lock().unwrap().clone()
        }

        pub fn compact_calls(&self) -> usize {
            *self.compact_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Maintenance for MockMaintenance {
        async fn cleanup(&self, max_age_days: i64) -> Result<u64> {
            self.cleanup_calls.lock().unwrap().push(max_age_days);
            Ok(self.deleted_per_cleanup)
        }

        async fn compact(&self) -> Result<f64> {
            *self.compact_calls.lock().unwrap() += 1;
            Ok(0.5)
        }

        async fn get_stats(&self) -> Result<MaintenanceStats> {
            Ok(MaintenanceStats::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mocks::MockMaintenance;
    use super::*;

    #[tokio::test]
    async fn test_run_retention_compacts_only_after_deletions() {
        let config = MaintenanceConfig {
            retention_days: 3,
            compact_after_cleanup: true,
        };

        let nothing_deleted = MockMaintenance::new(0);
        let report = nothing_deleted.run_retention(&config).await.unwrap();
        assert_eq!(report.deleted_jobs, 0);
        assert!(!report.compacted);
        assert_eq!(nothing_deleted.compact_calls(), 0);

        let some_deleted = MockMaintenance::new(4);
        let report = some_deleted.run_retention(&config).await.unwrap();
        assert_eq!(report.deleted_jobs, 4);
        assert!(report.compacted);
        assert_eq!(some_deleted.cleanup_calls(), vec![3]);
        assert_eq!(some_deleted.compact_calls(), 1);
    }
}
