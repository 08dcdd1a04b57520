// Retention Scheduler
// Periodic cleanup of old terminal jobs plus storage compaction

use crate::application::dispatcher::ShutdownToken;
use crate::error::{AppError, Result};
use crate::port::{CleanupReport, Maintenance, MaintenanceConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info};

/// Longest accepted cleanup interval (one year)
pub const MAX_CLEANUP_INTERVAL_HOURS: u64 = 24 * 365;

/// Maintenance scheduler
///
/// Runs the retention cleanup in the background every `interval_hours`.
pub struct MaintenanceScheduler {
    maintenance: Arc<dyn Maintenance>,
    config: MaintenanceConfig,
    interval_hours: u64,
}

impl MaintenanceScheduler {
    /// Create a new maintenance scheduler
    ///
    /// # Arguments
    /// * `maintenance` - Maintenance implementation
    /// * `config` - Retention configuration
    /// * `interval_hours` - How often to run cleanup (hours, clamped to one year)
    pub fn new(
        maintenance: Arc<dyn Maintenance>,
        config: MaintenanceConfig,
        interval_hours: u64,
    ) -> Self {
        Self {
            maintenance,
            config,
            interval_hours: interval_hours.clamp(1, MAX_CLEANUP_INTERVAL_HOURS),
        }
    }

    fn period(&self) -> Duration {
        Duration::from_secs(self.interval_hours * 3600)
    }

    /// Run maintenance loop until shutdown (spawn with tokio::spawn)
    pub async fn run(self, mut shutdown: ShutdownToken) {
        info!(
            interval_hours = self.interval_hours,
            retention_days = self.config.retention_days,
            "Maintenance scheduler started"
        );

        let mut tick = interval(self.period());

        loop {
            tokio::select! {
                _ = tick.tick() => {},
                _ = shutdown.wait() => {
                    info!("Maintenance scheduler stopped");
                    return;
                }
            }

            match self.maintenance.run_retention(&self.config).await {
                Ok(report) => {
                    info!(
                        deleted_jobs = report.deleted_jobs,
                        compacted = report.compacted,
                        "Scheduled cleanup completed"
                    );
                }
                Err(e) => {
                    error!(error = ?e, "Scheduled cleanup failed");
                }
            }
        }
    }

    /// Run cleanup immediately with the configured retention
    pub async fn run_now(&self) -> Result<CleanupReport> {
        self.cleanup_now(self.config.retention_days).await
    }

    /// Run cleanup immediately with an explicit retention window
    pub async fn cleanup_now(&self, max_age_days: i64) -> Result<CleanupReport> {
        if max_age_days < 0 {
            return Err(AppError::Validation(format!(
                "max_age_days must not be negative (got {})",
                max_age_days
            )));
        }
        info!(max_age_days = max_age_days, "Running manual cleanup");

        let config = MaintenanceConfig {
            retention_days: max_age_days,
            ..self.config.clone()
        };
        self.maintenance.run_retention(&config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::dispatcher::shutdown_channel;
    use crate::error::ErrorKind;
    use crate::port::maintenance::mocks::MockMaintenance;

    #[tokio::test]
    async fn test_cleanup_now_uses_given_window() {
        let mock = Arc::new(MockMaintenance::new(2));
        let scheduler = MaintenanceScheduler::new(mock.clone(), MaintenanceConfig::default(), 24);

        let report = scheduler.cleanup_now(30).await.unwrap();
        assert_eq!(report.deleted_jobs, 2);
        assert_eq!(mock.cleanup_calls(), vec![30]);

        scheduler.run_now().await.unwrap();
        assert_eq!(mock.cleanup_calls(), vec![30, 7]);
    }

    #[tokio::test]
    async fn test_negative_window_rejected() {
        let mock = Arc::new(MockMaintenance::new(0));
        let scheduler = MaintenanceScheduler::new(mock.clone(), MaintenanceConfig::default(), 24);

        let err = scheduler.cleanup_now(-1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(mock.cleanup_calls().is_empty());
    }

    #[test]
    fn test_interval_is_clamped() {
        let mock = Arc::new(MockMaintenance::new(0));
        let scheduler = MaintenanceScheduler::new(mock.clone(), MaintenanceConfig::default(), 0);
        assert_eq!(scheduler.period(), Duration::from_secs(3600));

        let scheduler = MaintenanceScheduler::new(mock, MaintenanceConfig::default(), u64::MAX);
        assert_eq!(
            scheduler.period(),
            Duration::from_secs(MAX_CLEANUP_INTERVAL_HOURS * 3600)
        );
    }

    #[tokio::test]
    async fn test_run_cleans_on_first_tick_and_stops() {
        let mock = Arc::new(MockMaintenance::new(0));
        let scheduler = MaintenanceScheduler::new(mock.clone(), MaintenanceConfig::default(), 1);
        let (tx, token) = shutdown_channel();

        let handle = tokio::spawn(scheduler.run(token));
        for _ in 0..100 {
            if !mock.cleanup_calls().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(mock.cleanup_calls(), vec![7]);

        tx.shutdown();
        assert!(tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .is_ok());
    }
}
