//! Cron scheduler for periodic maintenance tasks.

use std::sync::Arc;

use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use canopy_core::config::TrashConfig;
use canopy_core::error::AppError;

use crate::jobs::TrashReaper;

/// Cron-based scheduler for periodic background tasks
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new() -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        Ok(Self { scheduler })
    }

    /// Register every task enabled in `config`
    pub async fn register_default_tasks(
        &self,
        config: &TrashConfig,
        reaper: TrashReaper,
    ) -> Result<(), AppError> {
        if config.reaper_enabled {
            self.register_trash_reaper(&config.reaper_schedule, reaper)
                .await?;
        } else {
            tracing::info!("Trash reaper disabled");
        }

        tracing::info!("All scheduled tasks registered");
        Ok(())
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&mut self) -> Result<(), AppError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }

    /// Trash reaper on `schedule` (six fields, seconds first)
    pub async fn register_trash_reaper(
        &self,
        schedule: &str,
        reaper: TrashReaper,
    ) -> Result<(), AppError> {
        let reaper = Arc::new(reaper);
        let job = CronJob::new_async(schedule, move |_uuid, _lock| {
            let reaper = Arc::clone(&reaper);
            Box::pin(async move {
                if let Err(e) = reaper.run_once().await {
                    tracing::error!(error = %e, "Trash reaper failed");
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid trash reaper schedule '{schedule}': {e}"
            ))
        })?;

        self.scheduler.add(job).await.map_err(|e| {
            AppError::internal(format!("Failed to add trash reaper schedule: {e}"))
        })?;

        tracing::info!(schedule, "Registered: trash_reaper");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::TrashPurger;
    use async_trait::async_trait;
    use canopy_core::result::AppResult;
    use canopy_core::ErrorKind;
    use canopy_database::repositories::DeleteOutcome;

    #[derive(Debug)]
    struct NoopPurger;

    #[async_trait]
    impl TrashPurger for NoopPurger {
        async fn purge(&self) -> AppResult<DeleteOutcome> {
            Ok(DeleteOutcome::default())
        }
    }

    #[tokio::test]
    async fn test_invalid_schedule_is_a_configuration_error() {
        let scheduler = CronScheduler::new().await.unwrap();
        let err = scheduler
            .register_trash_reaper("every night", TrashReaper::new(Arc::new(NoopPurger)))
            .await
            .unwrap_err();
        assert!(err.is(ErrorKind::Configuration));
    }

    #[tokio::test]
    async fn test_disabled_reaper_registers_nothing() {
        let scheduler = CronScheduler::new().await.unwrap();
        let config = TrashConfig {
            reaper_enabled: false,
            reaper_schedule: "not a cron".to_string(),
        };
        scheduler
            .register_default_tasks(&config, TrashReaper::new(Arc::new(NoopPurger)))
            .await
            .unwrap();
    }
}
