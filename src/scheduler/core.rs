//! Cron-driven synchronizer runs

use super::error::{SchedulerError, SchedulerResult};
use crate::config::SyncConfig;
use crate::sync::{BatchSynchronizer, SyncError};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Runs the synchronizer on a cron schedule.
///
/// A tick that fires while the previous run is still going is skipped.
pub struct SyncScheduler {
    scheduler: JobScheduler,
    synchronizer: Arc<BatchSynchronizer>,
    schedule: String,
    enabled: bool,
    job_id: Option<Uuid>,
    running: bool,
}

impl SyncScheduler {
    pub async fn new(config: &SyncConfig, synchronizer: Arc<BatchSynchronizer>) -> SchedulerResult<Self> {
        info!(schedule = %config.schedule, "Initializing sync scheduler");

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        Ok(Self {
            scheduler,
            synchronizer,
            schedule: config.schedule.clone(),
            enabled: config.enabled,
            job_id: None,
            running: false,
        })
    }

    fn sync_job(&self) -> SchedulerResult<Job> {
        let synchronizer = self.synchronizer.clone();
        Job::new_async(self.schedule.as_str(), move |_uuid, _l| {
            let synchronizer = synchronizer.clone();
            Box::pin(async move {
                match synchronizer.run().await {
                    Ok(report) if report.batches > 0 => {
                        info!(
                            confirmed = report.confirmed,
                            pending = report.pending,
                            took_ms = report.took_ms,
                            "Scheduled synchronization finished"
                        );
                    }
                    Ok(_) => debug!("Backlog empty, nothing to synchronize"),
                    Err(SyncError::AlreadyRunning) => {
                        debug!("Previous synchronization still running, skipping tick");
                    }
                    Err(e) => error!(error = %e, "Scheduled synchronization failed"),
                }
            })
        })
        .map_err(|e: JobSchedulerError| SchedulerError::InvalidCronExpression(format!("{}: {}", self.schedule, e)))
    }

    /// Register the sync job and start ticking
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if !self.enabled {
            info!("Scheduled synchronization is disabled in configuration");
            return Ok(());
        }
        if self.running {
            warn!("Sync scheduler is already running");
            return Ok(());
        }

        let job = self.sync_job()?;
        let job_id = self
            .scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::JobCreationFailed(e.to_string()))?;

        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::StartupFailed(e.to_string()))?;

        self.job_id = Some(job_id);
        self.running = true;
        info!(job_id = %job_id, schedule = %self.schedule, "Sync scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> SchedulerResult<()> {
        if !self.running {
            return Ok(());
        }
        info!("Shutting down sync scheduler");

        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::ShutdownFailed(e.to_string()))?;

        self.running = false;
        self.job_id = None;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn job_id(&self) -> Option<Uuid> {
        self.job_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backlog::{create_in_memory_backlog, EntityRef};
    use crate::catalog::InMemoryCatalog;
    use crate::search::{CatalogDocumentSource, EmbeddedIndex, SearchConfig};

    async fn synchronizer() -> Arc<BatchSynchronizer> {
        let backlog = create_in_memory_backlog();
        backlog.enqueue(&[EntityRef::product(404)]).await.unwrap();
        let catalog = Arc::new(InMemoryCatalog::new());
        let index = Arc::new(EmbeddedIndex::in_memory(&SearchConfig::default()).unwrap());
        Arc::new(BatchSynchronizer::new(
            backlog,
            Arc::new(CatalogDocumentSource::new(catalog)),
            index,
            10,
        ))
    }

    #[tokio::test]
    async fn test_invalid_cron_is_rejected() {
        let config = SyncConfig {
            schedule: "every tuesday".to_string(),
            ..Default::default()
        };
        let mut scheduler = SyncScheduler::new(&config, synchronizer().await).await.unwrap();

        assert!(matches!(
            scheduler.start().await,
            Err(SchedulerError::InvalidCronExpression(_))
        ));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_disabled_scheduler_does_not_start() {
        let config = SyncConfig {
            enabled: false,
            ..Default::default()
        };
        let mut scheduler = SyncScheduler::new(&config, synchronizer().await).await.unwrap();

        scheduler.start().await.unwrap();
        assert!(!scheduler.is_running());
        assert!(scheduler.job_id().is_none());
    }

    #[tokio::test]
    async fn test_start_and_shutdown() {
        let config = SyncConfig {
            schedule: "*/1 * * * * *".to_string(),
            ..Default::default()
        };
        let mut scheduler = SyncScheduler::new(&config, synchronizer().await).await.unwrap();

        scheduler.start().await.unwrap();
        assert!(scheduler.is_running());
        assert!(scheduler.job_id().is_some());
        scheduler.shutdown().await.unwrap();
        assert!(!scheduler.is_running());
    }
}
