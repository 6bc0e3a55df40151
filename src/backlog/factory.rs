use crate::backlog::{BacklogStore, InMemoryBacklog, SledBacklog};
use crate::config::{BacklogBackend, BacklogConfig};
use crate::error::{AppError, Result};
use chrono::Duration;
use std::sync::Arc;

/// Create a backlog store based on configuration
pub fn create_backlog(config: &BacklogConfig) -> Result<Arc<dyn BacklogStore>> {
    if config.lease_secs <= 0 {
        return Err(AppError::Configuration(
            "Backlog 'lease_secs' must be positive".to_string(),
        ));
    }
    let lease = Duration::seconds(config.lease_secs);

    match config.backend {
        BacklogBackend::Sled => {
            let path = config.path.as_ref().ok_or_else(|| {
                AppError::Configuration("Sled backlog requires 'path' configuration".to_string())
            })?;

            tracing::info!(path = ?path, lease_secs = config.lease_secs, "Initializing Sled backlog");

            let store = SledBacklog::with_lease(path, lease)?;
            Ok(Arc::new(store))
        }

        BacklogBackend::Memory => {
            tracing::warn!("In-memory backlog selected; pending entries are lost on restart");
            Ok(Arc::new(InMemoryBacklog::with_lease(lease)))
        }
    }
}

/// Create an in-memory backlog (for testing and development)
pub fn create_in_memory_backlog() -> Arc<dyn BacklogStore> {
    tracing::info!("Initializing in-memory backlog");
    Arc::new(InMemoryBacklog::new())
}
