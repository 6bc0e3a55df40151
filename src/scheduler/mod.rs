//! Periodic synchronization driven by a cron schedule.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use webshop_search::config::SyncConfig;
//! use webshop_search::scheduler::SyncScheduler;
//! use webshop_search::sync::BatchSynchronizer;
//!
//! async fn run(synchronizer: Arc<BatchSynchronizer>) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut scheduler = SyncScheduler::new(&SyncConfig::default(), synchronizer).await?;
//!     scheduler.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     scheduler.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod core;
mod error;

pub use core::SyncScheduler;
pub use error::{SchedulerError, SchedulerResult};
