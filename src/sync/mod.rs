//! Batch index synchronizer.
//!
//! One run drains the backlog in fixed-size batches until it is empty:
//!
//! ```text
//! Idle -> Draining -> Serializing -> Pushing -> Confirming -> Draining ... -> Idle
//!            \______________\______________\___________\______-> Failed -> Idle
//! ```
//!
//! Runs are single-flight per synchronizer; a second concurrent call fails
//! with [`SyncError::AlreadyRunning`]. Concurrent synchronizers over the same
//! backlog are kept apart by the backlog's drain claims.

mod state;
mod synchronizer;

pub use state::{StateData, StateTransition, SyncState};
pub use synchronizer::{BatchReport, BatchSynchronizer, SyncError, SyncReport, DEFAULT_BATCH_SIZE};
