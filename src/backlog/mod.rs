//! Index backlog: durable queue of entities whose search documents are stale.
//!
//! Every create/update in the primary store enqueues the affected entities.
//! The synchronizer drains entries oldest-first, and an entry is only removed
//! once its document has been confirmed by the search engine, which gives
//! at-least-once delivery to the index.
//!
//! Draining is a claim: returned entries carry a lease and are skipped by
//! concurrent drains until they are confirmed, released, or the lease runs
//! out. An entity re-enqueued while it is claimed gets a fresh entry that
//! stays locked behind the in-flight one and is handed over when that one is
//! confirmed or released, so a newer state is never overwritten by an older
//! push.

mod factory;
mod memory;
mod sled_store;

pub use factory::{create_backlog, create_in_memory_backlog};
pub use memory::InMemoryBacklog;
pub use sled_store::SledBacklog;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default claim lease for drained entries
pub const DEFAULT_LEASE_SECS: i64 = 300;

/// Identity of a primary-store entity
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: String,
    pub entity_id: i64,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: i64) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }

    pub fn product(entity_id: i64) -> Self {
        Self::new(crate::search::PRODUCT_DOC_TYPE, entity_id)
    }

    /// Stable byte key used by persistent stores
    pub(crate) fn storage_key(&self) -> Vec<u8> {
        format!("{}\u{0}{}", self.entity_type, self.entity_id).into_bytes()
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// One pending re-index request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogEntry {
    /// Insertion sequence; orders draining and identifies this exact entry
    pub seq: u64,

    pub entity_type: String,

    pub entity_id: i64,

    pub enqueued_at: DateTime<Utc>,
}

impl BacklogEntry {
    pub fn entity(&self) -> EntityRef {
        EntityRef::new(self.entity_type.clone(), self.entity_id)
    }
}

/// Stored form of an entry together with its claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
    pub entry: BacklogEntry,
    pub claimed_until: Option<DateTime<Utc>>,
    /// Waiting for an in-flight predecessor of the same entity
    #[serde(default)]
    pub blocked: bool,
}

impl StoredEntry {
    pub fn new(entry: BacklogEntry) -> Self {
        Self {
            entry,
            claimed_until: None,
            blocked: false,
        }
    }

    pub fn blocked(entry: BacklogEntry) -> Self {
        Self {
            entry,
            claimed_until: None,
            blocked: true,
        }
    }

    pub fn is_claimed(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.map_or(false, |until| until > now)
    }
}

/// Durable work queue of entities pending re-indexing
#[async_trait]
pub trait BacklogStore: Send + Sync {
    /// Queue entities for re-indexing. Already pending entities are a no-op.
    /// Returns the number of entries actually added.
    async fn enqueue(&self, entities: &[EntityRef]) -> Result<usize>;

    /// Claim up to `batch_size` of the oldest unclaimed entries.
    async fn drain(&self, batch_size: usize) -> Result<Vec<BacklogEntry>>;

    /// Delete entries whose documents are durably indexed.
    /// Returns the number of entries removed.
    async fn confirm(&self, entries: &[BacklogEntry]) -> Result<usize>;

    /// Give up claims so the entries are pending again right away.
    async fn release(&self, entries: &[BacklogEntry]) -> Result<()>;

    /// Number of pending entries, claimed or not
    async fn count(&self) -> Result<u64>;

    /// Drop every entry
    async fn clear(&self) -> Result<()>;
}

/// Hook the primary store calls after entities are created or updated
#[async_trait]
pub trait EntityMutationListener: Send + Sync {
    async fn on_entity_mutated(&self, entities: &[EntityRef]) -> Result<()>;
}

/// Routes entity mutations into a backlog store
#[derive(Clone)]
pub struct BacklogHook {
    backlog: Arc<dyn BacklogStore>,
}

impl BacklogHook {
    pub fn new(backlog: Arc<dyn BacklogStore>) -> Self {
        Self { backlog }
    }
}

#[async_trait]
impl EntityMutationListener for BacklogHook {
    async fn on_entity_mutated(&self, entities: &[EntityRef]) -> Result<()> {
        if entities.is_empty() {
            return Ok(());
        }

        let added = self.backlog.enqueue(entities).await?;
        tracing::debug!(
            mutated = entities.len(),
            added = added,
            "Entities queued for re-indexing"
        );
        Ok(())
    }
}
