use crate::backlog::{BacklogEntry, BacklogStore, EntityRef, StoredEntry, DEFAULT_LEASE_SECS};
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use sled::Db;
use std::path::Path;
use std::sync::Arc;

/// Persistent backlog using the Sled embedded database
///
/// Entries live in a tree keyed by big-endian sequence number so iteration
/// order is insertion order; a second tree maps each entity to the sequence
/// of its newest entry.
#[derive(Clone)]
pub struct SledBacklog {
    db: Arc<Db>,
    entries_tree: sled::Tree,
    keys_tree: sled::Tree,
    lease: Duration,
    // Claim decisions read-modify-write both trees
    claim_lock: Arc<Mutex<()>>,
}

impl SledBacklog {
    /// Open (or create) a backlog at the specified path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::with_lease(path, Duration::seconds(DEFAULT_LEASE_SECS))
    }

    pub fn with_lease<P: AsRef<Path>>(path: P, lease: Duration) -> Result<Self> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)
            .map_err(|e| AppError::Storage(format!("Failed to open Sled database: {}", e)))?;

        let entries_tree = db
            .open_tree("backlog_entries")
            .map_err(|e| AppError::Storage(format!("Failed to open entries tree: {}", e)))?;

        let keys_tree = db
            .open_tree("backlog_keys")
            .map_err(|e| AppError::Storage(format!("Failed to open keys tree: {}", e)))?;

        tracing::info!("Initialized Sled backlog at {:?}", path_ref);

        Ok(Self {
            db: Arc::new(db),
            entries_tree,
            keys_tree,
            lease,
            claim_lock: Arc::new(Mutex::new(())),
        })
    }

    fn seq_key(seq: u64) -> [u8; 8] {
        seq.to_be_bytes()
    }

    fn decode_seq(bytes: &[u8]) -> Result<u64> {
        let array: [u8; 8] = bytes
            .try_into()
            .map_err(|_| AppError::Storage("Corrupt backlog sequence key".to_string()))?;
        Ok(u64::from_be_bytes(array))
    }

    fn serialize_entry(stored: &StoredEntry) -> Result<Vec<u8>> {
        bincode::serialize(stored)
            .map_err(|e| AppError::Serialization(format!("Failed to serialize backlog entry: {}", e)))
    }

    fn deserialize_entry(bytes: &[u8]) -> Result<StoredEntry> {
        bincode::deserialize(bytes)
            .map_err(|e| AppError::Serialization(format!("Failed to deserialize backlog entry: {}", e)))
    }

    fn current_seq(&self, entity: &EntityRef) -> Result<Option<u64>> {
        self.keys_tree
            .get(entity.storage_key())
            .map_err(|e| AppError::Storage(format!("Failed to read backlog key: {}", e)))?
            .map(|bytes| Self::decode_seq(&bytes))
            .transpose()
    }

    fn load(&self, seq: u64) -> Result<Option<StoredEntry>> {
        self.entries_tree
            .get(Self::seq_key(seq))
            .map_err(|e| AppError::Storage(format!("Failed to read backlog entry: {}", e)))?
            .map(|bytes| Self::deserialize_entry(&bytes))
            .transpose()
    }

    fn store(&self, stored: &StoredEntry) -> Result<()> {
        let value = Self::serialize_entry(stored)?;
        self.entries_tree
            .insert(Self::seq_key(stored.entry.seq), value)
            .map_err(|e| AppError::Storage(format!("Failed to write backlog entry: {}", e)))?;
        Ok(())
    }

    fn remove(&self, seq: u64) -> Result<bool> {
        let removed = self
            .entries_tree
            .remove(Self::seq_key(seq))
            .map_err(|e| AppError::Storage(format!("Failed to remove backlog entry: {}", e)))?;
        Ok(removed.is_some())
    }

    fn push(&self, entity: &EntityRef, blocked: bool) -> Result<()> {
        let seq = self
            .db
            .generate_id()
            .map_err(|e| AppError::Storage(format!("Failed to allocate backlog sequence: {}", e)))?;

        let entry = BacklogEntry {
            seq,
            entity_type: entity.entity_type.clone(),
            entity_id: entity.entity_id,
            enqueued_at: Utc::now(),
        };
        let stored = if blocked {
            StoredEntry::blocked(entry)
        } else {
            StoredEntry::new(entry)
        };

        self.store(&stored)?;
        self.keys_tree
            .insert(entity.storage_key(), Self::seq_key(seq).to_vec())
            .map_err(|e| AppError::Storage(format!("Failed to write backlog key: {}", e)))?;
        Ok(())
    }

    fn hand_over(&self, entry: &BacklogEntry) -> Result<()> {
        if let Some(current) = self.current_seq(&entry.entity())? {
            if current != entry.seq {
                if let Some(mut stored) = self.load(current)? {
                    stored.blocked = false;
                    self.store(&stored)?;
                }
            }
        }
        Ok(())
    }

    /// Flush pending writes to disk
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    fn flush_trees(&self) -> Result<()> {
        self.entries_tree
            .flush()
            .map_err(|e| AppError::Storage(format!("Failed to flush entries tree: {}", e)))?;
        self.keys_tree
            .flush()
            .map_err(|e| AppError::Storage(format!("Failed to flush keys tree: {}", e)))?;
        Ok(())
    }

    /// Get database size in bytes
    pub fn size_on_disk(&self) -> Result<u64> {
        self.db
            .size_on_disk()
            .map_err(|e| AppError::Storage(format!("Failed to get database size: {}", e)))
    }
}

#[async_trait]
impl BacklogStore for SledBacklog {
    async fn enqueue(&self, entities: &[EntityRef]) -> Result<usize> {
        let now = Utc::now();
        let _guard = self.claim_lock.lock();
        let mut added = 0;

        for entity in entities {
            let current = match self.current_seq(entity)? {
                Some(seq) => self.load(seq)?,
                None => None,
            };

            let blocked = match current {
                None => Some(false),
                Some(stored) if !stored.blocked && stored.is_claimed(now) => Some(true),
                Some(_) => None,
            };

            if let Some(blocked) = blocked {
                self.push(entity, blocked)?;
                added += 1;
            }
        }

        self.flush_trees()?;
        tracing::debug!(added = added, "Backlog entries saved to Sled");
        Ok(added)
    }

    async fn drain(&self, batch_size: usize) -> Result<Vec<BacklogEntry>> {
        let now = Utc::now();
        let until = now + self.lease;
        let _guard = self.claim_lock.lock();

        let mut drained = Vec::new();
        let mut stale = Vec::new();

        for item in self.entries_tree.iter() {
            if drained.len() >= batch_size {
                break;
            }

            let (_, value) =
                item.map_err(|e| AppError::Storage(format!("Failed to scan backlog: {}", e)))?;
            let mut stored = Self::deserialize_entry(&value)?;

            if stored.blocked || stored.is_claimed(now) {
                continue;
            }
            if self.current_seq(&stored.entry.entity())? != Some(stored.entry.seq) {
                stale.push(stored.entry);
                continue;
            }

            stored.claimed_until = Some(until);
            self.store(&stored)?;
            drained.push(stored.entry);
        }

        for entry in &stale {
            self.remove(entry.seq)?;
            self.hand_over(entry)?;
        }

        self.flush_trees()?;
        Ok(drained)
    }

    async fn confirm(&self, entries: &[BacklogEntry]) -> Result<usize> {
        let _guard = self.claim_lock.lock();
        let mut removed = 0;

        for entry in entries {
            if self.remove(entry.seq)? {
                removed += 1;
                let entity = entry.entity();
                if self.current_seq(&entity)? == Some(entry.seq) {
                    self.keys_tree
                        .remove(entity.storage_key())
                        .map_err(|e| AppError::Storage(format!("Failed to remove backlog key: {}", e)))?;
                }
            }
            self.hand_over(entry)?;
        }

        self.flush_trees()?;
        Ok(removed)
    }

    async fn release(&self, entries: &[BacklogEntry]) -> Result<()> {
        let _guard = self.claim_lock.lock();

        for entry in entries {
            if self.current_seq(&entry.entity())? == Some(entry.seq) {
                if let Some(mut stored) = self.load(entry.seq)? {
                    stored.claimed_until = None;
                    self.store(&stored)?;
                }
            } else {
                self.remove(entry.seq)?;
                self.hand_over(entry)?;
            }
        }

        self.flush_trees()
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.entries_tree.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        let _guard = self.claim_lock.lock();
        self.entries_tree
            .clear()
            .map_err(|e| AppError::Storage(format!("Failed to clear entries tree: {}", e)))?;
        self.keys_tree
            .clear()
            .map_err(|e| AppError::Storage(format!("Failed to clear keys tree: {}", e)))?;
        self.flush_trees()
    }
}
