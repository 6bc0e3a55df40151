use crate::backlog::{BacklogEntry, BacklogStore, EntityRef, StoredEntry, DEFAULT_LEASE_SECS};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};

#[derive(Default)]
struct BacklogState {
    entries: BTreeMap<u64, StoredEntry>,
    keys: HashMap<EntityRef, u64>,
    next_seq: u64,
}

impl BacklogState {
    fn push(&mut self, entity: &EntityRef, blocked: bool) {
        self.next_seq += 1;
        let entry = BacklogEntry {
            seq: self.next_seq,
            entity_type: entity.entity_type.clone(),
            entity_id: entity.entity_id,
            enqueued_at: Utc::now(),
        };
        let stored = if blocked {
            StoredEntry::blocked(entry)
        } else {
            StoredEntry::new(entry)
        };
        self.keys.insert(entity.clone(), stored.entry.seq);
        self.entries.insert(stored.entry.seq, stored);
    }

    /// Unblock the successor queued while `entry` was in flight
    fn hand_over(&mut self, entry: &BacklogEntry) {
        if let Some(&current) = self.keys.get(&entry.entity()) {
            if current != entry.seq {
                if let Some(stored) = self.entries.get_mut(&current) {
                    stored.blocked = false;
                }
            }
        }
    }
}

/// In-memory backlog (for tests and single-process development)
pub struct InMemoryBacklog {
    state: Mutex<BacklogState>,
    lease: Duration,
}

impl InMemoryBacklog {
    pub fn new() -> Self {
        Self::with_lease(Duration::seconds(DEFAULT_LEASE_SECS))
    }

    pub fn with_lease(lease: Duration) -> Self {
        Self {
            state: Mutex::new(BacklogState::default()),
            lease,
        }
    }
}

impl Default for InMemoryBacklog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BacklogStore for InMemoryBacklog {
    async fn enqueue(&self, entities: &[EntityRef]) -> Result<usize> {
        let now = Utc::now();
        let mut state = self.state.lock();
        let mut added = 0;

        for entity in entities {
            let blocked = match state.keys.get(entity).and_then(|seq| state.entries.get(seq)) {
                None => Some(false),
                Some(stored) if !stored.blocked && stored.is_claimed(now) => Some(true),
                // Pending and not yet pushed: the next push reads fresh state
                Some(_) => None,
            };

            if let Some(blocked) = blocked {
                state.push(entity, blocked);
                added += 1;
            }
        }

        Ok(added)
    }

    async fn drain(&self, batch_size: usize) -> Result<Vec<BacklogEntry>> {
        let now = Utc::now();
        let until = now + self.lease;
        let mut state = self.state.lock();

        let mut drained = Vec::new();
        let mut stale = Vec::new();
        {
            let BacklogState { entries, keys, .. } = &mut *state;
            for stored in entries.values_mut() {
                if drained.len() >= batch_size {
                    break;
                }
                if stored.blocked || stored.is_claimed(now) {
                    continue;
                }
                if keys.get(&stored.entry.entity()) != Some(&stored.entry.seq) {
                    // Superseded entry whose push was abandoned
                    stale.push(stored.entry.clone());
                    continue;
                }
                stored.claimed_until = Some(until);
                drained.push(stored.entry.clone());
            }
        }

        for entry in &stale {
            state.entries.remove(&entry.seq);
            state.hand_over(entry);
        }

        Ok(drained)
    }

    async fn confirm(&self, entries: &[BacklogEntry]) -> Result<usize> {
        let mut state = self.state.lock();
        let mut removed = 0;

        for entry in entries {
            if state.entries.remove(&entry.seq).is_some() {
                removed += 1;
                let key = entry.entity();
                if state.keys.get(&key) == Some(&entry.seq) {
                    state.keys.remove(&key);
                }
            }
            state.hand_over(entry);
        }

        Ok(removed)
    }

    async fn release(&self, entries: &[BacklogEntry]) -> Result<()> {
        let mut state = self.state.lock();

        for entry in entries {
            if state.keys.get(&entry.entity()) == Some(&entry.seq) {
                if let Some(stored) = state.entries.get_mut(&entry.seq) {
                    stored.claimed_until = None;
                }
            } else {
                state.entries.remove(&entry.seq);
                state.hand_over(entry);
            }
        }

        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.lock().entries.len() as u64)
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.entries.clear();
        state.keys.clear();
        Ok(())
    }
}
