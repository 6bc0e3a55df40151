use crate::backlog::{BacklogEntry, BacklogStore};
use crate::error::AppError;
use crate::metrics::{BACKLOG_PENDING, SYNC_BATCHES_TOTAL, SYNC_DOCUMENTS_TOTAL};
use crate::search::{BulkOutcome, DocumentSource, IndexClient, IndexDocument, SearchError};
use crate::sync::state::{StateData, SyncState};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Default number of entries drained per batch
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Another run holds the single-flight guard
    #[error("Synchronization is already running")]
    AlreadyRunning,

    #[error("Backlog error: {0}")]
    Backlog(#[from] AppError),

    /// The engine failed a bulk push; the batch is pending again
    #[error("Push failed: {0}")]
    Push(#[from] SearchError),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::AlreadyRunning => AppError::Sync(err.to_string()),
            SyncError::Backlog(inner) => inner,
            SyncError::Push(inner) => inner.into(),
        }
    }
}

/// What happened to one drained batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub drained: usize,
    pub indexed: usize,
    pub deleted: usize,
    /// Documents the engine refused individually
    pub rejected: usize,
    /// Entities that could not be turned into documents
    pub serialize_failed: usize,
    pub confirmed: usize,
}

/// Totals of one synchronizer run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub batches: usize,
    pub drained: usize,
    pub indexed: usize,
    pub deleted: usize,
    pub rejected: usize,
    pub serialize_failed: usize,
    pub confirmed: usize,
    /// Backlog entries still pending after the run
    pub pending: u64,
    pub took_ms: u64,
}

impl SyncReport {
    fn add(&mut self, batch: &BatchReport) {
        self.batches += 1;
        self.drained += batch.drained;
        self.indexed += batch.indexed;
        self.deleted += batch.deleted;
        self.rejected += batch.rejected;
        self.serialize_failed += batch.serialize_failed;
        self.confirmed += batch.confirmed;
    }

    /// Whether every drained entry was confirmed
    pub fn is_clean(&self) -> bool {
        self.drained == self.confirmed
    }
}

/// Resets the single-flight flag however the run ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the backlog, serializes entities and pushes them to the index.
///
/// Only entries whose documents the engine accepted are confirmed. Entries
/// that failed serialization or were rejected are set aside for the rest of
/// the run and released when it ends, so they are retried by the next one.
pub struct BatchSynchronizer {
    backlog: Arc<dyn BacklogStore>,
    source: Arc<dyn DocumentSource>,
    client: Arc<dyn IndexClient>,
    batch_size: usize,
    running: AtomicBool,
    state: Mutex<StateData>,
}

impl BatchSynchronizer {
    pub fn new(
        backlog: Arc<dyn BacklogStore>,
        source: Arc<dyn DocumentSource>,
        client: Arc<dyn IndexClient>,
        batch_size: usize,
    ) -> Self {
        Self {
            backlog,
            source,
            client,
            batch_size: batch_size.max(1),
            running: AtomicBool::new(false),
            state: Mutex::new(StateData::new()),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn state(&self) -> SyncState {
        self.state.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn transition(&self, next: SyncState) {
        let mut data = self.state.lock();
        match data.transition_to(next) {
            Some(transition) => {
                tracing::trace!(from = %transition.from, to = %transition.to, "Synchronizer state change");
            }
            None => {
                tracing::warn!(from = %data.state, to = %next, "Ignoring invalid synchronizer state change");
            }
        }
    }

    /// Process batches until a drain comes back empty
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        let started = Instant::now();
        let mut report = SyncReport::default();
        let mut set_aside: Vec<BacklogEntry> = Vec::new();

        let outcome = self.run_batches(&mut report, &mut set_aside).await;

        if !set_aside.is_empty() {
            tracing::warn!(entries = set_aside.len(), "Releasing entries that could not be indexed");
            if let Err(e) = self.backlog.release(&set_aside).await {
                tracing::error!(error = %e, "Failed to release set-aside backlog entries");
            }
        }

        outcome?;

        report.pending = self.backlog.count().await?;
        report.took_ms = started.elapsed().as_millis() as u64;
        BACKLOG_PENDING.set(report.pending as f64);

        tracing::info!(
            batches = report.batches,
            indexed = report.indexed,
            deleted = report.deleted,
            confirmed = report.confirmed,
            set_aside = report.rejected + report.serialize_failed,
            pending = report.pending,
            took_ms = report.took_ms,
            "Synchronization run finished"
        );
        Ok(report)
    }

    async fn run_batches(
        &self,
        report: &mut SyncReport,
        set_aside: &mut Vec<BacklogEntry>,
    ) -> Result<(), SyncError> {
        loop {
            self.transition(SyncState::Draining);
            let entries = match self.backlog.drain(self.batch_size).await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::error!(error = %e, "Backlog drain failed");
                    self.transition(SyncState::Failed);
                    self.transition(SyncState::Idle);
                    return Err(e.into());
                }
            };

            if entries.is_empty() {
                self.transition(SyncState::Idle);
                return Ok(());
            }

            match self.process_batch(entries, set_aside).await {
                Ok(batch) => {
                    SYNC_BATCHES_TOTAL.with_label_values(&["confirmed"]).inc();
                    report.add(&batch);
                }
                Err(e) => {
                    SYNC_BATCHES_TOTAL.with_label_values(&["failed"]).inc();
                    self.transition(SyncState::Failed);
                    self.transition(SyncState::Idle);
                    return Err(e);
                }
            }
        }
    }

    /// Serialize, push and confirm one drained batch.
    ///
    /// On error every entry of the batch has been released.
    async fn process_batch(
        &self,
        entries: Vec<BacklogEntry>,
        set_aside: &mut Vec<BacklogEntry>,
    ) -> Result<BatchReport, SyncError> {
        let mut batch = BatchReport {
            drained: entries.len(),
            ..Default::default()
        };
        tracing::debug!(batch_size = entries.len(), "Processing backlog batch");

        self.transition(SyncState::Serializing);
        let mut upserts: BTreeMap<String, Vec<(BacklogEntry, IndexDocument)>> = BTreeMap::new();
        let mut deletes: BTreeMap<String, Vec<BacklogEntry>> = BTreeMap::new();
        let mut in_flight: Vec<BacklogEntry> = Vec::new();

        for entry in entries {
            match self.source.document(&entry.entity()).await {
                Ok(Some(document)) => {
                    in_flight.push(entry.clone());
                    upserts
                        .entry(document.doc_type.clone())
                        .or_default()
                        .push((entry, document));
                }
                Ok(None) => {
                    in_flight.push(entry.clone());
                    deletes.entry(entry.entity_type.clone()).or_default().push(entry);
                }
                Err(e) => {
                    tracing::warn!(
                        entity_type = %entry.entity_type,
                        entity_id = entry.entity_id,
                        error = %e,
                        "Entity could not be serialized; leaving it pending"
                    );
                    SYNC_DOCUMENTS_TOTAL.with_label_values(&["serialize_failed"]).inc();
                    batch.serialize_failed += 1;
                    set_aside.push(entry);
                }
            }
        }

        self.transition(SyncState::Pushing);
        let mut succeeded: Vec<BacklogEntry> = Vec::new();
        let mut doc_types: Vec<String> = Vec::new();

        for (doc_type, items) in upserts {
            let documents: Vec<IndexDocument> = items.iter().map(|(_, doc)| doc.clone()).collect();
            let started = Instant::now();
            let outcome = match self.client.bulk_index(&doc_type, &documents).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.abort_push(&in_flight, &doc_type, e).await),
            };
            tracing::debug!(
                doc_type = %doc_type,
                batch_size = documents.len(),
                took_ms = started.elapsed().as_millis() as u64,
                "Bulk index finished"
            );

            let entries: Vec<BacklogEntry> = items.into_iter().map(|(entry, _)| entry).collect();
            let (ok, rejected) = split_by_outcome(entries, &outcome);
            batch.indexed += ok.len();
            SYNC_DOCUMENTS_TOTAL.with_label_values(&["indexed"]).inc_by(ok.len() as f64);
            self.set_aside_rejected(&doc_type, &outcome, rejected, &mut batch, set_aside);
            succeeded.extend(ok);
            doc_types.push(doc_type);
        }

        for (doc_type, entries) in deletes {
            let ids: Vec<i64> = entries.iter().map(|entry| entry.entity_id).collect();
            let outcome = match self.client.delete_documents(&doc_type, &ids).await {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.abort_push(&in_flight, &doc_type, e).await),
            };
            tracing::debug!(doc_type = %doc_type, deleted = ids.len(), "Removed documents of deleted entities");

            let (ok, rejected) = split_by_outcome(entries, &outcome);
            batch.deleted += ok.len();
            SYNC_DOCUMENTS_TOTAL.with_label_values(&["deleted"]).inc_by(ok.len() as f64);
            self.set_aside_rejected(&doc_type, &outcome, rejected, &mut batch, set_aside);
            succeeded.extend(ok);
            if !doc_types.contains(&doc_type) {
                doc_types.push(doc_type);
            }
        }

        for doc_type in &doc_types {
            if let Err(e) = self.client.refresh(doc_type).await {
                return Err(self.abort_push(&in_flight, doc_type, e).await);
            }
        }

        self.transition(SyncState::Confirming);
        match self.backlog.confirm(&succeeded).await {
            Ok(confirmed) => batch.confirmed = confirmed,
            Err(e) => {
                tracing::error!(error = %e, entries = succeeded.len(), "Failed to confirm pushed entries");
                self.release_quietly(&in_flight).await;
                return Err(e.into());
            }
        }

        Ok(batch)
    }

    fn set_aside_rejected(
        &self,
        doc_type: &str,
        outcome: &BulkOutcome,
        rejected: Vec<BacklogEntry>,
        batch: &mut BatchReport,
        set_aside: &mut Vec<BacklogEntry>,
    ) {
        for (id, reason) in &outcome.failed {
            tracing::warn!(doc_type = %doc_type, entity_id = *id, reason = %reason, "Engine rejected document");
        }
        batch.rejected += rejected.len();
        SYNC_DOCUMENTS_TOTAL.with_label_values(&["rejected"]).inc_by(rejected.len() as f64);
        set_aside.extend(rejected);
    }

    async fn abort_push(&self, in_flight: &[BacklogEntry], doc_type: &str, error: SearchError) -> SyncError {
        tracing::error!(
            doc_type = %doc_type,
            batch_size = in_flight.len(),
            transient = error.is_transient(),
            error = %error,
            "Push to search engine failed; batch stays pending"
        );
        self.release_quietly(in_flight).await;
        SyncError::Push(error)
    }

    async fn release_quietly(&self, entries: &[BacklogEntry]) {
        if let Err(e) = self.backlog.release(entries).await {
            tracing::error!(error = %e, entries = entries.len(), "Failed to release backlog entries");
        }
    }
}

/// Split entries into accepted and refused by a bulk outcome.
///
/// Entries the outcome does not mention count as refused.
fn split_by_outcome(entries: Vec<BacklogEntry>, outcome: &BulkOutcome) -> (Vec<BacklogEntry>, Vec<BacklogEntry>) {
    let accepted: HashSet<i64> = outcome.succeeded.iter().copied().collect();
    entries
        .into_iter()
        .partition(|entry| accepted.contains(&entry.entity_id))
}
