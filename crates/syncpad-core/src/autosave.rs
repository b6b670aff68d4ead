//! Autosave coordination for syncpad.
//!
//! Connections periodically submit the full content of their open document;
//! the coordinator keeps the latest snapshot per document and flushes the
//! dirty set to the store on a fixed interval. Writes are upserts, so a
//! snapshot racing an administrative delete recreates the document instead
//! of losing the live edits. Last writer wins across peers of the same
//! document.

use crate::room::DocumentId;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use syncpad_store::DocumentStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace, warn};

/// Default interval between flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);

/// Coordinates periodic persistence of document snapshots.
pub struct AutosaveCoordinator {
    /// Durable document storage.
    store: DocumentStore,
    /// Latest unsaved snapshot per document.
    pending: DashMap<DocumentId, String>,
    /// Interval between background flushes.
    flush_interval: Duration,
}

impl AutosaveCoordinator {
    /// Create a new coordinator with the default flush interval.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self::with_interval(store, DEFAULT_FLUSH_INTERVAL)
    }

    /// Create a new coordinator with a custom flush interval.
    #[must_use]
    pub fn with_interval(store: DocumentStore, flush_interval: Duration) -> Self {
        Self {
            store,
            pending: DashMap::new(),
            flush_interval,
        }
    }

    /// Record the latest snapshot for a document.
    ///
    /// Replaces any snapshot already pending for the same document; only the
    /// newest content reaches the store.
    pub fn submit(&self, document: impl Into<DocumentId>, content: impl Into<String>) {
        let document = document.into();
        trace!(document = %document, "Snapshot submitted");
        self.pending.insert(document, content.into());
    }

    /// Number of documents with an unflushed snapshot.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Flush all pending snapshots to the store.
    ///
    /// A failed write is logged and the snapshot stays pending for the next
    /// flush, unless a newer submit replaced it in the meantime. Store
    /// failures never propagate to callers; the session merely continues in
    /// an unsaved state.
    pub async fn flush(&self) {
        let dirty: Vec<(DocumentId, String)> = self
            .pending
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        for (document, content) in dirty {
            match self.store.upsert(&document, &content).await {
                Ok(()) => {
                    // Clear only if no newer snapshot arrived while writing.
                    self.pending
                        .remove_if(&document, |_, pending| pending == &content);
                    debug!(document = %document, bytes = content.len(), "Flushed snapshot");
                }
                Err(e) => {
                    warn!(document = %document, error = %e, "Snapshot flush failed");
                }
            }
        }
    }

    /// Spawn the background flush loop.
    ///
    /// Runs until the returned handle is aborted; abort after a final
    /// [`flush`](Self::flush) for a clean shutdown.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(coordinator.flush_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                coordinator.flush().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_coordinator(interval: Duration) -> (tempfile::TempDir, DocumentStore, AutosaveCoordinator) {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(dir.path().join("docs.redb")).unwrap();
        let coordinator = AutosaveCoordinator::with_interval(store.clone(), interval);
        (dir, store, coordinator)
    }

    #[tokio::test]
    async fn test_submit_and_flush() {
        let (_dir, store, coordinator) = temp_coordinator(DEFAULT_FLUSH_INTERVAL);

        coordinator.submit("doc1", "v1");
        assert_eq!(coordinator.pending_count(), 1);

        coordinator.flush().await;
        assert_eq!(coordinator.pending_count(), 0);
        assert_eq!(store.get("doc1").await.unwrap().unwrap(), "v1");
    }

    #[tokio::test]
    async fn test_last_submit_wins() {
        let (_dir, store, coordinator) = temp_coordinator(DEFAULT_FLUSH_INTERVAL);

        coordinator.submit("doc1", "v1");
        coordinator.submit("doc1", "v2");
        coordinator.flush().await;

        assert_eq!(store.get("doc1").await.unwrap().unwrap(), "v2");
    }

    #[tokio::test]
    async fn test_flush_recreates_deleted_document() {
        let (_dir, store, coordinator) = temp_coordinator(DEFAULT_FLUSH_INTERVAL);

        store.create("doc1").await.unwrap();
        store.delete("doc1").await.unwrap();

        coordinator.submit("doc1", "recovered");
        coordinator.flush().await;

        assert_eq!(store.get("doc1").await.unwrap().unwrap(), "recovered");
    }

    #[tokio::test]
    async fn test_background_flush_loop() {
        let (_dir, store, coordinator) = temp_coordinator(Duration::from_millis(10));
        let coordinator = Arc::new(coordinator);

        let handle = coordinator.spawn();
        coordinator.submit("doc1", "background");

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(store.get("doc1").await.unwrap().unwrap(), "background");
    }
}
