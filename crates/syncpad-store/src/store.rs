//! redb-backed document storage.
//!
//! One record per document: id -> full text content. The store is the sole
//! source of truth at rest; in-memory content held by connections is a
//! transient cache.

use crate::error::StoreError;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

const DOCUMENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("documents");

/// Durable key-value store of document id -> text content.
///
/// All operations run inside redb transactions: reads see the latest
/// committed write, and `get_or_create` performs its check-and-insert in a
/// single write transaction so concurrent calls for the same id create at
/// most one record.
#[derive(Clone)]
pub struct DocumentStore {
    db: Arc<RwLock<Database>>,
}

impl DocumentStore {
    /// Create or open a document store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(StoreError::unavailable)?;

        // Make sure the table exists so read transactions never race the
        // first write.
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;
        write_txn
            .open_table(DOCUMENTS_TABLE)
            .map_err(StoreError::unavailable)?;
        write_txn.commit().map_err(StoreError::unavailable)?;

        Ok(Self {
            db: Arc::new(RwLock::new(db)),
        })
    }

    /// Read the content of a document, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    pub async fn get(&self, id: &str) -> Result<Option<String>, StoreError> {
        let db = self.db.read().await;
        let read_txn = db.begin_read().map_err(StoreError::unavailable)?;
        let table = read_txn
            .open_table(DOCUMENTS_TABLE)
            .map_err(StoreError::unavailable)?;

        let content = table
            .get(id)
            .map_err(StoreError::unavailable)?
            .map(|guard| guard.value().to_string());

        Ok(content)
    }

    /// Read the content of a document, creating it with empty content if
    /// absent.
    ///
    /// Check and insert happen inside one write transaction, so concurrent
    /// calls for the same id perform at most one creation.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn get_or_create(&self, id: &str) -> Result<String, StoreError> {
        let db = self.db.write().await;
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;

        let content = {
            let mut table = write_txn
                .open_table(DOCUMENTS_TABLE)
                .map_err(StoreError::unavailable)?;

            let existing = table
                .get(id)
                .map_err(StoreError::unavailable)?
                .map(|guard| guard.value().to_string());

            match existing {
                Some(content) => content,
                None => {
                    table.insert(id, "").map_err(StoreError::unavailable)?;
                    debug!(document = %id, "Created document on first access");
                    String::new()
                }
            }
        };

        write_txn.commit().map_err(StoreError::unavailable)?;
        Ok(content)
    }

    /// Create a document with empty content.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the id is taken.
    pub async fn create(&self, id: &str) -> Result<(), StoreError> {
        let db = self.db.write().await;
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;

        {
            let mut table = write_txn
                .open_table(DOCUMENTS_TABLE)
                .map_err(StoreError::unavailable)?;

            if table.get(id).map_err(StoreError::unavailable)?.is_some() {
                return Err(StoreError::AlreadyExists(id.to_string()));
            }

            table.insert(id, "").map_err(StoreError::unavailable)?;
        }

        write_txn.commit().map_err(StoreError::unavailable)?;
        debug!(document = %id, "Created document");
        Ok(())
    }

    /// Overwrite the content of an existing document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the document does not exist.
    pub async fn put(&self, id: &str, content: &str) -> Result<(), StoreError> {
        let db = self.db.write().await;
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;

        {
            let mut table = write_txn
                .open_table(DOCUMENTS_TABLE)
                .map_err(StoreError::unavailable)?;

            if table.get(id).map_err(StoreError::unavailable)?.is_none() {
                return Err(StoreError::NotFound(id.to_string()));
            }

            table.insert(id, content).map_err(StoreError::unavailable)?;
        }

        write_txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    /// Write the content of a document, creating it if absent.
    ///
    /// This is the autosave path: a snapshot arriving after an
    /// administrative delete recreates the document rather than losing the
    /// live edits.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn upsert(&self, id: &str, content: &str) -> Result<(), StoreError> {
        let db = self.db.write().await;
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;

        {
            let mut table = write_txn
                .open_table(DOCUMENTS_TABLE)
                .map_err(StoreError::unavailable)?;
            table.insert(id, content).map_err(StoreError::unavailable)?;
        }

        write_txn.commit().map_err(StoreError::unavailable)?;
        Ok(())
    }

    /// Delete a document.
    ///
    /// Returns `true` if a record was removed, `false` if the id was absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let db = self.db.write().await;
        let write_txn = db.begin_write().map_err(StoreError::unavailable)?;

        let removed = {
            let mut table = write_txn
                .open_table(DOCUMENTS_TABLE)
                .map_err(StoreError::unavailable)?;
            let removed = table
                .remove(id)
                .map_err(StoreError::unavailable)?
                .is_some();
            removed
        };

        write_txn.commit().map_err(StoreError::unavailable)?;
        if removed {
            debug!(document = %id, "Deleted document");
        }
        Ok(removed)
    }

    /// List all document ids (no content).
    ///
    /// # Errors
    ///
    /// Returns an error if the read transaction fails.
    pub async fn list(&self) -> Result<Vec<String>, StoreError> {
        let db = self.db.read().await;
        let read_txn = db.begin_read().map_err(StoreError::unavailable)?;
        let table = read_txn
            .open_table(DOCUMENTS_TABLE)
            .map_err(StoreError::unavailable)?;

        let mut ids = Vec::new();
        for entry in table.iter().map_err(StoreError::unavailable)? {
            let (key, _) = entry.map_err(StoreError::unavailable)?;
            ids.push(key.value().to_string());
        }

        Ok(ids)
    }
}
