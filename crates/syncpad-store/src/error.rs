//! Error types for the document store.

use thiserror::Error;

/// Document store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Document not found.
    #[error("Document not found: {0}")]
    NotFound(String),

    /// Document already exists.
    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    /// The underlying database failed or is unavailable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Wrap an underlying database error.
    pub(crate) fn unavailable(err: impl std::fmt::Display) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}
