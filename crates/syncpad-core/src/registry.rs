//! Session registry for syncpad.
//!
//! The registry owns all room membership state: which connection is editing
//! which document. Every mutation goes through [`Registry::join`] and
//! [`Registry::leave`]; no other component touches membership directly.

use crate::message::EditMessage;
use crate::room::{validate_document_id, DocumentId, Room};
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use syncpad_store::{DocumentStore, StoreError};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Invalid document id.
    #[error("Invalid document id: {0}")]
    InvalidDocumentId(&'static str),

    /// The connection has no open document.
    #[error("Connection has no open document: {0}")]
    NotJoined(String),

    /// Maximum number of rooms reached.
    #[error("Maximum number of rooms reached")]
    MaxRoomsReached,

    /// The document store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of concurrently active rooms.
    pub max_rooms: usize,
    /// Broadcast capacity per room.
    pub room_capacity: usize,
    /// Whether to remove rooms when their last member leaves.
    pub prune_empty_rooms: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_rooms: 10_000,
            room_capacity: 1024,
            prune_empty_rooms: true,
        }
    }
}

/// The result of joining a document's room.
pub struct JoinedRoom {
    /// Current document content, delivered only to the joining connection.
    pub content: String,
    /// Receiver for edits broadcast in the room.
    pub receiver: broadcast::Receiver<Arc<EditMessage>>,
}

/// The session registry: binds connections to document rooms.
///
/// A connection is a member of at most one room at a time. Opening a second
/// document implicitly leaves the prior room first, so membership state can
/// never accumulate across joins.
pub struct Registry {
    /// Rooms indexed by document id.
    rooms: DashMap<DocumentId, Room>,
    /// Current room per connection (connection_id -> document id).
    membership: DashMap<String, DocumentId>,
    /// Durable document storage, consulted on join.
    store: DocumentStore,
    /// Configuration.
    config: RegistryConfig,
}

impl Registry {
    /// Create a new registry with default configuration.
    #[must_use]
    pub fn new(store: DocumentStore) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    /// Create a new registry with custom configuration.
    #[must_use]
    pub fn with_config(store: DocumentStore, config: RegistryConfig) -> Self {
        info!("Creating registry with config: {:?}", config);
        Self {
            rooms: DashMap::new(),
            membership: DashMap::new(),
            store,
            config,
        }
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            connection_count: self.membership.len(),
        }
    }

    /// Join a connection to a document's room.
    ///
    /// Loads the document via the store (creating it with empty content on
    /// first access) and returns the content together with a receiver for
    /// the room's broadcasts. The content goes only to the joining
    /// connection; it is never broadcast.
    ///
    /// If the connection is already in a room, it leaves that room first.
    ///
    /// # Errors
    ///
    /// Returns an error if the document id is invalid, the room limit is
    /// reached, or the store fails.
    pub async fn join(
        &self,
        connection_id: &str,
        document_id: &str,
    ) -> Result<JoinedRoom, RegistryError> {
        validate_document_id(document_id).map_err(RegistryError::InvalidDocumentId)?;

        // Load content before touching membership: if the caller's task is
        // cancelled while this read is pending, nothing was registered and
        // there is nothing to clean up.
        let content = self.store.get_or_create(document_id).await?;

        // One room per connection: a second open leaves the prior room.
        self.leave(connection_id);

        if !self.rooms.contains_key(document_id) && self.rooms.len() >= self.config.max_rooms {
            return Err(RegistryError::MaxRoomsReached);
        }

        let mut room = self
            .rooms
            .entry(document_id.to_string())
            .or_insert_with(|| {
                debug!(document = %document_id, "Creating new room");
                Room::with_capacity(document_id, self.config.room_capacity)
            });

        let receiver = room.join(connection_id);
        let members = room.member_count();
        drop(room);

        self.membership
            .insert(connection_id.to_string(), document_id.to_string());

        debug!(
            document = %document_id,
            connection = %connection_id,
            members,
            "Joined room"
        );

        Ok(JoinedRoom { content, receiver })
    }

    /// Remove a connection from its current room, if any.
    ///
    /// Idempotent: leaving while not in a room is a no-op. Empty rooms are
    /// pruned when configured.
    pub fn leave(&self, connection_id: &str) {
        let Some((_, document)) = self.membership.remove(connection_id) else {
            return;
        };

        if let Some(mut room) = self.rooms.get_mut(&document) {
            room.leave(connection_id);

            debug!(
                document = %document,
                connection = %connection_id,
                members = room.member_count(),
                "Left room"
            );

            if self.config.prune_empty_rooms && room.is_empty() {
                drop(room); // Release the lock
                self.rooms.remove(&document);
                debug!(document = %document, "Pruned empty room");
            }
        }
    }

    /// Get the document a connection currently has open.
    #[must_use]
    pub fn current_document(&self, connection_id: &str) -> Option<DocumentId> {
        self.membership
            .get(connection_id)
            .map(|d| d.value().clone())
    }

    /// Broadcast an edit from one connection to the rest of its room.
    ///
    /// The message is tagged with the origin connection; each member's
    /// forwarder drops messages from itself, so only the other members see
    /// the edit. Returns the number of receivers the message reached.
    /// Broadcasting to a room with no other members delivers nothing and is
    /// not an error.
    pub fn broadcast_edit(
        &self,
        document_id: &str,
        origin_connection_id: &str,
        payload: impl Into<Bytes>,
    ) -> usize {
        if let Some(room) = self.rooms.get(document_id) {
            let message = EditMessage::new(origin_connection_id, document_id, payload);
            let count = room.broadcast(message);
            trace!(
                document = %document_id,
                connection = %origin_connection_id,
                receivers = count,
                "Relayed edit"
            );
            count
        } else {
            warn!(document = %document_id, "Edit for a room that does not exist");
            0
        }
    }

    /// Check if a room exists.
    #[must_use]
    pub fn room_exists(&self, document_id: &str) -> bool {
        self.rooms.contains_key(document_id)
    }

    /// Get the member count for a room.
    #[must_use]
    pub fn member_count(&self, document_id: &str) -> usize {
        self.rooms
            .get(document_id)
            .map(|r| r.member_count())
            .unwrap_or(0)
    }

    /// Get all active room document ids.
    #[must_use]
    pub fn room_names(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.key().clone()).collect()
    }
}

/// Registry statistics.
#[derive(Debug, Clone)]
pub struct RegistryStats {
    /// Number of active rooms.
    pub room_count: usize,
    /// Number of connections currently in a room.
    pub connection_count: usize,
}
