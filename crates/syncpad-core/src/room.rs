//! Room abstraction for syncpad.
//!
//! A room groups the connections currently editing the same document and
//! carries the broadcast channel used to fan edits out to them.

use crate::message::EditMessage;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Maximum document id length.
pub const MAX_DOCUMENT_ID_LENGTH: usize = 256;

/// Default broadcast channel capacity.
const DEFAULT_ROOM_CAPACITY: usize = 1024;

/// A document identifier.
pub type DocumentId = String;

/// Validate a document id.
///
/// # Errors
///
/// Returns an error message if the document id is invalid.
pub fn validate_document_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Document id cannot be empty");
    }
    if id.len() > MAX_DOCUMENT_ID_LENGTH {
        return Err("Document id too long");
    }
    if id.starts_with('$') {
        return Err("Document ids starting with '$' are reserved");
    }
    // Check for valid ASCII printable characters
    if !id.chars().all(|c| c.is_ascii() && !c.is_ascii_control()) {
        return Err("Document id contains invalid characters");
    }
    Ok(())
}

/// A room of connections editing one document.
#[derive(Debug)]
pub struct Room {
    /// Document this room belongs to.
    document: DocumentId,
    /// Broadcast sender for edits in this room.
    sender: broadcast::Sender<Arc<EditMessage>>,
    /// Set of member connection IDs.
    members: HashSet<String>,
    /// Broadcast capacity.
    capacity: usize,
}

impl Room {
    /// Create a new room.
    #[must_use]
    pub fn new(document: impl Into<DocumentId>) -> Self {
        Self::with_capacity(document, DEFAULT_ROOM_CAPACITY)
    }

    /// Create a new room with a specific broadcast capacity.
    #[must_use]
    pub fn with_capacity(document: impl Into<DocumentId>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            document: document.into(),
            sender,
            members: HashSet::new(),
            capacity,
        }
    }

    /// Get the document id.
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Get the number of members.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn is_member(&self, connection_id: &str) -> bool {
        self.members.contains(connection_id)
    }

    /// Add a connection to this room.
    ///
    /// Returns a receiver for edits broadcast in this room.
    pub fn join(&mut self, connection_id: impl Into<String>) -> broadcast::Receiver<Arc<EditMessage>> {
        let conn_id = connection_id.into();
        self.members.insert(conn_id.clone());
        debug!(document = %self.document, connection = %conn_id, "Connection joined room");
        self.sender.subscribe()
    }

    /// Remove a connection from this room.
    ///
    /// Returns `true` if the connection was a member.
    pub fn leave(&mut self, connection_id: &str) -> bool {
        let removed = self.members.remove(connection_id);
        if removed {
            debug!(document = %self.document, connection = %connection_id, "Connection left room");
        }
        removed
    }

    /// Broadcast an edit to this room.
    ///
    /// Returns the number of receivers the message was delivered to. Each
    /// receiver filters out messages whose source matches its own connection,
    /// so the originating connection never sees its own edit again.
    pub fn broadcast(&self, message: EditMessage) -> usize {
        let msg = Arc::new(message);
        trace!(document = %self.document, "Broadcasting edit");
        self.sender.send(msg).unwrap_or_default()
    }

    /// Get all member connection IDs.
    #[must_use]
    pub fn members(&self) -> Vec<String> {
        self.members.iter().cloned().collect()
    }

    /// Check if the room is empty (no members).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get the broadcast capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_creation() {
        let room = Room::new("meeting-notes");
        assert_eq!(room.document(), "meeting-notes");
        assert_eq!(room.member_count(), 0);
        assert!(room.is_empty());
    }

    #[test]
    fn test_room_join_leave() {
        let mut room = Room::new("doc1");

        let _rx = room.join("conn-1");
        assert_eq!(room.member_count(), 1);
        assert!(room.is_member("conn-1"));

        let _rx2 = room.join("conn-2");
        assert_eq!(room.member_count(), 2);

        assert!(room.leave("conn-1"));
        assert_eq!(room.member_count(), 1);
        assert!(!room.is_member("conn-1"));

        // Leaving a room you are not in
        assert!(!room.leave("conn-1"));
    }

    #[test]
    fn test_document_id_validation() {
        assert!(validate_document_id("meeting-notes").is_ok());
        assert!(validate_document_id("").is_err());
        assert!(validate_document_id("$internal").is_err());

        let long_id = "a".repeat(MAX_DOCUMENT_ID_LENGTH + 1);
        assert!(validate_document_id(&long_id).is_err());
    }

    #[tokio::test]
    async fn test_room_broadcast() {
        let mut room = Room::new("doc1");
        let mut rx = room.join("conn-1");

        let count = room.broadcast(EditMessage::new("conn-2", "doc1", b"delta".to_vec()));
        assert_eq!(count, 1);

        let msg = rx.recv().await.unwrap();
        assert_eq!(&msg.payload[..], b"delta");
        assert_eq!(msg.source, "conn-2");
    }
}
