//! Internal message types for syncpad.
//!
//! These types are used internally for relaying edits between room members.

use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// A unique message identifier.
pub type MessageId = u64;

/// Atomic counter for ensuring unique IDs even within the same nanosecond.
static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a unique message ID.
#[must_use]
pub fn generate_message_id() -> MessageId {
    // Combine timestamp with atomic counter for guaranteed uniqueness
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as u64;
    let counter = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    // Use lower bits for counter, upper bits for timestamp
    timestamp.wrapping_add(counter)
}

/// An edit operation in flight between room members.
///
/// The payload is the opaque delta produced by the sending client's editor;
/// the relay never inspects it. The `source` connection id lets each
/// receiver drop operations it sent itself.
#[derive(Debug, Clone)]
pub struct EditMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// Connection that produced the edit.
    pub source: String,
    /// Document the edit belongs to.
    pub document: String,
    /// Opaque delta payload (shared for zero-copy fan-out).
    pub payload: Arc<Bytes>,
    /// Timestamp when the message was created.
    pub timestamp: u64,
}

impl EditMessage {
    /// Create a new edit message.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        document: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            id: generate_message_id(),
            source: source.into(),
            document: document.into(),
            payload: Arc::new(payload.into()),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_millis() as u64,
        }
    }

    /// Get the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Get the payload size in bytes.
    #[must_use]
    pub fn payload_size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = EditMessage::new("conn-1", "doc1", b"delta".to_vec());
        assert_eq!(msg.source, "conn-1");
        assert_eq!(msg.document, "doc1");
        assert_eq!(&msg.payload[..], b"delta");
    }

    #[test]
    fn test_unique_message_ids() {
        let id1 = generate_message_id();
        let id2 = generate_message_id();
        // IDs should be different (with high probability)
        assert_ne!(id1, id2);
    }
}
