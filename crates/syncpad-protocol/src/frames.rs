//! Frame types for the syncpad protocol.
//!
//! Frames are the fundamental unit of communication between editor clients
//! and the server. Each frame is serialized using MessagePack for efficient
//! binary encoding.

use serde::{Deserialize, Serialize};

/// Frame type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FrameType {
    Open = 0x01,
    Document = 0x02,
    Edit = 0x03,
    Save = 0x04,
    Ack = 0x05,
    Error = 0x06,
    Ping = 0x07,
    Pong = 0x08,
    Connect = 0x09,
    Connected = 0x0A,
}

impl From<FrameType> for u8 {
    fn from(ft: FrameType) -> u8 {
        ft as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match value {
            0x01 => Ok(FrameType::Open),
            0x02 => Ok(FrameType::Document),
            0x03 => Ok(FrameType::Edit),
            0x04 => Ok(FrameType::Save),
            0x05 => Ok(FrameType::Ack),
            0x06 => Ok(FrameType::Error),
            0x07 => Ok(FrameType::Ping),
            0x08 => Ok(FrameType::Pong),
            0x09 => Ok(FrameType::Connect),
            0x0A => Ok(FrameType::Connected),
            _ => Err("Invalid frame type"),
        }
    }
}

/// Error codes carried by [`Frame::Error`].
pub mod codes {
    /// The document id failed validation.
    pub const INVALID_DOCUMENT: u16 = 1001;
    /// The requested operation requires an open document.
    pub const NOT_JOINED: u16 = 1002;
    /// The document store rejected or failed the operation.
    pub const STORE_FAILED: u16 = 1003;
    /// The inbound frame could not be decoded or was out of place.
    pub const BAD_FRAME: u16 = 1004;
}

/// A protocol frame.
///
/// Frames are the messages exchanged between editor clients and the server.
/// Each frame type has specific fields relevant to its operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// Open a document: join its room and request the current content.
    #[serde(rename = "open")]
    Open {
        /// Request ID for correlating the response.
        id: u64,
        /// Document identifier to open.
        document: String,
    },

    /// Current document content, sent once to the connection that opened it.
    #[serde(rename = "document")]
    Document {
        /// Document identifier.
        document: String,
        /// Full text content at the time of the open.
        content: String,
    },

    /// An edit operation, relayed verbatim to the other members of the room.
    ///
    /// The payload is an opaque editor delta; the server never interprets it.
    #[serde(rename = "edit")]
    Edit {
        /// Opaque delta payload.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },

    /// Full content snapshot to persist for the currently open document.
    #[serde(rename = "save")]
    Save {
        /// Full text content to store.
        content: String,
    },

    /// Acknowledgment of a request.
    #[serde(rename = "ack")]
    Ack {
        /// ID of the acknowledged request.
        id: u64,
    },

    /// Error response.
    #[serde(rename = "error")]
    Error {
        /// ID of the failed request (0 if not applicable).
        id: u64,
        /// Error code.
        code: u16,
        /// Human-readable error message.
        message: String,
    },

    /// Keepalive ping.
    #[serde(rename = "ping")]
    Ping {
        /// Optional timestamp.
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Keepalive pong.
    #[serde(rename = "pong")]
    Pong {
        /// Echoed timestamp from ping.
        #[serde(skip_serializing_if = "Option::is_none")]
        timestamp: Option<u64>,
    },

    /// Initial connection handshake.
    #[serde(rename = "connect")]
    Connect {
        /// Protocol version.
        version: u8,
        /// Optional authentication token.
        #[serde(skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },

    /// Connection established response.
    #[serde(rename = "connected")]
    Connected {
        /// Unique connection identifier.
        connection_id: String,
        /// Negotiated protocol version.
        version: u8,
        /// Recommended heartbeat interval in milliseconds.
        heartbeat: u32,
    },
}

impl Frame {
    /// Get the frame type.
    #[must_use]
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Open { .. } => FrameType::Open,
            Frame::Document { .. } => FrameType::Document,
            Frame::Edit { .. } => FrameType::Edit,
            Frame::Save { .. } => FrameType::Save,
            Frame::Ack { .. } => FrameType::Ack,
            Frame::Error { .. } => FrameType::Error,
            Frame::Ping { .. } => FrameType::Ping,
            Frame::Pong { .. } => FrameType::Pong,
            Frame::Connect { .. } => FrameType::Connect,
            Frame::Connected { .. } => FrameType::Connected,
        }
    }

    /// Create a new Open frame.
    #[must_use]
    pub fn open(id: u64, document: impl Into<String>) -> Self {
        Frame::Open {
            id,
            document: document.into(),
        }
    }

    /// Create a new Document frame.
    #[must_use]
    pub fn document(document: impl Into<String>, content: impl Into<String>) -> Self {
        Frame::Document {
            document: document.into(),
            content: content.into(),
        }
    }

    /// Create a new Edit frame.
    #[must_use]
    pub fn edit(payload: impl Into<Vec<u8>>) -> Self {
        Frame::Edit {
            payload: payload.into(),
        }
    }

    /// Create a new Save frame.
    #[must_use]
    pub fn save(content: impl Into<String>) -> Self {
        Frame::Save {
            content: content.into(),
        }
    }

    /// Create a new Ack frame.
    #[must_use]
    pub fn ack(id: u64) -> Self {
        Frame::Ack { id }
    }

    /// Create a new Error frame.
    #[must_use]
    pub fn error(id: u64, code: u16, message: impl Into<String>) -> Self {
        Frame::Error {
            id,
            code,
            message: message.into(),
        }
    }

    /// Create a new Ping frame.
    #[must_use]
    pub fn ping() -> Self {
        Frame::Ping { timestamp: None }
    }

    /// Create a new Ping frame with timestamp.
    #[must_use]
    pub fn ping_with_timestamp(timestamp: u64) -> Self {
        Frame::Ping {
            timestamp: Some(timestamp),
        }
    }

    /// Create a new Pong frame.
    #[must_use]
    pub fn pong(timestamp: Option<u64>) -> Self {
        Frame::Pong { timestamp }
    }

    /// Create a new Connect frame.
    #[must_use]
    pub fn connect(version: u8, token: Option<String>) -> Self {
        Frame::Connect { version, token }
    }

    /// Create a new Connected frame.
    #[must_use]
    pub fn connected(connection_id: impl Into<String>, version: u8, heartbeat: u32) -> Self {
        Frame::Connected {
            connection_id: connection_id.into(),
            version,
            heartbeat,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_type() {
        let open = Frame::open(1, "notes");
        assert_eq!(open.frame_type(), FrameType::Open);

        let edit = Frame::edit(b"delta".to_vec());
        assert_eq!(edit.frame_type(), FrameType::Edit);

        let save = Frame::save("full text");
        assert_eq!(save.frame_type(), FrameType::Save);
    }

    #[test]
    fn test_frame_type_conversion() {
        assert_eq!(FrameType::try_from(0x01), Ok(FrameType::Open));
        assert_eq!(FrameType::try_from(0x04), Ok(FrameType::Save));
        assert_eq!(FrameType::try_from(0x0A), Ok(FrameType::Connected));
        assert!(FrameType::try_from(0x0B).is_err());
    }

    #[test]
    fn test_document_frame_carries_content() {
        let frame = Frame::document("doc1", "hello");
        match frame {
            Frame::Document { document, content } => {
                assert_eq!(document, "doc1");
                assert_eq!(content, "hello");
            }
            other => panic!("Expected Document frame, got {other:?}"),
        }
    }
}
