//! # syncpad-protocol
//!
//! Wire protocol definitions for the syncpad collaborative document server.
//!
//! This crate defines the binary protocol used for communication between
//! editor clients and the server, including frame types, codecs, and
//! versioning.
//!
//! ## Frame Types
//!
//! - `Open` / `Document` - Open a document and receive its content
//! - `Edit` - Opaque edit operations relayed between room members
//! - `Save` - Full-content snapshots for persistence
//! - `Ack` / `Error` - Acknowledgments and errors
//!
//! ## Example
//!
//! ```rust
//! use syncpad_protocol::{Frame, codec};
//!
//! // Create an edit frame using the helper method
//! let frame = Frame::edit(b"{\"insert\":\"hello\"}".to_vec());
//!
//! // Encode and decode
//! let encoded = codec::encode(&frame).unwrap();
//! let decoded = codec::decode(&encoded).unwrap();
//! ```

pub mod codec;
pub mod frames;
pub mod version;

pub use codec::{decode, encode, ProtocolError};
pub use frames::{codes, Frame, FrameType};
pub use version::{Version, PROTOCOL_VERSION};
