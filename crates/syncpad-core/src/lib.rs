//! # syncpad-core
//!
//! Session registry, relay engine, and autosave coordination for the
//! syncpad collaborative document server.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Room** - Groups the connections editing the same document
//! - **Registry** - Join/leave lifecycle and edit fan-out between peers
//! - **AutosaveCoordinator** - Periodic snapshot persistence
//! - **EditMessage** - Internal relay message type
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Connection │────▶│  Registry   │────▶│    Room     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │
//!        ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐
//! │  Autosave   │────▶│    Store    │
//! └─────────────┘     └─────────────┘
//! ```

pub mod autosave;
pub mod message;
pub mod registry;
pub mod room;

pub use autosave::{AutosaveCoordinator, DEFAULT_FLUSH_INTERVAL};
pub use message::EditMessage;
pub use registry::{JoinedRoom, Registry, RegistryConfig, RegistryError};
pub use room::{validate_document_id, DocumentId, Room};
