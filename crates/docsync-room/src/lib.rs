//! Room lifecycle management for docsync.
//!
//! Each room runs as an isolated Tokio task (actor model) that owns one
//! document's latest state and the outbound queues of its clients.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — creates rooms on first use, one per document
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`ContentProvider`] — where a new room's initial text comes from
//! - [`RoomState`] — lifecycle state machine
//! - [`RoomConfig`] — queue sizes and echo behaviour

mod config;
mod content;
mod error;
mod id;
mod registry;
mod room;

pub use config::{RoomConfig, RoomState};
pub use content::{
    ContentError, ContentProvider, DirectoryContentProvider, Document,
    MemoryContentProvider,
};
pub use error::RoomError;
pub use id::{ClientId, DocumentId};
pub use registry::RoomRegistry;
pub use room::{ClientReceiver, Removed, RoomHandle, RoomInfo};
