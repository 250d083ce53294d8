//! # Docsync
//!
//! Real-time collaborative document sync hub.
//!
//! Docsync relays opaque CRDT frames between every editor of the same
//! document. The server never merges edits: each room keeps the latest
//! full-state Sync frame it has seen, hands it to late joiners, and fans
//! every frame out to all members in the order it arrived.
//!
//! ## Layers
//!
//! ```text
//! WebSocketTransport → ConnectionGateway → RoomRegistry → Room → Client pumps
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsync::prelude::*;
//!
//! # async fn start() -> Result<(), DocsyncError> {
//! let server = SyncServerBuilder::new()
//!     .bind("0.0.0.0:8080")
//!     .build(DirectoryContentProvider::new("./share"))
//!     .await?;
//! server.run().await
//! # }
//! ```

mod client;
mod config;
mod error;
mod gateway;
mod server;
#[cfg(test)]
mod testing;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig};
pub use error::DocsyncError;
pub use gateway::{ConnectionGateway, DEFAULT_ROUTE_PREFIX, room_id_from_path};
pub use server::{SyncServer, SyncServerBuilder};

/// Everything needed to run a server or drive a room by hand.
pub mod prelude {
    pub use crate::{
        Client, ClientConfig, ConnectionGateway, DEFAULT_ROUTE_PREFIX,
        DocsyncError, ServerConfig, SyncServer, SyncServerBuilder,
    };
    pub use docsync_protocol::{
        MessageType, ProtocolError, SyncFrame, SyncStep, classify,
        decode_seed, encode_seed, encode_sync,
    };
    pub use docsync_room::{
        ClientId, ContentError, ContentProvider, DirectoryContentProvider,
        Document, DocumentId, MemoryContentProvider, RoomConfig, RoomError,
        RoomHandle, RoomInfo, RoomRegistry, RoomState,
    };
    pub use docsync_transport::{
        CloseReason, Connection, ConnectionId, ConnectionReader,
        ConnectionWriter, TransportError,
    };
}
