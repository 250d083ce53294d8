//! Transport abstraction layer for docsync.
//!
//! Provides the [`Connection`], [`ConnectionReader`] and
//! [`ConnectionWriter`] traits that the per-client pumps are written
//! against. A connection is split once, right after the upgrade, so the
//! read direction and the write direction can run on different tasks
//! without sharing a lock.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{
    IncomingConnection, Rejection, WebSocketConnection, WebSocketReader,
    WebSocketTransport, WebSocketWriter,
};

use std::fmt;
use std::future::Future;

use bytes::Bytes;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Why a connection is being closed, sent to the peer in the close frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code (1000 normal, 1008 policy, 1011 server error).
    pub code: u16,
    /// Short human-readable reason.
    pub reason: String,
}

impl CloseReason {
    /// Creates a close reason.
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

/// An established duplex connection, before it is split.
pub trait Connection: Send + 'static {
    /// The receiving half.
    type Reader: ConnectionReader;
    /// The sending half.
    type Writer: ConnectionWriter;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;

    /// Splits the connection into independently owned halves.
    fn split(self) -> (Self::Reader, Self::Writer);
}

/// The receiving half of a connection.
///
/// The returned futures are `Send` so generic pumps can be handed to
/// `tokio::spawn`.
pub trait ConnectionReader: Send + 'static {
    /// Receives the next binary message from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &mut self,
    ) -> impl Future<Output = Result<Option<Bytes>, TransportError>> + Send;
}

/// The sending half of a connection.
pub trait ConnectionWriter: Send + 'static {
    /// Sends one binary message to the remote peer.
    fn send(
        &mut self,
        data: Bytes,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Sends a close frame (with `reason`, if given) and closes the
    /// sending side.
    fn close(
        &mut self,
        reason: Option<CloseReason>,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
