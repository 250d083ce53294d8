//! Per-connection client: two pumps between a connection and its room.
//!
//! Each client runs two loops:
//!
//! - **read pump** (on the connection's task): transport → room. Reads a
//!   frame, classifies it by its leading tag, and hands it to the room.
//! - **write pump** (on its own task): room → transport. Drains the
//!   outbound queue the room fills and writes each frame.
//!
//! A stalled write never blocks reads, and the other way round. When
//! either pump stops, the client is torn down as a whole: it leaves the
//! room, the other pump is drained or cancelled, and the socket closes.
//!
//! ```text
//!            ┌──────────── read pump ────────────┐
//! socket ──► │ recv → classify → room.broadcast  │ ──► room inbox
//!            └───────────────────────────────────┘
//!            ┌──────────── write pump ───────────┐
//! socket ◄── │ send ◄── outbound queue           │ ◄── room fan-out
//!            └───────────────────────────────────┘
//! ```

use bytes::Bytes;
use docsync_protocol::{MessageType, SyncStep, classify};
use docsync_room::{ClientId, ClientReceiver, RoomError, RoomHandle};
use docsync_transport::{
    CloseReason, Connection, ConnectionReader, ConnectionWriter,
    TransportError,
};
use tokio::sync::mpsc;

use crate::{ClientConfig, DocsyncError};

/// Server-side proxy for one connected participant.
pub struct Client {
    id: ClientId,
    room: RoomHandle,
    config: ClientConfig,
}

impl Client {
    /// Creates a client for `room`. Nothing happens until [`run`](Self::run).
    pub fn new(id: ClientId, room: RoomHandle, config: ClientConfig) -> Self {
        Self { id, room, config }
    }

    /// Returns the client's id.
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Joins the room and pumps frames until the connection ends.
    ///
    /// The room queues its current state as the first outbound frame
    /// during the join, so the client is caught up before anything else
    /// reaches it.
    pub async fn run<C: Connection>(self, conn: C) -> Result<(), DocsyncError> {
        match self.room.join(self.id).await {
            Ok(outbound) => self.attach(conn, outbound).await,
            Err(e) => {
                let (_reader, mut writer) = conn.split();
                let reason = CloseReason::new(1011, "room unavailable");
                let _ = writer.close(Some(reason)).await;
                Err(e.into())
            }
        }
    }

    /// Pumps frames for a client that has already joined its room.
    ///
    /// `outbound` must come from [`RoomHandle::join`] with this client's
    /// id. The client ends when the peer goes away, a pump fails, or the
    /// room drops the client (eviction as a slow consumer, room shutdown).
    pub async fn attach<C: Connection>(
        self,
        conn: C,
        outbound: ClientReceiver,
    ) -> Result<(), DocsyncError> {
        let client_id = self.id;
        let room_id = self.room.room_id().clone();
        let (mut reader, writer) = conn.split();
        let (frames, removed) = outbound.into_parts();

        let mut write_task = tokio::spawn(write_pump(
            writer,
            frames,
            client_id,
            self.config.clone(),
        ));

        // Whichever side stops first ends the client.
        let (result, drain) = tokio::select! {
            result = read_pump(&mut reader, &self.room, client_id, &self.config) => (result, true),
            () = removed.wait() => {
                tracing::info!(%client_id, %room_id, "removed by room");
                (Ok(()), true)
            }
            result = &mut write_task => {
                match result {
                    Ok(Err(e)) => tracing::debug!(%client_id, error = %e, "write pump failed"),
                    Err(e) => tracing::warn!(%client_id, error = %e, "write pump panicked"),
                    Ok(Ok(())) => {}
                }
                (Ok(()), false)
            }
        };

        match self.room.leave(client_id).await {
            Ok(()) => {}
            Err(RoomError::NotInRoom(..)) | Err(RoomError::Unavailable(_)) => {
                tracing::debug!(%client_id, %room_id, "client already removed from room");
            }
            Err(e) => tracing::debug!(%client_id, error = %e, "leave failed"),
        }

        // The outbound queue is closed by now: the write pump flushes what
        // is left and sends a close frame, unless the peer stopped reading.
        if drain {
            match tokio::time::timeout(self.config.drain_timeout, &mut write_task).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::debug!(%client_id, "write pump did not drain in time, aborting");
                    write_task.abort();
                }
            }
        }

        tracing::info!(%client_id, %room_id, "client disconnected");
        result
    }
}

/// Reads frames from the transport and submits them to the room.
///
/// Returns `Ok(())` on a clean close. A frame whose leading tag cannot be
/// read ends the connection: it cannot be routed. Everything past the tag
/// is opaque; a Sync body whose step cannot be read is still relayed.
async fn read_pump<R: ConnectionReader>(
    reader: &mut R,
    room: &RoomHandle,
    client_id: ClientId,
    config: &ClientConfig,
) -> Result<(), DocsyncError> {
    loop {
        let received = match config.read_timeout {
            Some(limit) => match tokio::time::timeout(limit, reader.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    tracing::info!(%client_id, "read timed out");
                    return Err(TransportError::ConnectionClosed("read timed out".into()).into());
                }
            },
            None => reader.recv().await,
        };

        let frame = match received {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                tracing::debug!(%client_id, "connection closed cleanly");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%client_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let header = match classify(&frame) {
            Ok(header) => header,
            Err(e) => {
                tracing::warn!(%client_id, error = %e, "unreadable message type, closing");
                return Err(e.into());
            }
        };

        match header.message_type {
            Some(MessageType::Sync) => {
                if let Err(e) = SyncStep::peek(&frame[header.body_offset..]) {
                    tracing::debug!(%client_id, error = %e, "unreadable sync step, relaying as-is");
                }
            }
            Some(_) => {}
            None => {
                tracing::debug!(%client_id, tag = header.tag, "unknown message type, relaying as-is");
            }
        }

        room.broadcast(client_id, header.message_type, frame).await?;
    }
}

/// Writes every frame from the outbound queue to the transport.
///
/// When the room closes the queue (leave, eviction, shutdown) the pump
/// sends a close frame and returns. A failed write returns the error.
async fn write_pump<W: ConnectionWriter>(
    mut writer: W,
    mut outbound: mpsc::Receiver<Bytes>,
    client_id: ClientId,
    config: ClientConfig,
) -> Result<(), TransportError> {
    while let Some(frame) = outbound.recv().await {
        let sent = match config.write_timeout {
            Some(limit) => tokio::time::timeout(limit, writer.send(frame))
                .await
                .unwrap_or_else(|_| {
                    Err(TransportError::ConnectionClosed("write timed out".into()))
                }),
            None => writer.send(frame).await,
        };
        if let Err(e) = sent {
            tracing::debug!(%client_id, error = %e, "send error");
            return Err(e);
        }
    }

    tracing::debug!(%client_id, "outbound queue closed");
    writer.close(None).await
}
