//! Room actor: an isolated Tokio task that owns one document session.
//!
//! Each room runs in its own task, communicating with the outside world
//! through an mpsc channel. The actor is the only code that touches the
//! room's document state and client set, so every join, leave and
//! broadcast is applied in the order it arrives. That single ordering
//! point is what makes last-write-wins well defined.

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;
use docsync_protocol::MessageType;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{ClientId, DocumentId, RoomConfig, RoomError, RoomState};

/// Receiving end of a client's membership in a room.
///
/// Yields frames in broadcast order. Returns `None` once the room has
/// dropped the client (leave, eviction, or room shutdown) and the frames
/// queued before that have been read.
#[derive(Debug)]
pub struct ClientReceiver {
    frames: mpsc::Receiver<Bytes>,
    removed: Removed,
}

impl ClientReceiver {
    /// Receives the next queued frame.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.frames.recv().await
    }

    /// Receives a frame if one is queued right now.
    pub fn try_recv(&mut self) -> Result<Bytes, TryRecvError> {
        self.frames.try_recv()
    }

    /// Splits into the frame queue and the removal notice, so they can be
    /// watched from different tasks.
    pub fn into_parts(self) -> (mpsc::Receiver<Bytes>, Removed) {
        (self.frames, self.removed)
    }
}

/// Resolves as soon as the room stops holding a client.
///
/// Unlike the frame queue, it does not wait for queued frames to be read:
/// a client whose peer stopped reading learns about its eviction right
/// away.
#[derive(Debug)]
pub struct Removed(oneshot::Receiver<()>);

impl Removed {
    /// Waits until the client has left, been evicted, or the room stopped.
    pub async fn wait(self) {
        let _ = self.0.await;
    }
}

/// The room's side of a client: dropping it closes both the frame queue
/// and the removal notice.
struct ClientSlot {
    frames: mpsc::Sender<Bytes>,
    _removed: oneshot::Sender<()>,
}

/// Commands sent to a room actor through its channel.
///
/// The `oneshot::Sender` in some variants is a reply channel: the caller
/// sends a command and waits for the response on it.
pub(crate) enum RoomCommand {
    /// Register a client and hand back its outbound queue.
    Join {
        client_id: ClientId,
        reply: oneshot::Sender<Result<ClientReceiver, RoomError>>,
    },

    /// Deregister a client, closing its outbound queue.
    Leave {
        client_id: ClientId,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Apply (if Sync) and fan out a frame from a client.
    Broadcast {
        origin: ClientId,
        message_type: Option<MessageType>,
        frame: Bytes,
    },

    /// Read the current document state.
    Snapshot { reply: oneshot::Sender<Bytes> },

    /// Read room metadata.
    GetInfo { reply: oneshot::Sender<RoomInfo> },

    /// Stop if the room has been empty for at least `max_idle`.
    ShutdownIfIdle {
        max_idle: Duration,
        reply: oneshot::Sender<bool>,
    },

    /// Stop unconditionally.
    Shutdown,
}

/// A snapshot of room metadata (not the document itself).
#[derive(Debug, Clone)]
pub struct RoomInfo {
    /// The room's document id.
    pub room_id: DocumentId,
    /// Title reported by the content provider.
    pub title: String,
    /// Current lifecycle state.
    pub state: RoomState,
    /// Number of connected clients.
    pub client_count: usize,
    /// Size of the stored document state in bytes.
    pub document_len: usize,
    /// How long the room has been empty, if it is.
    pub idle_for: Option<Duration>,
}

/// Handle to a running room actor. Used to send commands to it.
///
/// This is cheap to clone: it's just an `mpsc::Sender` wrapper. Clients
/// hold one as their back reference to the room; the room itself owns the
/// clients' queues, so there is no ownership cycle.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: DocumentId,
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for RoomHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoomHandle")
            .field("room_id", &self.room_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl RoomHandle {
    /// Returns the room's document id.
    pub fn room_id(&self) -> &DocumentId {
        &self.room_id
    }

    /// Returns `true` if both handles talk to the same actor.
    pub fn same_room(&self, other: &RoomHandle) -> bool {
        self.sender.same_channel(&other.sender)
    }

    /// Returns `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn unavailable(&self) -> RoomError {
        RoomError::Unavailable(self.room_id.clone())
    }

    /// Registers a client and returns its outbound queue.
    ///
    /// If the room holds document state, it is already queued as the first
    /// frame, ahead of anything broadcast after the join.
    pub async fn join(
        &self,
        client_id: ClientId,
    ) -> Result<ClientReceiver, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Join {
                client_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Deregisters a client.
    pub async fn leave(&self, client_id: ClientId) -> Result<(), RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Leave {
                client_id,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())?
    }

    /// Submits a frame for broadcast (fire-and-forget).
    ///
    /// Waits only while the room's inbox is full.
    pub async fn broadcast(
        &self,
        origin: ClientId,
        message_type: Option<MessageType>,
        frame: Bytes,
    ) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Broadcast {
                origin,
                message_type,
                frame,
            })
            .await
            .map_err(|_| self.unavailable())
    }

    /// Returns the current document state.
    pub async fn snapshot(&self) -> Result<Bytes, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Snapshot { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Requests the current room info.
    pub async fn info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Stops the room if it has had no clients for at least `max_idle`.
    /// Returns whether it stopped.
    pub async fn shutdown_if_idle(
        &self,
        max_idle: Duration,
    ) -> Result<bool, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::ShutdownIfIdle {
                max_idle,
                reply: reply_tx,
            })
            .await
            .map_err(|_| self.unavailable())?;
        reply_rx.await.map_err(|_| self.unavailable())
    }

    /// Tells the room to shut down. Connected clients see their queues
    /// close.
    pub async fn shutdown(&self) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Shutdown)
            .await
            .map_err(|_| self.unavailable())
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    room_id: DocumentId,
    title: String,
    config: RoomConfig,
    /// The most recent Sync frame, verbatim.
    document: Bytes,
    /// Per-client outbound queues and removal notices.
    clients: HashMap<ClientId, ClientSlot>,
    /// When the room last became empty; `None` while clients are present.
    idle_since: Option<Instant>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl RoomActor {
    /// Runs the actor loop, processing commands until shutdown.
    async fn run(mut self) {
        tracing::info!(
            room_id = %self.room_id,
            title = %self.title,
            document_len = self.document.len(),
            "room actor started"
        );

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join { client_id, reply } => {
                    let result = self.handle_join(client_id);
                    let _ = reply.send(result);
                }
                RoomCommand::Leave { client_id, reply } => {
                    let result = self.handle_leave(client_id);
                    let _ = reply.send(result);
                }
                RoomCommand::Broadcast {
                    origin,
                    message_type,
                    frame,
                } => {
                    self.handle_broadcast(origin, message_type, frame);
                }
                RoomCommand::Snapshot { reply } => {
                    let _ = reply.send(self.document.clone());
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
                RoomCommand::ShutdownIfIdle { max_idle, reply } => {
                    let idle = self.idle_for().is_some_and(|d| d >= max_idle);
                    let _ = reply.send(idle);
                    if idle {
                        tracing::info!(room_id = %self.room_id, "idle room shutting down");
                        break;
                    }
                }
                RoomCommand::Shutdown => {
                    tracing::info!(room_id = %self.room_id, "room shutting down");
                    break;
                }
            }
        }

        tracing::info!(room_id = %self.room_id, "room actor stopped");
    }

    fn handle_join(
        &mut self,
        client_id: ClientId,
    ) -> Result<ClientReceiver, RoomError> {
        if self.clients.contains_key(&client_id) {
            return Err(RoomError::AlreadyJoined(
                client_id,
                self.room_id.clone(),
            ));
        }

        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);

        // Catch-up frame goes in before the client is visible to any
        // broadcast. Capacity is at least 1, so this cannot fail.
        if !self.document.is_empty() {
            let _ = tx.try_send(self.document.clone());
        }

        let (removed_tx, removed_rx) = oneshot::channel();
        self.clients.insert(
            client_id,
            ClientSlot {
                frames: tx,
                _removed: removed_tx,
            },
        );
        self.idle_since = None;
        tracing::info!(
            room_id = %self.room_id,
            %client_id,
            clients = self.clients.len(),
            "client joined"
        );
        Ok(ClientReceiver {
            frames: rx,
            removed: Removed(removed_rx),
        })
    }

    fn handle_leave(&mut self, client_id: ClientId) -> Result<(), RoomError> {
        if self.clients.remove(&client_id).is_none() {
            return Err(RoomError::NotInRoom(client_id, self.room_id.clone()));
        }
        tracing::info!(
            room_id = %self.room_id,
            %client_id,
            clients = self.clients.len(),
            "client left"
        );
        self.mark_idle_if_empty();
        Ok(())
    }

    fn handle_broadcast(
        &mut self,
        origin: ClientId,
        message_type: Option<MessageType>,
        frame: Bytes,
    ) {
        if !self.clients.contains_key(&origin) {
            tracing::debug!(
                room_id = %self.room_id,
                %origin,
                "frame from non-member, ignoring"
            );
            return;
        }

        if message_type == Some(MessageType::Sync) {
            self.document = frame.clone();
        }

        let mut dropped = Vec::new();
        for (client_id, slot) in &self.clients {
            if *client_id == origin && !self.config.echo_to_sender {
                continue;
            }
            match slot.frames.try_send(frame.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        room_id = %self.room_id,
                        %client_id,
                        "outbound queue full, evicting slow consumer"
                    );
                    dropped.push(*client_id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        room_id = %self.room_id,
                        %client_id,
                        "outbound queue closed, removing client"
                    );
                    dropped.push(*client_id);
                }
            }
        }

        // Removing the slot closes the queue and fires the removal notice,
        // so the client stops reading even if its write pump is stuck.
        for client_id in dropped {
            self.clients.remove(&client_id);
        }
        self.mark_idle_if_empty();

        tracing::debug!(
            room_id = %self.room_id,
            %origin,
            ?message_type,
            len = frame.len(),
            clients = self.clients.len(),
            "frame broadcast"
        );
    }

    fn mark_idle_if_empty(&mut self) {
        if self.clients.is_empty() && self.idle_since.is_none() {
            self.idle_since = Some(Instant::now());
        }
    }

    fn idle_for(&self) -> Option<Duration> {
        self.idle_since.map(|since| since.elapsed())
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            title: self.title.clone(),
            state: RoomState::for_client_count(self.clients.len()),
            client_count: self.clients.len(),
            document_len: self.document.len(),
            idle_for: self.idle_for(),
        }
    }
}

/// Spawns a new room actor task and returns a handle to communicate with it.
pub(crate) fn spawn_room(
    room_id: DocumentId,
    title: String,
    document: Bytes,
    config: RoomConfig,
) -> RoomHandle {
    let config = config.normalized();
    let (tx, rx) = mpsc::channel(config.inbox_capacity);

    let actor = RoomActor {
        room_id: room_id.clone(),
        title,
        config,
        document,
        clients: HashMap::new(),
        idle_since: Some(Instant::now()),
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle {
        room_id,
        sender: tx,
    }
}
