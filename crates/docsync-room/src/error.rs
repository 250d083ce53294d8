//! Error types for the room layer.

use crate::{ClientId, ContentError, DocumentId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// The content provider could not produce the document, so no room
    /// was created.
    #[error("cannot create room: {0}")]
    Content(#[from] ContentError),

    /// The client is already registered in this room.
    #[error("{0} already in room {1}")]
    AlreadyJoined(ClientId, DocumentId),

    /// The client is not registered in this room (never joined, left, or
    /// was evicted as a slow consumer).
    #[error("{0} not in room {1}")]
    NotInRoom(ClientId, DocumentId),

    /// The room's actor has stopped or its command channel is closed.
    #[error("room {0} is unavailable")]
    Unavailable(DocumentId),
}
