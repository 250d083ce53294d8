//! Unified error type for docsync.

use docsync_protocol::ProtocolError;
use docsync_room::RoomError;
use docsync_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DocsyncError {
    /// A transport-level error (upgrade, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A frame whose message type could not be read.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (content lookup, unavailable room).
    #[error(transparent)]
    Room(#[from] RoomError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let docsync_err: DocsyncError = err.into();
        assert!(matches!(docsync_err, DocsyncError::Transport(_)));
        assert!(docsync_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::TruncatedVarint(0);
        let docsync_err: DocsyncError = err.into();
        assert!(matches!(docsync_err, DocsyncError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let id = docsync_room::DocumentId::parse("doc").unwrap();
        let err = RoomError::Unavailable(id);
        let docsync_err: DocsyncError = err.into();
        assert!(matches!(docsync_err, DocsyncError::Room(_)));
        assert_eq!(docsync_err.to_string(), "room doc is unavailable");
    }
}
