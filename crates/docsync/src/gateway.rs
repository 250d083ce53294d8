//! Connection gateway: upgrade, route by room id, hand off to a client.
//!
//! The flow for each accepted connection is:
//!   1. Upgrade handshake; the path must be `{prefix}{room}` with a
//!      non-empty room id, otherwise the request gets an HTTP error and
//!      nothing else happens.
//!   2. Look up (or create) the room in the registry.
//!   3. Create a [`Client`] and run its pumps until the connection ends.

use std::sync::Arc;

use docsync_room::{
    ClientId, ClientReceiver, ContentProvider, DocumentId, RoomError,
    RoomHandle, RoomRegistry,
};
use docsync_transport::{
    CloseReason, Connection, ConnectionWriter, IncomingConnection, Rejection,
};

use crate::{Client, ClientConfig, DocsyncError};

/// Default path prefix of the upgrade endpoint.
pub const DEFAULT_ROUTE_PREFIX: &str = "/share/ws/";

/// Close code sent when the requested document does not exist.
const CLOSE_NOT_FOUND: u16 = 1008;

/// Close code sent when the room could not be created for another reason.
const CLOSE_SERVER_ERROR: u16 = 1011;

/// Extracts the room id from an upgrade request path.
///
/// `prefix` must end with `/`. The bare prefix, with or without its
/// trailing slash, is a request with an empty room id (400). Paths outside
/// the prefix are unknown routes (404).
pub fn room_id_from_path(
    prefix: &str,
    path: &str,
) -> Result<DocumentId, Rejection> {
    let bare = prefix.trim_end_matches('/');
    if path == bare {
        return Err(Rejection::bad_request("room ID is required"));
    }
    let Some(raw) = path.strip_prefix(prefix) else {
        return Err(Rejection::not_found("unknown route"));
    };
    DocumentId::parse(raw)
        .ok_or_else(|| Rejection::bad_request("room ID is required"))
}

/// Turns accepted connections into running clients.
pub struct ConnectionGateway<P: ContentProvider> {
    registry: Arc<RoomRegistry<P>>,
    route_prefix: String,
    client_config: ClientConfig,
}

impl<P: ContentProvider> ConnectionGateway<P> {
    /// Creates a gateway that serves rooms from `registry`.
    pub fn new(
        registry: Arc<RoomRegistry<P>>,
        route_prefix: impl Into<String>,
        client_config: ClientConfig,
    ) -> Self {
        let mut route_prefix = route_prefix.into();
        if !route_prefix.ends_with('/') {
            route_prefix.push('/');
        }
        Self {
            registry,
            route_prefix,
            client_config,
        }
    }

    /// Returns the registry this gateway serves rooms from.
    pub fn registry(&self) -> &Arc<RoomRegistry<P>> {
        &self.registry
    }

    /// Upgrades an incoming connection and serves it until it ends.
    pub async fn handle(
        &self,
        incoming: IncomingConnection,
    ) -> Result<(), DocsyncError> {
        let peer = incoming.peer_addr();
        let prefix = self.route_prefix.clone();
        let (conn, room_id) = incoming
            .upgrade(move |path: &str| room_id_from_path(&prefix, path))
            .await?;

        tracing::debug!(%peer, %room_id, conn_id = %conn.id(), "upgrade accepted");
        self.serve(conn, room_id).await
    }

    /// Serves an already-upgraded connection for `room_id`.
    ///
    /// If the room cannot be created the connection is closed right away
    /// with a close code (1008 for a missing document, 1011 otherwise) and
    /// no client is registered anywhere.
    pub async fn serve<C: Connection>(
        &self,
        conn: C,
        room_id: DocumentId,
    ) -> Result<(), DocsyncError> {
        let client_id = ClientId(conn.id().into_inner());

        let (room, outbound) = match self.join_room(&room_id, client_id).await {
            Ok(joined) => joined,
            Err(e) => {
                let reason = match &e {
                    RoomError::Content(c) if c.is_not_found() => {
                        CloseReason::new(CLOSE_NOT_FOUND, "document not found")
                    }
                    _ => CloseReason::new(CLOSE_SERVER_ERROR, "room unavailable"),
                };
                tracing::info!(%client_id, %room_id, error = %e, "rejecting connection");
                let (_reader, mut writer) = conn.split();
                let _ = writer.close(Some(reason)).await;
                return Err(e.into());
            }
        };

        tracing::info!(%client_id, %room_id, "client connected");
        Client::new(client_id, room, self.client_config.clone())
            .attach(conn, outbound)
            .await
    }

    /// Finds the room and joins it.
    ///
    /// An idle sweep can stop the room between the lookup and the join.
    /// The registry replaces stopped rooms, so one more lookup is enough.
    async fn join_room(
        &self,
        room_id: &DocumentId,
        client_id: ClientId,
    ) -> Result<(RoomHandle, ClientReceiver), RoomError> {
        let room = self.registry.get_or_create(room_id).await?;
        match room.join(client_id).await {
            Ok(outbound) => Ok((room, outbound)),
            Err(RoomError::Unavailable(_)) => {
                tracing::debug!(%client_id, %room_id, "room stopped before join, retrying");
                let room = self.registry.get_or_create(room_id).await?;
                let outbound = room.join(client_id).await?;
                Ok((room, outbound))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use docsync_protocol::encode_seed;
    use docsync_room::{Document, MemoryContentProvider, RoomConfig};

    use super::*;
    use crate::testing::{Outgoing, pair};

    fn gateway() -> ConnectionGateway<MemoryContentProvider> {
        let provider = MemoryContentProvider::new().with_document(
            DocumentId::parse("doc-42").unwrap(),
            Document::new("Title", "# Title\n"),
        );
        let registry = Arc::new(RoomRegistry::new(provider, RoomConfig::default()));
        ConnectionGateway::new(registry, "/share/ws", ClientConfig::default())
    }

    #[test]
    fn test_room_id_from_path_accepts_room() {
        let id = room_id_from_path("/share/ws/", "/share/ws/doc-42").unwrap();
        assert_eq!(id.as_str(), "doc-42");
    }

    #[test]
    fn test_room_id_from_path_rejects_empty_id() {
        for path in ["/share/ws/", "/share/ws"] {
            let rejection = room_id_from_path("/share/ws/", path).unwrap_err();
            assert_eq!(rejection.status(), 400, "{path}");
        }
    }

    #[test]
    fn test_room_id_from_path_rejects_nested_segments() {
        let rejection =
            room_id_from_path("/share/ws/", "/share/ws/a/b").unwrap_err();
        assert_eq!(rejection.status(), 400);
    }

    #[test]
    fn test_room_id_from_path_unknown_route() {
        let rejection = room_id_from_path("/share/ws/", "/other").unwrap_err();
        assert_eq!(rejection.status(), 404);
    }

    #[test]
    fn test_gateway_normalizes_prefix() {
        assert_eq!(gateway().route_prefix, "/share/ws/");
    }

    #[tokio::test]
    async fn test_serve_unknown_document_closes_with_not_found() {
        let gateway = gateway();
        let (conn, mut peer) = pair(1);
        let missing = DocumentId::parse("missing").unwrap();

        let result = gateway.serve(conn, missing).await;

        assert!(matches!(result, Err(DocsyncError::Room(RoomError::Content(_)))));
        assert_eq!(
            peer.next().await,
            Outgoing::Closed(Some(CloseReason::new(CLOSE_NOT_FOUND, "document not found")))
        );
        assert_eq!(gateway.registry().room_count().await, 0);
    }

    #[tokio::test]
    async fn test_serve_shares_room_between_connections() {
        let gateway = Arc::new(gateway());
        let id = DocumentId::parse("doc-42").unwrap();

        let (conn_a, mut peer_a) = pair(1);
        let (conn_b, mut peer_b) = pair(2);
        let gw = Arc::clone(&gateway);
        let id_a = id.clone();
        tokio::spawn(async move { gw.serve(conn_a, id_a).await });
        let gw = Arc::clone(&gateway);
        tokio::spawn(async move { gw.serve(conn_b, id).await });

        let seed = encode_seed("# Title\n");
        assert_eq!(peer_a.next_frame().await, seed);
        assert_eq!(peer_b.next_frame().await, seed);
        assert_eq!(gateway.registry().room_count().await, 1);
    }

    #[tokio::test]
    async fn test_serve_rejoins_room_stopped_before_join() {
        let gateway = gateway();
        let id = DocumentId::parse("doc-42").unwrap();
        let stale = gateway.registry().get_or_create(&id).await.unwrap();
        // Queued ahead of the join; the room stops before it answers.
        stale.shutdown().await.unwrap();

        let (conn, mut peer) = pair(1);
        let gw = Arc::new(gateway);
        let served = Arc::clone(&gw);
        tokio::spawn(async move { served.serve(conn, id).await });

        assert_eq!(peer.next_frame().await, encode_seed("# Title\n"));
        let current = gw
            .registry()
            .get(&DocumentId::parse("doc-42").unwrap())
            .await
            .unwrap();
        assert!(!current.same_room(&stale));
        assert_eq!(current.info().await.unwrap().client_count, 1);
    }
}
