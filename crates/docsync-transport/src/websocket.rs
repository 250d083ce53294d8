//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! Accepting is split in two steps so the listener never waits on a slow
//! client's handshake:
//!
//! 1. [`WebSocketTransport::accept`] takes the next TCP stream.
//! 2. [`IncomingConnection::upgrade`] runs the HTTP upgrade (usually on
//!    the connection's own task) and lets the caller route or reject the
//!    request by path before the socket is upgraded.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::{
    CloseReason, Connection, ConnectionId, ConnectionReader, ConnectionWriter,
    TransportError,
};

/// Counter for generating unique connection IDs.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

type WsStream = WebSocketStream<TcpStream>;

/// A TCP listener that hands out not-yet-upgraded connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next TCP connection. Does not perform the upgrade.
    pub async fn accept(&self) -> Result<IncomingConnection, TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::debug!(%peer, "accepted TCP connection");
        Ok(IncomingConnection { stream, peer })
    }
}

/// An HTTP error returned instead of upgrading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    status: u16,
    reason: String,
}

impl Rejection {
    /// Rejects with an arbitrary HTTP status.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
        }
    }

    /// `400 Bad Request`.
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::new(400, reason)
    }

    /// `404 Not Found`.
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::new(404, reason)
    }

    /// Returns the HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    fn to_response(&self) -> ErrorResponse {
        let mut response = ErrorResponse::new(Some(self.reason.clone()));
        *response.status_mut() = StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::BAD_REQUEST);
        response
    }
}

/// A TCP connection waiting for its WebSocket upgrade.
pub struct IncomingConnection {
    stream: TcpStream,
    peer: SocketAddr,
}

impl IncomingConnection {
    /// Returns the remote address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Performs the upgrade handshake.
    ///
    /// `route` sees the request path before the upgrade is accepted. If it
    /// returns `Err`, the client receives that HTTP error and no WebSocket
    /// is created. If it returns `Ok(value)`, the upgraded connection is
    /// returned together with `value`.
    pub async fn upgrade<T, F>(
        self,
        route: F,
    ) -> Result<(WebSocketConnection, T), TransportError>
    where
        F: FnOnce(&str) -> Result<T, Rejection> + Unpin,
    {
        let peer = self.peer;
        let mut routed: Option<T> = None;
        let mut rejected: Option<Rejection> = None;

        let callback = |req: &Request,
                        resp: Response|
         -> Result<Response, ErrorResponse> {
            match route(req.uri().path()) {
                Ok(value) => {
                    routed = Some(value);
                    Ok(resp)
                }
                Err(rejection) => {
                    let response = rejection.to_response();
                    rejected = Some(rejection);
                    Err(response)
                }
            }
        };

        let result =
            tokio_tungstenite::accept_hdr_async(self.stream, callback).await;

        let ws = match result {
            Ok(ws) => ws,
            Err(e) => {
                if let Some(rejection) = rejected {
                    tracing::debug!(
                        %peer,
                        status = rejection.status,
                        reason = %rejection.reason,
                        "upgrade rejected"
                    );
                    return Err(TransportError::Rejected {
                        status: rejection.status,
                        reason: rejection.reason,
                    });
                }
                return Err(TransportError::UpgradeFailed(io::Error::new(
                    io::ErrorKind::InvalidData,
                    e,
                )));
            }
        };

        let value = routed.ok_or_else(|| {
            TransportError::UpgradeFailed(io::Error::other(
                "upgrade completed without consulting the route",
            ))
        })?;

        let id = ConnectionId::new(
            NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
        );
        tracing::debug!(%id, %peer, "upgraded WebSocket connection");

        Ok((WebSocketConnection { id, ws }, value))
    }
}

/// A single upgraded WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    ws: WsStream,
}

impl Connection for WebSocketConnection {
    type Reader = WebSocketReader;
    type Writer = WebSocketWriter;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn split(self) -> (WebSocketReader, WebSocketWriter) {
        let (sink, stream) = self.ws.split();
        (
            WebSocketReader {
                id: self.id,
                stream,
            },
            WebSocketWriter { id: self.id, sink },
        )
    }
}

/// The receiving half of a [`WebSocketConnection`].
pub struct WebSocketReader {
    id: ConnectionId,
    stream: SplitStream<WsStream>,
}

impl ConnectionReader for WebSocketReader {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Binary(data))) => return Ok(Some(data)),
                Some(Ok(Message::Text(_))) => {
                    tracing::debug!(id = %self.id, "ignoring text message");
                    continue;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/raw frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(io::Error::new(
                        io::ErrorKind::ConnectionReset,
                        e,
                    )));
                }
            }
        }
    }
}

/// The sending half of a [`WebSocketConnection`].
pub struct WebSocketWriter {
    id: ConnectionId,
    sink: SplitSink<WsStream, Message>,
}

impl ConnectionWriter for WebSocketWriter {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        self.sink.send(Message::Binary(data)).await.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }

    async fn close(
        &mut self,
        reason: Option<CloseReason>,
    ) -> Result<(), TransportError> {
        tracing::debug!(id = %self.id, ?reason, "closing WebSocket");
        let result = match reason {
            Some(reason) => {
                let frame = CloseFrame {
                    code: CloseCode::from(reason.code),
                    reason: reason.reason.into(),
                };
                self.sink.send(Message::Close(Some(frame))).await
            }
            None => self.sink.close().await,
        };
        result.map_err(|e| {
            TransportError::SendFailed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e,
            ))
        })
    }
}
