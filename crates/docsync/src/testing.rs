//! In-memory connection for driving clients without a socket.

use bytes::Bytes;
use docsync_transport::{
    CloseReason, Connection, ConnectionId, ConnectionReader, ConnectionWriter,
    TransportError,
};
use tokio::sync::mpsc;

/// What the server side wrote to a [`MockConnection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outgoing {
    Frame(Bytes),
    Closed(Option<CloseReason>),
}

pub(crate) struct MockConnection {
    id: ConnectionId,
    inbound: mpsc::UnboundedReceiver<Bytes>,
    outgoing: mpsc::UnboundedSender<Outgoing>,
    stalled: bool,
}

/// The remote end of a [`MockConnection`].
///
/// Dropping `inbound` is a clean close from the peer.
pub(crate) struct MockPeer {
    pub inbound: mpsc::UnboundedSender<Bytes>,
    pub outgoing: mpsc::UnboundedReceiver<Outgoing>,
}

impl MockPeer {
    pub fn send(&self, frame: impl Into<Bytes>) {
        self.inbound.send(frame.into()).expect("connection dropped");
    }

    pub async fn next(&mut self) -> Outgoing {
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            self.outgoing.recv(),
        )
        .await
        .expect("timed out waiting for output")
        .expect("connection dropped")
    }

    pub async fn next_frame(&mut self) -> Bytes {
        match self.next().await {
            Outgoing::Frame(frame) => frame,
            other => panic!("expected a frame, got {other:?}"),
        }
    }
}

pub(crate) fn pair(id: u64) -> (MockConnection, MockPeer) {
    connection(id, false)
}

/// Like [`pair`], but every write blocks forever, as with a peer that
/// stopped reading.
pub(crate) fn stalled_pair(id: u64) -> (MockConnection, MockPeer) {
    connection(id, true)
}

fn connection(id: u64, stalled: bool) -> (MockConnection, MockPeer) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    (
        MockConnection {
            id: ConnectionId::new(id),
            inbound: in_rx,
            outgoing: out_tx,
            stalled,
        },
        MockPeer {
            inbound: in_tx,
            outgoing: out_rx,
        },
    )
}

pub(crate) struct MockReader(mpsc::UnboundedReceiver<Bytes>);

pub(crate) struct MockWriter {
    outgoing: mpsc::UnboundedSender<Outgoing>,
    stalled: bool,
}

impl Connection for MockConnection {
    type Reader = MockReader;
    type Writer = MockWriter;

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn split(self) -> (MockReader, MockWriter) {
        (
            MockReader(self.inbound),
            MockWriter {
                outgoing: self.outgoing,
                stalled: self.stalled,
            },
        )
    }
}

impl ConnectionReader for MockReader {
    async fn recv(&mut self) -> Result<Option<Bytes>, TransportError> {
        Ok(self.0.recv().await)
    }
}

impl ConnectionWriter for MockWriter {
    async fn send(&mut self, data: Bytes) -> Result<(), TransportError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        self.outgoing
            .send(Outgoing::Frame(data))
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }

    async fn close(
        &mut self,
        reason: Option<CloseReason>,
    ) -> Result<(), TransportError> {
        self.outgoing
            .send(Outgoing::Closed(reason))
            .map_err(|_| TransportError::ConnectionClosed("peer gone".into()))
    }
}
