//! Integration tests for the WebSocket transport.
//!
//! These tests spin up a real WebSocket server and client to verify
//! that the routed upgrade, the split halves, and close frames work
//! over an actual socket.

#[cfg(feature = "websocket")]
mod websocket {
    use bytes::Bytes;
    use docsync_transport::{
        CloseReason, Connection, ConnectionReader, ConnectionWriter,
        Rejection, TransportError, WebSocketConnection, WebSocketTransport,
    };
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn bind() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr").to_string();
        (transport, addr)
    }

    async fn connect_client(url: &str) -> ClientWs {
        let (ws, _) = tokio_tungstenite::connect_async(url)
            .await
            .expect("client should connect");
        ws
    }

    /// Accepts one connection and upgrades it, echoing back the path.
    fn accept_one(
        transport: WebSocketTransport,
    ) -> tokio::task::JoinHandle<
        Result<(WebSocketConnection, String), TransportError>,
    > {
        tokio::spawn(async move {
            let incoming = transport.accept().await.expect("should accept");
            incoming
                .upgrade(|path: &str| {
                    if path == "/forbidden" {
                        Err(Rejection::bad_request("no"))
                    } else {
                        Ok(path.to_string())
                    }
                })
                .await
        })
    }

    #[tokio::test]
    async fn test_upgrade_send_and_receive() {
        let (transport, addr) = bind().await;
        let server = accept_one(transport);

        let mut client = connect_client(&format!("ws://{addr}/rooms/a")).await;
        let (conn, path) = server.await.unwrap().expect("upgrade");
        assert_eq!(path, "/rooms/a");
        assert!(conn.id().into_inner() > 0);

        let (mut reader, mut writer) = conn.split();

        // --- Server sends, client receives ---
        writer
            .send(Bytes::from_static(b"hello from server"))
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"hello from server");

        // --- Client sends, server receives ---
        client
            .send(Message::Binary(Bytes::from_static(b"hello from client")))
            .await
            .unwrap();
        let received = reader
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received.as_ref(), b"hello from client");
    }

    #[tokio::test]
    async fn test_text_messages_are_skipped() {
        let (transport, addr) = bind().await;
        let server = accept_one(transport);

        let mut client = connect_client(&format!("ws://{addr}/x")).await;
        let (conn, _) = server.await.unwrap().expect("upgrade");
        let (mut reader, _writer) = conn.split();

        client.send(Message::Text("ignored".into())).await.unwrap();
        client
            .send(Message::Binary(Bytes::from_static(&[1, 2, 3])))
            .await
            .unwrap();

        let received = reader.recv().await.unwrap().unwrap();
        assert_eq!(received.as_ref(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn test_rejected_route_returns_http_error() {
        let (transport, addr) = bind().await;
        let server = accept_one(transport);

        let result =
            tokio_tungstenite::connect_async(format!("ws://{addr}/forbidden"))
                .await;
        match result {
            Err(tokio_tungstenite::tungstenite::Error::Http(resp)) => {
                assert_eq!(resp.status().as_u16(), 400);
            }
            Err(other) => panic!("expected HTTP error, got {other:?}"),
            Ok(_) => panic!("upgrade should have been rejected"),
        }

        match server.await.unwrap() {
            Err(TransportError::Rejected { status, reason }) => {
                assert_eq!(status, 400);
                assert_eq!(reason, "no");
            }
            other => panic!("expected Rejected, got {:?}", other.err()),
        }
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (transport, addr) = bind().await;
        let server = accept_one(transport);

        let mut client = connect_client(&format!("ws://{addr}/x")).await;
        let (conn, _) = server.await.unwrap().expect("upgrade");
        let (mut reader, _writer) = conn.split();

        client.send(Message::Close(None)).await.unwrap();

        let result = reader.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_close_with_reason_reaches_client() {
        let (transport, addr) = bind().await;
        let server = accept_one(transport);

        let mut client = connect_client(&format!("ws://{addr}/x")).await;
        let (conn, _) = server.await.unwrap().expect("upgrade");
        let (_reader, mut writer) = conn.split();

        writer
            .close(Some(CloseReason::new(1008, "document not found")))
            .await
            .expect("close should succeed");

        match client.next().await {
            Some(Ok(Message::Close(Some(frame)))) => {
                assert_eq!(u16::from(frame.code), 1008);
                assert_eq!(frame.reason.as_str(), "document not found");
            }
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}
