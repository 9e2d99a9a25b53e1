//! Integration tests for the WebSocket transport.
//!
//! These spin up a real listener on an OS-assigned port and talk to it
//! with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use mentorbot_transport::{
        FrameReceiver, FrameSender, Transport, WebSocketConnection,
        WebSocketTransport,
    };
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, and returns both ends.
    async fn connected_pair() -> (WebSocketConnection, ClientWs) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        connect_to(transport).await
    }

    async fn connect_to(
        mut transport: WebSocketTransport,
    ) -> (WebSocketConnection, ClientWs) {
        let addr = transport.local_addr().expect("should have addr");

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });

        let (client, _) =
            tokio_tungstenite::connect_async(format!("ws://{addr}"))
                .await
                .expect("client should connect");
        let conn = server.await.expect("task should complete");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_and_receive_text() {
        let (conn, mut client) = connected_pair().await;
        assert!(conn.id().into_inner() > 0);
        let (mut tx, mut rx) = conn.split();

        // --- Server sends, client receives ---
        tx.send_text("hello from server".into())
            .await
            .expect("send should succeed");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "hello from server");

        // --- Client sends, server receives ---
        client
            .send(Message::Text("hello from client".into()))
            .await
            .unwrap();
        let received = rx
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, b"hello from client");

        tx.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_websocket_binary_frames_are_received_as_bytes() {
        let (conn, mut client) = connected_pair().await;
        let (_tx, mut rx) = conn.split();

        client
            .send(Message::Binary(b"{\"raw\":1}".to_vec().into()))
            .await
            .unwrap();

        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received, b"{\"raw\":1}");
    }

    #[tokio::test]
    async fn test_websocket_send_while_receive_pending() {
        // The sender half must not wait on a receive that is parked
        // waiting for the client.
        let (conn, mut client) = connected_pair().await;
        let (mut tx, mut rx) = conn.split();

        let pending_recv = tokio::spawn(async move { rx.recv().await });

        tokio::time::timeout(
            Duration::from_secs(1),
            tx.send_text("pushed".into()),
        )
        .await
        .expect("send should not block on the pending recv")
        .expect("send should succeed");

        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "pushed");

        client.send(Message::Close(None)).await.unwrap();
        let result = pending_recv.await.unwrap().expect("recv ok");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (conn, mut client) = connected_pair().await;
        let (_tx, mut rx) = conn.split();

        client.send(Message::Close(None)).await.unwrap();

        let result = rx.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_message_over_limit_fails_recv() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_max_message_size(16);
        let (conn, mut client) = connect_to(transport).await;
        let (_tx, mut rx) = conn.split();

        client.send(Message::Text("x".repeat(64).into())).await.unwrap();

        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_websocket_message_at_limit_is_received() {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_max_message_size(16);
        let (conn, mut client) = connect_to(transport).await;
        let (_tx, mut rx) = conn.split();

        client.send(Message::Text("y".repeat(16).into())).await.unwrap();

        let received = rx.recv().await.unwrap().unwrap();
        assert_eq!(received.len(), 16);
    }
}
