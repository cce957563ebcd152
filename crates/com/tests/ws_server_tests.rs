use {
    bytes::Bytes,
    com::{ComError, StreamHeader, WsClient, WsServer},
    std::net::SocketAddr,
    tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        time::{Duration, sleep, timeout},
    },
};

// large enough that a few unread ones fill the socket buffers
const BIG: usize = 256 * 1024;

fn greeting() -> Bytes {
    Bytes::copy_from_slice(&StreamHeader::new(640, 480).to_bytes())
}

async fn wait_for_viewers(server: &WsServer, count: usize) {
    for _ in 0..100 {
        if server.viewer_count().await == count {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} viewers, have {}", count, server.viewer_count().await);
}

async fn recv(client: &mut WsClient) -> Bytes {
    timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("recv timed out")
        .expect("recv failed")
}

#[tokio::test]
async fn test_bind_starts_with_no_viewers() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    assert_eq!(server.viewer_count().await, 0);
    assert_ne!(server.local_addr().port(), 0);
}

#[tokio::test]
async fn test_viewer_receives_header_first() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let mut client = WsClient::connect(server.local_addr())
        .await
        .expect("connect failed");

    let header = recv(&mut client).await;
    assert_eq!(&header[..], b"jsmp\x02\x80\x01\xe0");
    assert_eq!(StreamHeader::from_bytes(&header), Some(StreamHeader::new(640, 480)));
}

#[tokio::test]
async fn test_broadcast_reaches_all_viewers_in_order() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let mut a = WsClient::connect(server.local_addr()).await.expect("connect failed");
    let mut b = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 2).await;

    for i in 0..5u8 {
        assert_eq!(server.broadcast(Bytes::from(vec![i; 512])).await, 2);
    }

    for client in [&mut a, &mut b] {
        assert_eq!(recv(client).await, greeting());
        for i in 0..5u8 {
            assert_eq!(recv(client).await, Bytes::from(vec![i; 512]));
        }
    }
}

#[tokio::test]
async fn test_late_viewer_gets_header_then_only_new_chunks() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let mut early = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 1).await;
    server.broadcast(Bytes::from_static(b"old")).await;

    let mut late = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 2).await;
    server.broadcast(Bytes::from_static(b"new")).await;

    assert_eq!(recv(&mut early).await, greeting());
    assert_eq!(&recv(&mut early).await[..], b"old");
    assert_eq!(&recv(&mut early).await[..], b"new");

    assert_eq!(recv(&mut late).await, greeting());
    assert_eq!(&recv(&mut late).await[..], b"new");
}

#[tokio::test]
async fn test_disconnected_viewer_does_not_affect_others() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let mut stays = WsClient::connect(server.local_addr()).await.expect("connect failed");
    let leaves = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 2).await;

    leaves.close().await.expect("close failed");
    wait_for_viewers(&server, 1).await;

    assert_eq!(server.broadcast(Bytes::from_static(b"chunk")).await, 1);
    assert_eq!(recv(&mut stays).await, greeting());
    assert_eq!(&recv(&mut stays).await[..], b"chunk");
}

// WebSocket handshake by hand, so the test controls how the socket dies
async fn raw_viewer(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.expect("connect failed");
    let request = format!(
        "GET / HTTP/1.1\r\nHost: {}\r\nUpgrade: websocket\r\nConnection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
        addr
    );
    stream.write_all(request.as_bytes()).await.expect("write failed");

    let mut response = Vec::new();
    let mut byte = [0u8; 1];
    while !response.ends_with(b"\r\n\r\n") {
        timeout(Duration::from_secs(5), stream.read_exact(&mut byte))
            .await
            .expect("handshake timed out")
            .expect("handshake failed");
        response.push(byte[0]);
    }
    assert!(response.starts_with(b"HTTP/1.1 101"));
    stream
}

#[tokio::test]
async fn test_reset_viewer_is_dropped_on_broadcast() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let mut stays = WsClient::connect(server.local_addr()).await.expect("connect failed");
    let reset = raw_viewer(server.local_addr()).await;
    wait_for_viewers(&server, 2).await;

    // linger 0 makes the drop send RST instead of a close frame
    #[allow(deprecated)]
    reset.set_linger(Some(Duration::ZERO)).expect("set_linger failed");
    drop(reset);

    // broadcast before the viewer's reader task can notice the reset
    assert_eq!(server.broadcast(Bytes::from_static(b"first")).await, 1);
    assert_eq!(server.viewer_count().await, 1);
    assert_eq!(server.broadcast(Bytes::from_static(b"second")).await, 1);

    assert_eq!(recv(&mut stays).await, greeting());
    assert_eq!(&recv(&mut stays).await[..], b"first");
    assert_eq!(&recv(&mut stays).await[..], b"second");
}

#[tokio::test]
async fn test_stalled_viewer_is_dropped_and_others_keep_receiving() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let _stalled = WsClient::connect(server.local_addr()).await.expect("connect failed");
    let mut reader = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 2).await;

    let reading = tokio::spawn(async move {
        assert_eq!(recv(&mut reader).await, greeting());
        let mut count = 0;
        loop {
            let msg = recv(&mut reader).await;
            if &msg[..] == b"end" {
                return count;
            }
            assert_eq!(msg.len(), BIG);
            count += 1;
        }
    });

    let payload = Bytes::from(vec![0x55u8; BIG]);
    let mut sent = 0;
    let mut reached = 2;
    while reached == 2 && sent < 256 {
        reached = server.broadcast(payload.clone()).await;
        sent += 1;
    }
    assert_eq!(reached, 1, "stalled viewer was never dropped");
    assert_eq!(server.broadcast(Bytes::from_static(b"end")).await, 1);

    let received = timeout(Duration::from_secs(10), reading)
        .await
        .expect("reader timed out")
        .expect("reader panicked");
    assert_eq!(received, sent);
}

#[tokio::test]
async fn test_shutdown_finishes_with_stalled_viewer() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let _stalled = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 1).await;

    // stop each broadcast well before the viewer would be dropped for it
    let payload = Bytes::from(vec![0u8; BIG]);
    let mut blocked = false;
    for _ in 0..256 {
        if timeout(Duration::from_millis(200), server.broadcast(payload.clone()))
            .await
            .is_err()
        {
            blocked = true;
            break;
        }
    }
    assert!(blocked, "viewer socket never filled up");
    assert_eq!(server.viewer_count().await, 1);

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown hung on a stalled viewer");
    assert_eq!(server.viewer_count().await, 0);
}

#[tokio::test]
async fn test_shutdown_closes_viewers() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let mut client = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 1).await;
    assert_eq!(recv(&mut client).await, greeting());

    timeout(Duration::from_secs(5), server.shutdown())
        .await
        .expect("shutdown timed out");
    assert_eq!(server.viewer_count().await, 0);

    let result = timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("recv timed out");
    assert!(result.is_err());
}

#[tokio::test]
async fn test_connect_after_shutdown_fails() {
    let server = WsServer::bind("127.0.0.1:0", greeting())
        .await
        .expect("bind failed");
    let addr = server.local_addr();
    server.shutdown().await;
    drop(server);
    sleep(Duration::from_millis(50)).await;

    match WsClient::connect(addr).await {
        Err(ComError::Io(_)) | Err(ComError::WebSocket(_)) => {}
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("connected to a stopped server"),
    }
}
