use {
    bytes::Bytes,
    com::{Relay, RelayStats, StreamHeader, WsClient, WsServer},
    std::sync::Arc,
    tokio::{
        io::AsyncWriteExt,
        time::{Duration, sleep, timeout},
    },
    video::ChunkReader,
};

async fn server() -> Arc<WsServer> {
    let greeting = Bytes::copy_from_slice(&StreamHeader::new(320, 240).to_bytes());
    Arc::new(
        WsServer::bind("127.0.0.1:0", greeting)
            .await
            .expect("bind failed"),
    )
}

async fn wait_for_viewers(server: &WsServer, count: usize) {
    for _ in 0..100 {
        if server.viewer_count().await == count {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("expected {} viewers", count);
}

#[tokio::test]
async fn test_relay_forwards_chunks_in_order() {
    let server = server().await;
    let mut client = WsClient::connect(server.local_addr()).await.expect("connect failed");
    wait_for_viewers(&server, 1).await;

    let stream: Vec<u8> = (0..1300u32).map(|i| (i % 251) as u8).collect();
    let relay = Relay::new(ChunkReader::new(&stream[..]), Arc::clone(&server));
    let stats = timeout(Duration::from_secs(5), relay.run())
        .await
        .expect("relay timed out");
    assert_eq!(stats, RelayStats { chunks: 3, bytes: 1300 });

    let header = timeout(Duration::from_secs(5), client.recv())
        .await
        .expect("recv timed out")
        .expect("recv failed");
    assert_eq!(&header[..4], b"jsmp");

    let mut received = Vec::new();
    for expected_len in [512, 512, 276] {
        let chunk = timeout(Duration::from_secs(5), client.recv())
            .await
            .expect("recv timed out")
            .expect("recv failed");
        assert_eq!(chunk.len(), expected_len);
        received.extend_from_slice(&chunk);
    }
    assert_eq!(received, stream);
}

#[tokio::test]
async fn test_relay_without_viewers_drains_output() {
    let server = server().await;
    let stream = vec![7u8; 2048];
    let stats = Relay::new(ChunkReader::new(&stream[..]), server).run().await;
    assert_eq!(stats, RelayStats { chunks: 4, bytes: 2048 });
}

#[tokio::test]
async fn test_relay_stops_when_writer_closes() {
    let server = server().await;
    let (mut writer, reader) = tokio::io::duplex(4096);
    let relay = tokio::spawn(Relay::new(ChunkReader::new(reader), Arc::clone(&server)).run());

    writer.write_all(&[1u8; 1024]).await.expect("write failed");
    sleep(Duration::from_millis(50)).await;
    assert!(!relay.is_finished());

    drop(writer);
    let stats = timeout(Duration::from_secs(5), relay)
        .await
        .expect("relay did not stop")
        .expect("relay panicked");
    assert_eq!(stats.bytes, 1024);
}
