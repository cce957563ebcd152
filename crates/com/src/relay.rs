use {
    crate::WsServer,
    base::log,
    std::sync::Arc,
    tokio::{io::AsyncRead, process::ChildStdout},
    video::ChunkReader,
};

/// Totals for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub chunks: u64,
    pub bytes: u64,
}

/// Pumps transcoder output to every connected viewer.
///
/// A single reader broadcasts chunks in the order they were read. The relay
/// stops when the output ends (the encoder closed it or exited) or a read
/// fails; the output is closed when `run` returns.
pub struct Relay<R = ChildStdout> {
    reader: ChunkReader<R>,
    server: Arc<WsServer>,
}

impl<R: AsyncRead + Unpin> Relay<R> {
    pub fn new(reader: ChunkReader<R>, server: Arc<WsServer>) -> Self {
        Self { reader, server }
    }

    pub async fn run(mut self) -> RelayStats {
        let mut stats = RelayStats::default();
        loop {
            match self.reader.read_chunk().await {
                Ok(Some(chunk)) => {
                    stats.chunks += 1;
                    stats.bytes += chunk.len() as u64;
                    self.server.broadcast(chunk).await;
                }
                Ok(None) => {
                    log::info!("relay: transcoder output ended");
                    break;
                }
                Err(error) => {
                    log::error!("relay: read failed: {}", error);
                    break;
                }
            }
        }
        log::info!("relay: {} chunks ({} bytes) relayed", stats.chunks, stats.bytes);
        stats
    }
}
