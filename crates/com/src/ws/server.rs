use {
    crate::ComError,
    base::log,
    bytes::Bytes,
    futures_util::{SinkExt, StreamExt, future::join_all},
    std::{
        collections::HashMap,
        net::SocketAddr,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::{
        net::{TcpListener, TcpStream, ToSocketAddrs},
        sync::{RwLock, watch},
        task::JoinHandle,
        time::timeout,
    },
    tokio_websockets::{Message, ServerBuilder, WebSocketStream},
};

/// Time a viewer gets to take one broadcast before it is dropped.
pub const VIEWER_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Time a viewer gets to take its close frame on shutdown.
pub const VIEWER_CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;
type Viewers = Arc<RwLock<HashMap<SocketAddr, WsSink>>>;

/// WebSocket server that fans binary messages out to every connected viewer.
///
/// Each viewer is sent `greeting` first and is only then added to the
/// broadcast set, so it never sees a broadcast before its greeting and never
/// sees broadcasts from before it joined.
pub struct WsServer {
    viewers: Viewers,
    shutdown: watch::Sender<bool>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    local_addr: SocketAddr,
}

impl WsServer {
    /// Bind a TCP listener and start accepting WebSocket viewers.
    pub async fn bind(addr: impl ToSocketAddrs, greeting: Bytes) -> Result<Self, ComError> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;

        let viewers: Viewers = Arc::new(RwLock::new(HashMap::new()));
        let (shutdown, shutdown_rx) = watch::channel(false);

        let accept_task = tokio::spawn(accept_loop(
            listener,
            Arc::clone(&viewers),
            greeting,
            shutdown_rx,
        ));

        Ok(Self {
            viewers,
            shutdown,
            accept_task: Mutex::new(Some(accept_task)),
            local_addr,
        })
    }

    /// Send `payload` as one binary message to every viewer.
    ///
    /// Viewers that fail to receive, or take longer than
    /// `VIEWER_SEND_TIMEOUT`, are dropped from the set and logged; the others
    /// are unaffected. Returns the number of viewers reached.
    pub async fn broadcast(&self, payload: Bytes) -> usize {
        let msg = Message::binary(payload);

        let mut lock = self.viewers.write().await;

        let mut failed_addrs = Vec::new();
        for (addr, writer) in lock.iter_mut() {
            match timeout(VIEWER_SEND_TIMEOUT, writer.send(msg.clone())).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    log::warn!("Failed to send to viewer {}: {}", addr, e);
                    failed_addrs.push(*addr);
                }
                Err(_) => {
                    log::warn!(
                        "viewer {} stalled for {:?}, dropping it",
                        addr,
                        VIEWER_SEND_TIMEOUT
                    );
                    failed_addrs.push(*addr);
                }
            }
        }

        for addr in &failed_addrs {
            lock.remove(addr);
        }

        lock.len()
    }

    /// Return the number of currently connected viewers.
    pub async fn viewer_count(&self) -> usize {
        self.viewers.read().await.len()
    }

    /// Return the local address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, close every viewer and wait for the accept loop to end.
    ///
    /// Each viewer gets `VIEWER_CLOSE_TIMEOUT` to take its close frame.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);

        let writers: Vec<(SocketAddr, WsSink)> = self.viewers.write().await.drain().collect();
        // a viewer that stopped reading never lets the close frame flush
        join_all(writers.into_iter().map(|(addr, mut writer)| async move {
            match timeout(VIEWER_CLOSE_TIMEOUT, writer.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::debug!("closing viewer {}: {}", addr, e),
                Err(_) => log::warn!("viewer {} did not take the close frame, dropping it", addr),
            }
        }))
        .await;

        let accept_task = self.accept_task.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(accept_task) = accept_task {
            let _ = accept_task.await;
        }
        log::info!("viewer server on {} stopped", self.local_addr);
    }
}

impl Drop for WsServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
        if let Some(accept_task) = self.accept_task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            accept_task.abort();
        }
    }
}

async fn accept_loop(
    listener: TcpListener,
    viewers: Viewers,
    greeting: Bytes,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.changed() => break,
        };
        match accepted {
            Ok((tcp_stream, addr)) => {
                tokio::spawn(serve_viewer(
                    tcp_stream,
                    addr,
                    Arc::clone(&viewers),
                    greeting.clone(),
                    shutdown.clone(),
                ));
            }
            Err(e) => {
                log::warn!("Accept error: {}", e);
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

async fn serve_viewer(
    tcp_stream: TcpStream,
    addr: SocketAddr,
    viewers: Viewers,
    greeting: Bytes,
    mut shutdown: watch::Receiver<bool>,
) {
    let ws_stream = match ServerBuilder::new().accept(tcp_stream).await {
        Ok((_request, ws_stream)) => ws_stream,
        Err(e) => {
            log::warn!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut write_half, mut read_half) = ws_stream.split();
    if let Err(e) = write_half.send(Message::binary(greeting)).await {
        log::warn!("Failed to greet viewer {}: {}", addr, e);
        return;
    }
    if *shutdown.borrow() {
        return;
    }
    viewers.write().await.insert(addr, write_half);
    log::info!("viewer {} connected", addr);

    // viewers only listen; reading detects the disconnect
    loop {
        let next = tokio::select! {
            next = read_half.next() => next,
            _ = shutdown.changed() => break,
        };
        match next {
            Some(Ok(_msg)) => {}
            Some(Err(e)) => {
                log::warn!("viewer {} error: {}", addr, e);
                break;
            }
            None => {
                log::info!("viewer {} disconnected", addr);
                break;
            }
        }
    }
    viewers.write().await.remove(&addr);
}
