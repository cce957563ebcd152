use {
    crate::ComError,
    bytes::Bytes,
    futures_util::{SinkExt, StreamExt},
    std::net::SocketAddr,
    tokio_websockets::{ClientBuilder, MaybeTlsStream, WebSocketStream},
};

/// A viewer-side connection to a `WsServer`.
pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsClient {
    /// Connect to a WsServer and return a WsClient.
    pub async fn connect(addr: SocketAddr) -> Result<Self, ComError> {
        let uri = format!("ws://{}", addr);
        let parsed_uri: http::Uri = uri.parse().map_err(|e| {
            ComError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid WebSocket URI: {e}"),
            ))
        })?;
        let (stream, _response) = ClientBuilder::from_uri(parsed_uri).connect().await?;
        Ok(Self { stream })
    }

    /// Receive the next binary message.
    ///
    /// Returns `ComError::ConnectionClosed` when the server closes the connection.
    /// Text and control frames are skipped.
    pub async fn recv(&mut self) -> Result<Bytes, ComError> {
        loop {
            match self.stream.next().await {
                Some(Ok(msg)) => {
                    if msg.is_binary() {
                        return Ok(Bytes::copy_from_slice(&msg.into_payload()));
                    }
                    if msg.is_close() {
                        return Err(ComError::ConnectionClosed);
                    }
                }
                Some(Err(e)) => return Err(ComError::from(e)),
                None => return Err(ComError::ConnectionClosed),
            }
        }
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<(), ComError> {
        self.stream.close().await?;
        Ok(())
    }
}
