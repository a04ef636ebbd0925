use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async_with_config, MaybeTlsStream, WebSocketStream};

use crate::config::{DEFAULT_CONNECT_TIMEOUT, DEFAULT_MAX_MESSAGE_SIZE};
use crate::transport::{Connector, Frame, Transport};

/// WebSocket transport. Ping/pong is answered by tungstenite and never
/// surfaces as a frame.
pub struct WsTransport<S = MaybeTlsStream<TcpStream>> {
    stream: WebSocketStream<S>,
}

impl<S> WsTransport<S> {
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

impl WsTransport {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        Self::connect_with_limit(url, DEFAULT_MAX_MESSAGE_SIZE).await
    }

    /// Connect, refusing inbound messages larger than `max_message_size` bytes.
    pub async fn connect_with_limit(url: &str, max_message_size: usize) -> anyhow::Result<Self> {
        let (stream, _response) =
            connect_async_with_config(url, Some(limits(max_message_size)), false)
                .await
                .map_err(|e| anyhow::anyhow!("WebSocket handshake with {} failed: {}", url, e))?;
        Ok(Self::new(stream))
    }
}

fn limits(max_message_size: usize) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(max_message_size);
    config.max_frame_size = Some(max_message_size);
    config
}

#[async_trait::async_trait]
impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: Frame) -> anyhow::Result<()> {
        let msg = match frame {
            Frame::Text(text) => Message::Text(text),
            Frame::Binary(bytes) => Message::Binary(bytes),
        };
        self.stream.send(msg).await.map_err(|e| match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                anyhow::anyhow!("Connection closed by peer")
            }
            other => anyhow::anyhow!("Write error: {}", other),
        })
    }

    async fn recv(&mut self) -> anyhow::Result<Option<Frame>> {
        loop {
            let msg = match self.stream.next().await {
                None => return Ok(None),
                Some(Err(tungstenite::Error::ConnectionClosed))
                | Some(Err(tungstenite::Error::AlreadyClosed)) => return Ok(None),
                Some(Err(tungstenite::Error::Capacity(e))) => {
                    return Err(anyhow::anyhow!("Message rejected: {}", e))
                }
                Some(Err(e)) => return Err(anyhow::anyhow!("Read error: {}", e)),
                Some(Ok(msg)) => msg,
            };
            match msg {
                Message::Text(text) => return Ok(Some(Frame::Text(text))),
                Message::Binary(bytes) => return Ok(Some(Frame::Binary(bytes))),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(anyhow::anyhow!("Close error: {}", e)),
        }
    }
}

/// Opens [`WsTransport`]s, bounding each handshake by a timeout and every
/// inbound message by a size limit.
#[derive(Debug, Clone)]
pub struct WsConnector {
    connect_timeout: Duration,
    max_message_size: usize,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl WsConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

#[async_trait::async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn Transport>> {
        let handshake = WsTransport::connect_with_limit(url, self.max_message_size);
        let transport = timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| anyhow::anyhow!("Connect timeout after {:?}", self.connect_timeout))??;
        Ok(Box::new(transport))
    }
}
