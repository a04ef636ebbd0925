/// One discrete message on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

impl From<String> for Frame {
    fn from(text: String) -> Self {
        Frame::Text(text)
    }
}

/// An established, ordered, reliable duplex connection.
///
/// `recv` must be cancel-safe: the connection manager polls it inside
/// `tokio::select!` next to its outbound queue.
#[async_trait::async_trait]
pub trait Transport: Send {
    async fn send(&mut self, frame: Frame) -> anyhow::Result<()>;
    /// `Ok(None)` once the peer has closed the connection.
    async fn recv(&mut self) -> anyhow::Result<Option<Frame>>;
    async fn close(&mut self) -> anyhow::Result<()>;
}

/// Opens transports to a server address; used again for every reconnect.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn Transport>>;
}

pub mod in_memory;
#[cfg(feature = "ws")]
pub mod ws;
