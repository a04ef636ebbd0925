use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::transport::{Connector, Frame, Transport};

/// One end of an in-process connection. Frames sent on one end arrive on the
/// other in order; closing or dropping an end ends the peer's stream.
pub struct InMemoryTransport {
    outgoing: Option<mpsc::UnboundedSender<Frame>>,
    incoming: mpsc::UnboundedReceiver<Frame>,
}

impl InMemoryTransport {
    pub fn pair() -> (Self, Self) {
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        (
            Self {
                outgoing: Some(tx1),
                incoming: rx2,
            },
            Self {
                outgoing: Some(tx2),
                incoming: rx1,
            },
        )
    }

    /// Convenience for test servers: send a text frame.
    pub async fn send_text(&mut self, text: impl Into<String>) -> anyhow::Result<()> {
        self.send(Frame::Text(text.into())).await
    }

    /// Convenience for test servers: wait for the next text frame.
    pub async fn recv_text(&mut self) -> anyhow::Result<String> {
        match self.recv().await? {
            Some(Frame::Text(text)) => Ok(text),
            Some(Frame::Binary(bytes)) => {
                Err(anyhow::anyhow!("Expected text frame, got {} binary bytes", bytes.len()))
            }
            None => Err(anyhow::anyhow!("Channel closed")),
        }
    }
}

#[async_trait::async_trait]
impl Transport for InMemoryTransport {
    async fn send(&mut self, frame: Frame) -> anyhow::Result<()> {
        let outgoing = self
            .outgoing
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("Transport is shut down"))?;
        outgoing
            .send(frame)
            .map_err(|_| anyhow::anyhow!("Channel closed"))
    }

    async fn recv(&mut self) -> anyhow::Result<Option<Frame>> {
        Ok(self.incoming.recv().await)
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.outgoing = None;
        self.incoming.close();
        Ok(())
    }
}

/// Hands out pre-arranged in-memory connections; refuses when none are queued.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    pending: Arc<Mutex<VecDeque<InMemoryTransport>>>,
    attempts: Arc<AtomicU32>,
}

impl InMemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection for the next successful `connect` and return the
    /// server end of it.
    pub fn accept_next(&self) -> InMemoryTransport {
        let (client, server) = InMemoryTransport::pair();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(client);
        server
    }

    /// Number of `connect` calls so far, successful or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Connector for InMemoryConnector {
    async fn connect(&self, url: &str) -> anyhow::Result<Box<dyn Transport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let next = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match next {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(anyhow::anyhow!("Connection refused: {}", url)),
        }
    }
}
