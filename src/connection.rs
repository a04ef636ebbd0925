use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout, Instant};

use crate::config::{ClientConfig, ReconnectPolicy};
use crate::error::{LobbyError, LobbyResult};
use crate::protocol::{InboundEvent, OutboundRequest};
use crate::transport::{Connector, Frame, Transport};

/// Lifecycle of the connection to the game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
    Reconnecting,
}

type MessageHandler = Box<dyn FnMut(&InboundEvent) + Send>;
type ErrorHandler = Box<dyn FnMut(&LobbyError) + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    message_handlers: Mutex<Vec<MessageHandler>>,
    error_handlers: Mutex<Vec<ErrorHandler>>,
}

impl Shared {
    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!("Connection state {:?} -> {:?}", prev, next);
        }
    }

    fn dispatch_message(&self, event: &InboundEvent) {
        for (index, handler) in lock(&self.message_handlers).iter_mut().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                error!(
                    "Message handler #{} panicked on `{}` event: {}",
                    index,
                    event.event_type,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    fn dispatch_error(&self, err: &LobbyError) {
        for (index, handler) in lock(&self.error_handlers).iter_mut().enumerate() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| handler(err))) {
                error!(
                    "Error handler #{} panicked on `{}`: {}",
                    index,
                    err,
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Leaves the manager `Closed` however the connection task ends.
struct ClosedOnExit(Arc<Shared>);

impl Drop for ClosedOnExit {
    fn drop(&mut self) {
        self.0.set_state(ConnectionState::Closed);
    }
}

struct ActiveConnection {
    outbound: mpsc::UnboundedSender<String>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owns the single connection to the game server.
///
/// `connect` spawns a background task on the current tokio runtime that
/// establishes the transport (with bounded exponential backoff), writes
/// queued requests in call order and decodes inbound frames in arrival
/// order, invoking the registered handlers on that task. A panicking
/// handler is logged and skipped for that event. A dropped
/// transport is re-established with the same policy; if that fails the
/// manager ends up `Closed` and reports `ConnectionUnavailable`.
pub struct ConnectionManager {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    config: ClientConfig,
    active: Mutex<Option<ActiveConnection>>,
}

impl ConnectionManager {
    pub fn new(connector: impl Connector + 'static, config: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Closed);
        Self {
            shared: Arc::new(Shared {
                state,
                message_handlers: Mutex::new(Vec::new()),
                error_handlers: Mutex::new(Vec::new()),
            }),
            connector: Arc::new(connector),
            config,
            active: Mutex::new(None),
        }
    }

    /// Manager speaking WebSocket, with the handshake timeout and message size
    /// limit taken from `config`.
    #[cfg(feature = "ws")]
    pub fn websocket(config: ClientConfig) -> Self {
        let connector = crate::transport::ws::WsConnector::new(config.connect_timeout)
            .with_max_message_size(config.max_message_size);
        Self::new(connector, config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Wait until the manager reaches `state`. Returns false on timeout.
    pub async fn wait_for(&self, state: ConnectionState, within: Duration) -> bool {
        let mut rx = self.subscribe_state();
        let reached = matches!(timeout(within, rx.wait_for(|s| *s == state)).await, Ok(Ok(_)));
        reached
    }

    /// Register a callback for every decoded inbound event, called in arrival order.
    pub fn on_message<F>(&self, handler: F)
    where
        F: FnMut(&InboundEvent) + Send + 'static,
    {
        lock(&self.shared.message_handlers).push(Box::new(handler));
    }

    /// Register a callback for non-fatal errors: malformed frames and
    /// connection attempts that gave up.
    pub fn on_error<F>(&self, handler: F)
    where
        F: FnMut(&LobbyError) + Send + 'static,
    {
        lock(&self.shared.error_handlers).push(Box::new(handler));
    }

    /// Connect to the server address from the configuration.
    pub fn connect_default(&self) {
        let url = self.config.server_url.clone();
        self.connect(&url);
    }

    /// Start connecting to `url` in the background. Must be called from
    /// within a tokio runtime. Ignored while a connection is already active.
    pub fn connect(&self, url: &str) {
        let mut active = lock(&self.active);
        if let Some(current) = active.as_ref() {
            if !current.task.is_finished() {
                warn!("connect({}) ignored: connection already {:?}", url, self.state());
                return;
            }
        }

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        self.shared.set_state(ConnectionState::Connecting);
        info!("Connecting to {}", url);

        let task = ConnectionTask {
            shared: Arc::clone(&self.shared),
            connector: Arc::clone(&self.connector),
            url: url.to_string(),
            policy: self.config.reconnect.clone(),
            idle_timeout: self.config.idle_timeout,
            outbound: outbound_rx,
            shutdown: shutdown_rx,
            rng: SmallRng::from_rng(&mut rand::rng()),
        };
        *active = Some(ActiveConnection {
            outbound: outbound_tx,
            shutdown: shutdown_tx,
            task: tokio::spawn(task.run()),
        });
    }

    /// Queue a request for the server. Fails with `NotConnected` unless the
    /// connection is `Open`; requests are written in call order.
    pub fn send(&self, request: &OutboundRequest) -> LobbyResult<()> {
        if self.state() != ConnectionState::Open {
            return Err(LobbyError::NotConnected);
        }
        let text = request.encode()?;
        let active = lock(&self.active);
        let connection = active.as_ref().ok_or(LobbyError::NotConnected)?;
        connection
            .outbound
            .send(text)
            .map_err(|_| LobbyError::NotConnected)?;
        debug!("Queued {} request with {} field(s)", request.kind, request.fields.len());
        Ok(())
    }

    /// Close the connection, cancelling any pending reconnect attempts, and
    /// wait for the background task to finish. Requests already accepted by
    /// `send` are written before the transport is closed.
    pub async fn close(&self) {
        let active = lock(&self.active).take();
        if let Some(connection) = active {
            connection.shutdown.send_replace(true);
            if let Err(e) = connection.task.await {
                error!("Connection task ended abnormally: {}", e);
            }
        }
        self.shared.set_state(ConnectionState::Closed);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(connection) = lock(&self.active).take() {
            connection.shutdown.send_replace(true);
        }
    }
}

enum PumpExit {
    Shutdown,
    Dropped(anyhow::Error),
}

struct ConnectionTask {
    shared: Arc<Shared>,
    connector: Arc<dyn Connector>,
    url: String,
    policy: ReconnectPolicy,
    idle_timeout: Option<Duration>,
    outbound: mpsc::UnboundedReceiver<String>,
    shutdown: watch::Receiver<bool>,
    rng: SmallRng,
}

/// Resolves once shutdown was requested or the manager went away.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}

/// Resolves once nothing has arrived for `idle_timeout` since `last_inbound`.
async fn idle_expired(last_inbound: Instant, idle_timeout: Option<Duration>) {
    match idle_timeout {
        Some(limit) => sleep_until(last_inbound + limit).await,
        None => std::future::pending().await,
    }
}

impl ConnectionTask {
    async fn run(mut self) {
        let _closed = ClosedOnExit(Arc::clone(&self.shared));
        let mut transport = match self.establish().await {
            Some(transport) => transport,
            None => return,
        };

        loop {
            self.shared.set_state(ConnectionState::Open);
            match self.pump(transport.as_mut()).await {
                PumpExit::Shutdown => {
                    self.flush_outbound(transport.as_mut()).await;
                    if let Err(e) = transport.close().await {
                        debug!("Error while closing transport: {}", e);
                    }
                    info!("Connection to {} closed", self.url);
                    break;
                }
                PumpExit::Dropped(reason) => {
                    warn!("Connection to {} dropped: {}", self.url, reason);
                    self.shared.set_state(ConnectionState::Reconnecting);
                    match self.establish().await {
                        Some(next) => transport = next,
                        None => {
                            let discarded =
                                std::iter::from_fn(|| self.outbound.try_recv().ok()).count();
                            if discarded > 0 {
                                warn!(
                                    "Discarding {} request(s) queued for {}",
                                    discarded, self.url
                                );
                            }
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Write the requests accepted before shutdown was requested, in order.
    async fn flush_outbound(&mut self, transport: &mut dyn Transport) {
        let mut written = 0usize;
        while let Ok(text) = self.outbound.try_recv() {
            if let Err(e) = transport.send(Frame::Text(text)).await {
                warn!("Could not flush queued request to {}: {}", self.url, e);
                return;
            }
            written += 1;
        }
        if written > 0 {
            debug!("Flushed {} queued request(s) before closing", written);
        }
    }

    /// Try to open a transport within the policy's attempt budget. `None`
    /// means shutdown was requested or every attempt failed; only the latter
    /// is reported as `ConnectionUnavailable`.
    async fn establish(&mut self) -> Option<Box<dyn Transport>> {
        let attempts = self.policy.attempts();
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            let result = tokio::select! {
                _ = cancelled(&mut self.shutdown) => return None,
                result = self.connector.connect(&self.url) => result,
            };
            match result {
                Ok(transport) => {
                    info!("Connected to {} (attempt {}/{})", self.url, attempt, attempts);
                    return Some(transport);
                }
                Err(e) => {
                    warn!("Connect attempt {}/{} to {} failed: {}", attempt, attempts, self.url, e);
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                let delay = self.policy.delay_for(attempt - 1, &mut self.rng);
                debug!("Retrying in {:?}", delay);
                tokio::select! {
                    _ = cancelled(&mut self.shutdown) => return None,
                    _ = sleep(delay) => {}
                }
            }
        }

        error!("Giving up on {} after {} attempt(s)", self.url, attempts);
        self.shared.dispatch_error(&LobbyError::ConnectionUnavailable {
            url: self.url.clone(),
            attempts,
            reason: last_error,
        });
        None
    }

    async fn pump(&mut self, transport: &mut dyn Transport) -> PumpExit {
        let mut last_inbound = Instant::now();
        loop {
            tokio::select! {
                biased;
                _ = cancelled(&mut self.shutdown) => return PumpExit::Shutdown,
                outgoing = self.outbound.recv() => match outgoing {
                    Some(text) => {
                        if let Err(e) = transport.send(Frame::Text(text)).await {
                            return PumpExit::Dropped(e);
                        }
                    }
                    None => return PumpExit::Shutdown,
                },
                incoming = transport.recv() => match incoming {
                    Ok(Some(frame)) => {
                        last_inbound = Instant::now();
                        self.route(frame);
                    }
                    Ok(None) => {
                        return PumpExit::Dropped(anyhow::anyhow!("Connection closed by peer"));
                    }
                    Err(e) => return PumpExit::Dropped(e),
                },
                _ = idle_expired(last_inbound, self.idle_timeout) => {
                    return PumpExit::Dropped(anyhow::anyhow!(
                        "Nothing received for {:?}",
                        self.idle_timeout.unwrap_or_default()
                    ));
                }
            }
        }
    }

    fn route(&self, frame: Frame) {
        let decoded = match frame {
            Frame::Text(text) => InboundEvent::decode(&text),
            Frame::Binary(bytes) => Err(LobbyError::Decode(format!(
                "unexpected binary frame ({} bytes)",
                bytes.len()
            ))),
        };
        match decoded {
            Ok(event) => {
                debug!("Received `{}` event", event.event_type);
                self.shared.dispatch_message(&event);
            }
            Err(err) => {
                warn!("Dropping inbound frame: {}", err);
                self.shared.dispatch_error(&err);
            }
        }
    }
}
