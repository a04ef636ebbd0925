mod config;
mod connection;
mod dispatcher;
mod error;
mod form;
mod logging;
pub mod protocol;
mod session;
pub mod transport;
mod ui;

pub use config::*;
pub use connection::{ConnectionManager, ConnectionState};
pub use dispatcher::LobbyDispatcher;
pub use error::{LobbyError, LobbyResult};
pub use form::*;
pub use logging::{init_logging, LogFilter, LOG_ENV_VAR};
pub use protocol::{FormKind, InboundEvent, LobbyEvent, LobbySummary, OutboundRequest};
pub use session::{SessionChange, SessionSnapshot, SessionState, SubscriptionId};
pub use transport::in_memory::{InMemoryConnector, InMemoryTransport};
#[cfg(feature = "ws")]
pub use transport::ws::{WsConnector, WsTransport};
pub use transport::{Connector, Frame, Transport};
pub use ui::*;
