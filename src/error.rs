/// Errors surfaced by the lobby client core.
///
/// `ConnectionUnavailable` and `NotConnected` are meant for the user (the
/// dispatcher turns them into notices). `Decode` and `UnknownEventType` are
/// logged and swallowed; none of them tears down the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("game server unavailable at {url} after {attempts} attempt(s): {reason}")]
    ConnectionUnavailable {
        url: String,
        attempts: u32,
        reason: String,
    },
    #[error("not connected to the game server")]
    NotConnected,
    #[error("malformed server message: {0}")]
    Decode(String),
    #[error("unknown event type `{0}`")]
    UnknownEventType(String),
    #[error("player name must not be empty")]
    InvalidPlayerName,
    #[error("could not encode request: {0}")]
    Encode(String),
}

pub type LobbyResult<T> = Result<T, LobbyError>;
