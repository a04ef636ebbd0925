use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LobbyError, LobbyResult};

/// Event type sent by the server once a new game has been created.
pub const EVENT_NEW_GAME: &str = "new_game";
/// Event type confirming that the player joined an existing game.
pub const EVENT_JOINED_GAME: &str = "joined_game";
/// Event type carrying a server-side rejection.
pub const EVENT_ERROR: &str = "error";
/// Event type listing the games still waiting for players.
pub const EVENT_LOBBIES: &str = "lobbies";

/// Which lobby form produced a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    CreateGame,
    JoinGame,
}

impl std::fmt::Display for FormKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FormKind::CreateGame => f.write_str("create_game"),
            FormKind::JoinGame => f.write_str("join_game"),
        }
    }
}

/// A single form submission on its way to the server.
///
/// On the wire only the fields are sent, as an ordered JSON array of
/// `[id, value]` pairs; the server tells the forms apart by their field ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub kind: FormKind,
    pub fields: Vec<(String, String)>,
}

impl OutboundRequest {
    pub fn new<I, K, V>(kind: FormKind, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            kind,
            fields: fields
                .into_iter()
                .map(|(id, value)| (id.into(), value.into()))
                .collect(),
        }
    }

    /// Value of the first field with the given id.
    pub fn field(&self, id: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field_id, _)| field_id == id)
            .map(|(_, value)| value.as_str())
    }

    /// The submitted player name, if the form carries a player-name field.
    pub fn player_name(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|(id, _)| is_player_name_field(id))
            .map(|(_, value)| value.as_str())
    }

    /// Serialize to the text frame sent to the server.
    pub fn encode(&self) -> LobbyResult<String> {
        serde_json::to_string(&self.fields).map_err(|e| LobbyError::Encode(e.to_string()))
    }
}

/// Field ids `playername` and `playername_*` hold the player's name.
pub fn is_player_name_field(id: &str) -> bool {
    id == "playername" || id.starts_with("playername_")
}

/// Parse an outbound frame back into its `[id, value]` pairs.
pub fn decode_fields(text: &str) -> LobbyResult<Vec<(String, String)>> {
    serde_json::from_str(text).map_err(|e| LobbyError::Decode(e.to_string()))
}

/// A decoded server frame: the `type` tag plus every other top-level field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl InboundEvent {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            payload: Map::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn new_game(game_id: impl Into<String>) -> Self {
        Self::new(EVENT_NEW_GAME).with("game_id", game_id.into())
    }

    pub fn joined_game(game_id: impl Into<String>) -> Self {
        Self::new(EVENT_JOINED_GAME).with("game_id", game_id.into())
    }

    pub fn lobbies(lobbies: &[LobbySummary]) -> LobbyResult<Self> {
        let list = serde_json::to_value(lobbies).map_err(|e| LobbyError::Encode(e.to_string()))?;
        Ok(Self::new(EVENT_LOBBIES).with("lobbies", list))
    }

    pub fn decode(text: &str) -> LobbyResult<Self> {
        serde_json::from_str(text).map_err(|e| LobbyError::Decode(e.to_string()))
    }

    pub fn encode(&self) -> LobbyResult<String> {
        serde_json::to_string(self).map_err(|e| LobbyError::Encode(e.to_string()))
    }

    /// String-valued payload field, `None` if missing or not a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

/// One game that has not started yet, as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbySummary {
    pub game_id: String,
    pub num_players_required: u8,
    pub current_player_count: u8,
    #[serde(default)]
    pub players: Vec<String>,
}

impl LobbySummary {
    pub fn open_seats(&self) -> u8 {
        self.num_players_required
            .saturating_sub(self.current_player_count)
    }

    /// Every seat is taken; the game can be started.
    pub fn is_full(&self) -> bool {
        self.open_seats() == 0
    }
}

/// Server events the lobby understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyEvent {
    NewGame {
        game_id: String,
        player_name: Option<String>,
    },
    JoinedGame {
        game_id: String,
        player_name: Option<String>,
    },
    ServerError {
        message: String,
    },
    Lobbies(Vec<LobbySummary>),
}

impl LobbyEvent {
    /// Game id confirmed by this event, if it is a confirmation.
    pub fn confirmed_game(&self) -> Option<&str> {
        match self {
            LobbyEvent::NewGame { game_id, .. } | LobbyEvent::JoinedGame { game_id, .. } => {
                Some(game_id.as_str())
            }
            LobbyEvent::ServerError { .. } | LobbyEvent::Lobbies(_) => None,
        }
    }
}

impl TryFrom<&InboundEvent> for LobbyEvent {
    type Error = LobbyError;

    fn try_from(event: &InboundEvent) -> Result<Self, Self::Error> {
        let game_id = || {
            event
                .str_field("game_id")
                .map(str::to_owned)
                .ok_or_else(|| {
                    LobbyError::Decode(format!(
                        "`{}` event without a string `game_id`",
                        event.event_type
                    ))
                })
        };
        let player_name = event.str_field("player_name").map(str::to_owned);

        match event.event_type.as_str() {
            EVENT_NEW_GAME => Ok(LobbyEvent::NewGame {
                game_id: game_id()?,
                player_name,
            }),
            EVENT_JOINED_GAME => Ok(LobbyEvent::JoinedGame {
                game_id: game_id()?,
                player_name,
            }),
            EVENT_ERROR => Ok(LobbyEvent::ServerError {
                message: event
                    .str_field("message")
                    .unwrap_or("unspecified server error")
                    .to_owned(),
            }),
            EVENT_LOBBIES => {
                let list = event.payload.get("lobbies").cloned().ok_or_else(|| {
                    LobbyError::Decode("`lobbies` event without a `lobbies` list".to_string())
                })?;
                serde_json::from_value(list)
                    .map(LobbyEvent::Lobbies)
                    .map_err(|e| LobbyError::Decode(format!("bad `lobbies` list: {}", e)))
            }
            other => Err(LobbyError::UnknownEventType(other.to_owned())),
        }
    }
}
