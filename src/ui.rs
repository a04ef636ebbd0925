use std::fmt;

use crate::error::LobbyError;
use crate::protocol::LobbySummary;

/// Something the player should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    NotConnected,
    ServerUnavailable { url: String },
    ServerError(String),
}

impl Notice {
    /// Notice for an error the player should see, if it is one.
    pub fn for_error(err: &LobbyError) -> Option<Self> {
        match err {
            LobbyError::NotConnected => Some(Notice::NotConnected),
            LobbyError::ConnectionUnavailable { url, .. } => {
                Some(Notice::ServerUnavailable { url: url.clone() })
            }
            _ => None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NotConnected => {
                f.write_str("Not connected to the game server. Please try again.")
            }
            Notice::ServerUnavailable { url } => {
                write!(f, "The game server at {} cannot be reached.", url)
            }
            Notice::ServerError(message) => write!(f, "Server: {}", message),
        }
    }
}

/// Display target for the lobby: the current-game element and a notice area.
pub trait LobbyView: Send + Sync {
    fn show_current_game(&self, game_id: Option<&str>);
    fn show_notice(&self, notice: &Notice);
    /// Games waiting for players. Views without a lobby list ignore it.
    fn show_lobbies(&self, _lobbies: &[LobbySummary]) {}
}

/// [`LobbyView`] printing to the terminal.
pub struct ConsoleView;

impl LobbyView for ConsoleView {
    fn show_current_game(&self, game_id: Option<&str>) {
        match game_id {
            Some(id) => println!("Current game: {}", id),
            None => println!("Not in a game"),
        }
    }

    fn show_notice(&self, notice: &Notice) {
        eprintln!("! {}", notice);
    }

    fn show_lobbies(&self, lobbies: &[LobbySummary]) {
        if lobbies.is_empty() {
            println!("No open games");
        }
        for lobby in lobbies {
            println!(
                "{}  {}/{} players  {}",
                lobby.game_id,
                lobby.current_player_count,
                lobby.num_players_required,
                lobby.players.join(", ")
            );
        }
    }
}
