#[cfg(not(feature = "ws"))]
fn main() {}

#[cfg(feature = "ws")]
use std::sync::Arc;

#[cfg(feature = "ws")]
use clap::{Parser, Subcommand};
#[cfg(feature = "ws")]
use lobby_client::{
    init_logging, ClientConfig, ConnectionManager, ConnectionState, ConsoleView, FormKind,
    InputForm, LobbyDispatcher, LobbyForms, ReconnectPolicy, SessionChange, SessionState,
    DEFAULT_MAX_CONNECT_ATTEMPTS, DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_SERVER_URL, MAX_PLAYERS,
    MIN_PLAYERS,
};
#[cfg(feature = "ws")]
use tokio::sync::mpsc;
#[cfg(feature = "ws")]
use tokio::time::{timeout, Duration};

#[derive(Parser)]
#[command(author, version, about = "Create or join a game lobby", long_about = None)]
#[cfg(feature = "ws")]
struct Cli {
    /// WebSocket address of the game server.
    #[arg(long, default_value = DEFAULT_SERVER_URL)]
    url: String,
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECT_ATTEMPTS)]
    max_attempts: u32,
    #[arg(long, default_value_t = 250)]
    initial_backoff_ms: u64,
    #[arg(long, default_value_t = 8000)]
    max_backoff_ms: u64,
    /// How long to wait for the connection and for the server's reply.
    #[arg(long, default_value_t = 10)]
    wait_secs: u64,
    /// Largest message accepted from the server, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_bytes: usize,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[cfg(feature = "ws")]
enum Commands {
    /// Open a new game and wait for its id.
    Create {
        #[arg(long)]
        name: String,
        #[arg(
            long,
            default_value_t = MIN_PLAYERS,
            value_parser = clap::value_parser!(u8).range(MIN_PLAYERS as i64..=MAX_PLAYERS as i64)
        )]
        players: u8,
    },
    /// Join an existing game by id.
    Join {
        #[arg(long)]
        name: String,
        #[arg(long)]
        game_id: String,
    },
}

#[cfg(feature = "ws")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    let wait = Duration::from_secs(cli.wait_secs);

    let config = ClientConfig::new(&cli.url)
        .with_reconnect(ReconnectPolicy {
            max_attempts: cli.max_attempts,
            initial_backoff: Duration::from_millis(cli.initial_backoff_ms),
            max_backoff: Duration::from_millis(cli.max_backoff_ms),
            jitter: true,
        })
        .with_max_message_size(cli.max_message_bytes);
    let connection = Arc::new(ConnectionManager::websocket(config));
    let session = Arc::new(SessionState::new());
    let create_form = Arc::new(InputForm::create_game());
    let join_form = Arc::new(InputForm::join_game());
    let dispatcher = LobbyDispatcher::new(
        Arc::clone(&session),
        Arc::clone(&connection),
        LobbyForms::new(create_form.clone(), join_form.clone()),
        Arc::new(ConsoleView),
    );
    dispatcher.attach();

    let (game_tx, mut game_rx) = mpsc::unbounded_channel();
    session.subscribe(move |change| {
        if let SessionChange::CurrentGame(Some(game_id)) = change {
            let _ = game_tx.send(game_id.clone());
        }
    });

    connection.connect_default();
    let mut state = connection.subscribe_state();
    let _ = timeout(
        wait,
        state.wait_for(|s| matches!(s, ConnectionState::Open | ConnectionState::Closed)),
    )
    .await;
    if connection.state() != ConnectionState::Open {
        connection.close().await;
        anyhow::bail!("Could not connect to {}", cli.url);
    }

    let kind = match cli.command {
        Commands::Create { name, players } => {
            create_form.set_value("playername_create", name);
            create_form.set_value("playernumber", players.to_string());
            FormKind::CreateGame
        }
        Commands::Join { name, game_id } => {
            join_form.set_value("playername_join", name);
            join_form.set_value("gameid", game_id);
            FormKind::JoinGame
        }
    };
    dispatcher.submit(kind)?;

    let confirmed = timeout(wait, game_rx.recv()).await;
    connection.close().await;
    match confirmed {
        Ok(Some(_)) => Ok(()),
        _ => Err(anyhow::anyhow!(
            "No confirmation for {} from the server within {:?}",
            kind,
            wait
        )),
    }
}
