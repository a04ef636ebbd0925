use std::sync::{Arc, Mutex, PoisonError};

use log::{debug, info, warn};

use crate::connection::ConnectionManager;
use crate::error::{LobbyError, LobbyResult};
use crate::form::LobbyForms;
use crate::protocol::{FormKind, InboundEvent, LobbyEvent, LobbySummary, OutboundRequest};
use crate::session::{SessionChange, SessionState, SubscriptionId};
use crate::ui::{LobbyView, Notice};

/// Inbound half of the dispatcher. Kept apart from the connection so the
/// handlers registered on the manager do not keep the manager alive.
struct InboundHandler {
    session: Arc<SessionState>,
    view: Arc<dyn LobbyView>,
    /// Player name from the last submitted form, committed on confirmation.
    pending_name: Mutex<Option<String>>,
    /// Last lobby list sent by the server.
    open_lobbies: Mutex<Vec<LobbySummary>>,
}

impl InboundHandler {
    fn handle(&self, event: &InboundEvent) -> LobbyResult<()> {
        match LobbyEvent::try_from(event) {
            Ok(LobbyEvent::NewGame { game_id, player_name })
            | Ok(LobbyEvent::JoinedGame { game_id, player_name }) => {
                info!("Server confirmed game {} (`{}`)", game_id, event.event_type);
                self.confirm(game_id, player_name);
                Ok(())
            }
            Ok(LobbyEvent::ServerError { message }) => {
                warn!("Server reported an error: {}", message);
                self.view.show_notice(&Notice::ServerError(message));
                Ok(())
            }
            Ok(LobbyEvent::Lobbies(lobbies)) => {
                debug!("Server lists {} open game(s)", lobbies.len());
                self.view.show_lobbies(&lobbies);
                *self
                    .open_lobbies
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = lobbies;
                Ok(())
            }
            Err(err @ LobbyError::UnknownEventType(_)) => {
                warn!("Ignoring event: {}", err);
                Err(err)
            }
            Err(err) => {
                warn!("Ignoring `{}` event: {}", event.event_type, err);
                Err(err)
            }
        }
    }

    fn confirm(&self, game_id: String, player_name: Option<String>) {
        let pending = self
            .pending_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(name) = player_name.or(pending) {
            if let Err(e) = self.session.set_player_name(name) {
                debug!("Not recording player name: {}", e);
            }
        }
        self.session.set_current_game(game_id);
    }

    fn report(&self, err: &LobbyError) {
        match Notice::for_error(err) {
            Some(notice) => self.view.show_notice(&notice),
            None => debug!("Connection reported: {}", err),
        }
    }
}

/// Bridges the lobby forms to the connection, and server events to the
/// session and the view.
pub struct LobbyDispatcher {
    connection: Arc<ConnectionManager>,
    forms: LobbyForms,
    inbound: Arc<InboundHandler>,
    view_subscription: SubscriptionId,
}

impl LobbyDispatcher {
    /// Wire up a dispatcher. The view starts following the session's current
    /// game immediately; call [`attach`](Self::attach) to start receiving
    /// server events.
    pub fn new(
        session: Arc<SessionState>,
        connection: Arc<ConnectionManager>,
        forms: LobbyForms,
        view: Arc<dyn LobbyView>,
    ) -> Self {
        let display = Arc::clone(&view);
        let view_subscription = session.subscribe(move |change| {
            if let SessionChange::CurrentGame(game_id) = change {
                display.show_current_game(game_id.as_deref());
            }
        });

        Self {
            connection,
            forms,
            inbound: Arc::new(InboundHandler {
                session,
                view,
                pending_name: Mutex::new(None),
                open_lobbies: Mutex::new(Vec::new()),
            }),
            view_subscription,
        }
    }

    /// Register this dispatcher's event and error handlers on the connection.
    pub fn attach(&self) {
        let inbound = Arc::clone(&self.inbound);
        self.connection.on_message(move |event| {
            // Errors are already logged by the handler.
            let _ = inbound.handle(event);
        });
        let inbound = Arc::clone(&self.inbound);
        self.connection.on_error(move |err| inbound.report(err));
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.inbound.session
    }

    /// Games waiting for players, as of the server's last `lobbies` event.
    pub fn open_lobbies(&self) -> Vec<LobbySummary> {
        self.inbound
            .open_lobbies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Submit the form of the given kind with its current input values.
    pub fn submit(&self, kind: FormKind) -> LobbyResult<()> {
        let fields = self
            .forms
            .get(kind)
            .inputs()
            .into_iter()
            .map(|input| (input.id, input.value))
            .collect();
        self.handle_submit(kind, fields)
    }

    /// Send a form submission to the server. When not connected the player
    /// is shown a notice and the error is returned so the caller can retry.
    pub fn handle_submit(&self, kind: FormKind, fields: Vec<(String, String)>) -> LobbyResult<()> {
        let request = OutboundRequest::new(kind, fields);
        // Recorded before sending: the confirmation may arrive before `send` returns.
        let previous = self.replace_pending_name(request.player_name().map(str::to_owned));
        match self.connection.send(&request) {
            Ok(()) => {
                info!("Submitted {} form", kind);
                Ok(())
            }
            Err(err) => {
                self.replace_pending_name(previous);
                warn!("Could not submit {} form: {}", kind, err);
                self.inbound.report(&err);
                Err(err)
            }
        }
    }

    fn replace_pending_name(&self, name: Option<String>) -> Option<String> {
        let mut pending = self
            .inbound
            .pending_name
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *pending, name)
    }

    /// Apply one server event. Unknown or malformed events are logged and
    /// returned as errors without touching the session.
    pub fn handle_inbound_event(&self, event: &InboundEvent) -> LobbyResult<()> {
        self.inbound.handle(event)
    }
}

impl Drop for LobbyDispatcher {
    fn drop(&mut self) {
        self.inbound.session.unsubscribe(self.view_subscription);
    }
}
