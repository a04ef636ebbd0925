use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::{LobbyError, LobbyResult};

pub type SubscriptionId = u64;

/// A field of the session that changed, with its new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    PlayerName(Option<String>),
    CurrentGame(Option<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub player_name: Option<String>,
    pub current_game_id: Option<String>,
}

type Subscriber = Box<dyn FnMut(&SessionChange) + Send>;

/// Identity of the local player and the game they are in.
///
/// Subscribers run synchronously on the thread performing the change, in
/// subscription order, once per real change. They may read the session but
/// must not modify it or (un)subscribe from inside the callback.
pub struct SessionState {
    fields: Mutex<SessionSnapshot>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            fields: Mutex::new(SessionSnapshot::default()),
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn player_name(&self) -> Option<String> {
        lock(&self.fields).player_name.clone()
    }

    pub fn current_game_id(&self) -> Option<String> {
        lock(&self.fields).current_game_id.clone()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.fields).clone()
    }

    /// Set the player name exactly as given; only the empty string is
    /// rejected. Returns whether the value changed.
    pub fn set_player_name(&self, name: impl Into<String>) -> LobbyResult<bool> {
        let name = name.into();
        if name.is_empty() {
            return Err(LobbyError::InvalidPlayerName);
        }
        Ok(self.update(|fields| {
            replace(&mut fields.player_name, Some(name)).map(SessionChange::PlayerName)
        }))
    }

    /// Set the current game, overwriting any previous one. Returns whether the value changed.
    pub fn set_current_game(&self, game_id: impl Into<String>) -> bool {
        let game_id = game_id.into();
        self.update(|fields| {
            replace(&mut fields.current_game_id, Some(game_id)).map(SessionChange::CurrentGame)
        })
    }

    /// Forget the player and the game, notifying for every field that was set.
    pub fn clear(&self) {
        self.update(|fields| {
            replace(&mut fields.current_game_id, None).map(SessionChange::CurrentGame)
        });
        self.update(|fields| {
            replace(&mut fields.player_name, None).map(SessionChange::PlayerName)
        });
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: FnMut(&SessionChange) + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        lock(&self.subscribers).push((id, Box::new(callback)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| *sub_id != id);
        subscribers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    fn update<F>(&self, apply: F) -> bool
    where
        F: FnOnce(&mut SessionSnapshot) -> Option<SessionChange>,
    {
        // Holding the subscriber list for the whole update keeps notifications
        // in the same order as the changes they describe.
        let mut subscribers = lock(&self.subscribers);
        let change = {
            let mut fields = lock(&self.fields);
            apply(&mut fields)
        };
        match change {
            Some(change) => {
                log::debug!("Session changed: {:?}", change);
                for (_, subscriber) in subscribers.iter_mut() {
                    subscriber(&change);
                }
                true
            }
            None => false,
        }
    }
}

/// Store `value` in `slot`; yields the new value only if it differs from the old one.
fn replace(slot: &mut Option<String>, value: Option<String>) -> Option<Option<String>> {
    if *slot == value {
        None
    } else {
        *slot = value.clone();
        Some(value)
    }
}
