use std::sync::{Arc, Mutex, PoisonError};

use crate::protocol::FormKind;

/// Field ids of the create-game form, in display order.
pub const CREATE_GAME_FIELDS: [&str; 2] = ["playername_create", "playernumber"];
/// Field ids of the join-game form, in display order.
pub const JOIN_GAME_FIELDS: [&str; 2] = ["playername_join", "gameid"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormInput {
    pub id: String,
    pub value: String,
}

/// A form the player can submit; `inputs` lists its current input
/// elements in document order.
pub trait LobbyForm: Send + Sync {
    fn inputs(&self) -> Vec<FormInput>;
}

/// Form backed by an in-memory list of inputs whose values can be edited.
#[derive(Debug, Default)]
pub struct InputForm {
    inputs: Mutex<Vec<FormInput>>,
}

impl InputForm {
    /// Form with empty inputs for the given ids.
    pub fn new(ids: &[&str]) -> Self {
        Self {
            inputs: Mutex::new(
                ids.iter()
                    .map(|id| FormInput {
                        id: (*id).to_string(),
                        value: String::new(),
                    })
                    .collect(),
            ),
        }
    }

    pub fn create_game() -> Self {
        Self::new(&CREATE_GAME_FIELDS)
    }

    pub fn join_game() -> Self {
        Self::new(&JOIN_GAME_FIELDS)
    }

    /// Set the value of an existing input. Returns false if there is no input with that id.
    pub fn set_value(&self, id: &str, value: impl Into<String>) -> bool {
        let mut inputs = self.inputs.lock().unwrap_or_else(PoisonError::into_inner);
        match inputs.iter_mut().find(|input| input.id == id) {
            Some(input) => {
                input.value = value.into();
                true
            }
            None => false,
        }
    }

    /// Append an input element at the end of the form.
    pub fn add_input(&self, id: impl Into<String>, value: impl Into<String>) {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(FormInput {
                id: id.into(),
                value: value.into(),
            });
    }

    pub fn remove_input(&self, id: &str) {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|input| input.id != id);
    }
}

impl LobbyForm for InputForm {
    fn inputs(&self) -> Vec<FormInput> {
        self.inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// The two lobby forms handed to the dispatcher.
#[derive(Clone)]
pub struct LobbyForms {
    pub create: Arc<dyn LobbyForm>,
    pub join: Arc<dyn LobbyForm>,
}

impl LobbyForms {
    pub fn new(create: Arc<dyn LobbyForm>, join: Arc<dyn LobbyForm>) -> Self {
        Self { create, join }
    }

    pub fn get(&self, kind: FormKind) -> &dyn LobbyForm {
        match kind {
            FormKind::CreateGame => self.create.as_ref(),
            FormKind::JoinGame => self.join.as_ref(),
        }
    }
}
