//! UI collaborator boundary.
//!
//! The scheduler never renders anything. Executors drive a [`UiContext`]
//! supplied by the host application, and refer to the UI objects it creates
//! only through opaque [`HandleId`]s. The host owns those objects; the
//! scheduler can ask whether a dialog is showing and ask for it to be
//! dismissed, nothing more.

pub mod recording;

pub use recording::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Opaque reference to a dialog or screen owned by the UI layer
pub type HandleId = Uuid;

/// Intent extra that carries the id of the task that launched a screen
pub const TASK_ID_EXTRA: &str = "TASK_ID";

/// Values a screen intent can carry
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum IntentValue {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Request to start a full-screen flow for a task
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ScreenIntent {
    pub task_id: String,
    pub extras: BTreeMap<String, IntentValue>,
    /// Launch in a new task stack because the launching context is not a screen
    pub new_task: bool,
}

impl ScreenIntent {
    pub fn new(task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        let mut extras = BTreeMap::new();
        extras.insert(
            TASK_ID_EXTRA.to_string(),
            IntentValue::Text(task_id.clone()),
        );
        Self {
            task_id,
            extras,
            new_task: false,
        }
    }

    pub fn put_extra(&mut self, key: impl Into<String>, value: IntentValue) {
        self.extras.insert(key.into(), value);
    }

    pub fn extra(&self, key: &str) -> Option<&IntentValue> {
        self.extras.get(key)
    }
}

/// Capabilities the host UI layer provides to task executors.
///
/// Every method is called from the scheduler's coordination task, one at a
/// time. Errors are reported back to the scheduler, which logs them and moves
/// on to the next task.
pub trait UiContext: Send + Sync {
    /// Whether the hosting context can still show UI (not finishing or destroyed)
    fn is_valid(&self) -> bool;

    /// Whether the hosting context is itself a screen
    fn is_screen(&self) -> bool;

    /// Build the dialog content for a task without showing it
    fn create_dialog(&self, task_id: &str) -> Option<HandleId>;

    fn show_dialog(&self, dialog: HandleId) -> anyhow::Result<()>;

    fn is_dialog_showing(&self, dialog: HandleId) -> bool;

    fn dismiss_dialog(&self, dialog: HandleId) -> anyhow::Result<()>;

    /// Launch a screen; the launched screen reports back with
    /// [`TaskManager::bind_screen`](crate::task::TaskManager::bind_screen)
    fn start_screen(&self, intent: ScreenIntent) -> anyhow::Result<HandleId>;
}
