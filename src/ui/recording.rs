use crate::ui::{HandleId, ScreenIntent, UiContext};
use anyhow::{Result, anyhow};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use uuid::Uuid;

/// A UI interaction observed by [`RecordingUi`]
#[derive(Debug, Clone, PartialEq)]
pub enum UiCall {
    DialogCreated { task_id: String, dialog: HandleId },
    DialogShown { task_id: String, dialog: HandleId },
    DialogDismissed { task_id: String, dialog: HandleId },
    DialogClosedByUser { task_id: String, dialog: HandleId },
    ScreenStarted { intent: ScreenIntent, screen: HandleId },
}

/// Headless [`UiContext`] that logs and records every interaction.
///
/// Used by the scenario runner and by tests. Failure switches make the next
/// show/launch/dismiss calls fail so error paths can be exercised.
pub struct RecordingUi {
    name: String,
    valid: AtomicBool,
    screen: AtomicBool,
    fail_show: AtomicBool,
    fail_launch: AtomicBool,
    fail_dismiss: AtomicBool,
    state: Mutex<RecordingState>,
}

#[derive(Default)]
struct RecordingState {
    calls: Vec<UiCall>,
    dialogs: HashMap<HandleId, DialogRecord>,
}

struct DialogRecord {
    task_id: String,
    showing: bool,
}

impl RecordingUi {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            valid: AtomicBool::new(true),
            screen: AtomicBool::new(false),
            fail_show: AtomicBool::new(false),
            fail_launch: AtomicBool::new(false),
            fail_dismiss: AtomicBool::new(false),
            state: Mutex::new(RecordingState::default()),
        }
    }

    /// Mark this context as a screen (launches do not need a new task stack)
    pub fn as_screen(self) -> Self {
        self.screen.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_valid(&self, valid: bool) {
        self.valid.store(valid, Ordering::SeqCst);
    }

    pub fn set_fail_show(&self, fail: bool) {
        self.fail_show.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_launch(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_dismiss(&self, fail: bool) {
        self.fail_dismiss.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<UiCall> {
        self.state.lock().calls.clone()
    }

    /// Number of times a dialog for `task_id` was actually put on screen
    pub fn dialogs_shown(&self, task_id: &str) -> usize {
        self.count_calls(|call| {
            matches!(call, UiCall::DialogShown { task_id: id, .. } if id == task_id)
        })
    }

    pub fn dialogs_dismissed(&self, task_id: &str) -> usize {
        self.count_calls(|call| {
            matches!(call, UiCall::DialogDismissed { task_id: id, .. } if id == task_id)
        })
    }

    pub fn screens_started(&self, task_id: &str) -> usize {
        self.count_calls(|call| {
            matches!(call, UiCall::ScreenStarted { intent, .. } if intent.task_id == task_id)
        })
    }

    /// Last intent launched for `task_id`
    pub fn last_intent(&self, task_id: &str) -> Option<ScreenIntent> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find_map(|call| match call {
                UiCall::ScreenStarted { intent, .. } if intent.task_id == task_id => {
                    Some(intent.clone())
                }
                _ => None,
            })
    }

    /// Task ids whose dialogs are currently on screen
    pub fn showing_dialogs(&self) -> Vec<String> {
        let mut showing: Vec<String> = self
            .state
            .lock()
            .dialogs
            .values()
            .filter(|record| record.showing)
            .map(|record| record.task_id.clone())
            .collect();
        showing.sort();
        showing
    }

    /// Simulate the user closing the dialog shown for `task_id`
    pub fn close_dialog(&self, task_id: &str) -> Option<HandleId> {
        let mut state = self.state.lock();
        let dialog = state
            .dialogs
            .iter_mut()
            .find(|(_, record)| record.showing && record.task_id == task_id)
            .map(|(id, record)| {
                record.showing = false;
                *id
            })?;
        state.calls.push(UiCall::DialogClosedByUser {
            task_id: task_id.to_string(),
            dialog,
        });
        info!("[{}] User closed dialog for task {}", self.name, task_id);
        Some(dialog)
    }

    fn count_calls(&self, predicate: impl Fn(&UiCall) -> bool) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| predicate(call))
            .count()
    }
}

impl UiContext for RecordingUi {
    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    fn is_screen(&self) -> bool {
        self.screen.load(Ordering::SeqCst)
    }

    fn create_dialog(&self, task_id: &str) -> Option<HandleId> {
        let dialog = Uuid::new_v4();
        let mut state = self.state.lock();
        state.dialogs.insert(
            dialog,
            DialogRecord {
                task_id: task_id.to_string(),
                showing: false,
            },
        );
        state.calls.push(UiCall::DialogCreated {
            task_id: task_id.to_string(),
            dialog,
        });
        Some(dialog)
    }

    fn show_dialog(&self, dialog: HandleId) -> Result<()> {
        if self.fail_show.load(Ordering::SeqCst) {
            return Err(anyhow!("window token is no longer valid"));
        }

        let mut state = self.state.lock();
        let record = state
            .dialogs
            .get_mut(&dialog)
            .ok_or_else(|| anyhow!("unknown dialog {}", dialog))?;
        record.showing = true;
        let task_id = record.task_id.clone();
        info!("[{}] Showing dialog for task {}", self.name, task_id);
        state.calls.push(UiCall::DialogShown { task_id, dialog });
        Ok(())
    }

    fn is_dialog_showing(&self, dialog: HandleId) -> bool {
        self.state
            .lock()
            .dialogs
            .get(&dialog)
            .is_some_and(|record| record.showing)
    }

    fn dismiss_dialog(&self, dialog: HandleId) -> Result<()> {
        if self.fail_dismiss.load(Ordering::SeqCst) {
            return Err(anyhow!("dialog {} is not attached to a window", dialog));
        }

        let mut state = self.state.lock();
        let record = state
            .dialogs
            .get_mut(&dialog)
            .ok_or_else(|| anyhow!("unknown dialog {}", dialog))?;
        record.showing = false;
        let task_id = record.task_id.clone();
        info!("[{}] Dismissed dialog for task {}", self.name, task_id);
        state.calls.push(UiCall::DialogDismissed { task_id, dialog });
        Ok(())
    }

    fn start_screen(&self, intent: ScreenIntent) -> Result<HandleId> {
        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(anyhow!("no screen registered for task {}", intent.task_id));
        }

        let screen = Uuid::new_v4();
        info!(
            "[{}] Starting screen for task {} (new_task: {})",
            self.name, intent.task_id, intent.new_task
        );
        self.state
            .lock()
            .calls
            .push(UiCall::ScreenStarted { intent, screen });
        Ok(screen)
    }
}
