use crate::task::types::*;
use crate::ui::{IntentValue, ScreenIntent, UiContext};
use anyhow::{Context, anyhow};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Registry of task configs and per-task show counts.
///
/// Cheap to clone; clones share the same registry. Executors built by the
/// factory hold a clone so they can read the latest config and record shows.
#[derive(Clone)]
pub struct TaskFactory {
    registry: Arc<RwLock<Registry>>,
    count_suppressed_dialogs: bool,
}

#[derive(Debug, Default)]
struct Registry {
    configs: HashMap<TaskId, TaskConfig>,
    show_counts: HashMap<TaskId, u32>,
}

/// Outcome of trying to put a dialog on screen
enum ShowOutcome {
    Shown,
    /// The hosting context was no longer valid; nothing was shown
    Suppressed,
    Failed(anyhow::Error),
}

impl TaskFactory {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(RwLock::new(Registry::default())),
            count_suppressed_dialogs: true,
        }
    }

    /// Whether a dialog counts as shown when its context was invalid and the
    /// show silently did nothing
    pub fn with_count_suppressed_dialogs(mut self, count: bool) -> Self {
        self.count_suppressed_dialogs = count;
        self
    }

    /// Register or update a task config.
    ///
    /// The show count of an already registered task is kept, so updating a
    /// config does not re-arm its show cap.
    pub fn register_or_update_config(&self, config: TaskConfig) {
        let mut registry = self.registry.write();
        registry
            .show_counts
            .entry(config.task_id.clone())
            .or_insert(0);
        debug!("Registered config for task {}", config.task_id);
        registry.configs.insert(config.task_id.clone(), config);
    }

    /// Remove a task config together with its show count
    pub fn remove_config(&self, task_id: &str) {
        let mut registry = self.registry.write();
        registry.configs.remove(task_id);
        registry.show_counts.remove(task_id);
        debug!("Removed config for task {}", task_id);
    }

    pub fn config(&self, task_id: &str) -> Option<TaskConfig> {
        self.registry.read().configs.get(task_id).cloned()
    }

    /// All registered configs, ordered by task id
    pub fn configs(&self) -> Vec<TaskConfig> {
        let mut configs: Vec<TaskConfig> = self.registry.read().configs.values().cloned().collect();
        configs.sort_by(|a, b| a.task_id.cmp(&b.task_id));
        configs
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        self.registry.read().configs.keys().cloned().collect()
    }

    pub fn show_count(&self, task_id: &str) -> Option<u32> {
        self.registry.read().show_counts.get(task_id).copied()
    }

    /// Whether the task has been shown as often as its config allows
    pub fn is_show_limit_reached(&self, task_id: &str) -> bool {
        let registry = self.registry.read();
        match (
            registry.configs.get(task_id),
            registry.show_counts.get(task_id),
        ) {
            (Some(config), Some(count)) => *count >= config.max_show_count,
            _ => false,
        }
    }

    /// Create a runnable task for a registered config.
    ///
    /// Returns `None` when no config is registered for `task_id` or the task
    /// has reached its show cap; callers treat both as a silent skip.
    pub fn create_task(&self, task_id: &str, ui: Arc<dyn UiContext>) -> Option<Task> {
        let Some(config) = self.config(task_id) else {
            warn!("No config found for task: {}", task_id);
            return None;
        };

        if self.is_show_limit_reached(task_id) {
            info!("Task {} reached max show count", task_id);
            return None;
        }

        let executor = match config.task_type {
            TaskType::Dialog => self.dialog_executor(task_id, ui.clone()),
            TaskType::Activity => self.activity_executor(task_id, ui.clone()),
        };

        Some(Task::new(&config).with_ui(ui).with_executor(executor))
    }

    /// Increment the show count of a registered task; unknown ids are ignored
    pub fn record_task_shown(&self, task_id: &str) {
        if let Some(count) = self.registry.write().show_counts.get_mut(task_id) {
            *count += 1;
            debug!("Task {} shown {} times", task_id, count);
        }
    }

    fn dialog_executor(&self, task_id: &str, ui: Arc<dyn UiContext>) -> TaskExecutor {
        let factory = self.clone();
        let task_id = task_id.to_string();

        Arc::new(move |task: &mut Task| {
            if factory.config(&task_id).is_none() {
                return Err(anyhow!("config for task {} was removed", task_id));
            }

            // Page changes re-run the executor; keep a dialog that is still up
            if let Some(existing) = task.dialog() {
                if ui.is_dialog_showing(existing) {
                    debug!("Dialog for task {} already showing", task_id);
                    return Ok(());
                }
            }

            let dialog = ui
                .create_dialog(&task_id)
                .ok_or_else(|| anyhow!("no dialog available for task {}", task_id))?;
            task.bind_dialog(dialog);

            match factory.safe_show_dialog(ui.as_ref(), dialog, &task_id) {
                ShowOutcome::Shown => {
                    factory.record_task_shown(&task_id);
                    Ok(())
                }
                ShowOutcome::Suppressed => {
                    if factory.count_suppressed_dialogs {
                        factory.record_task_shown(&task_id);
                    }
                    Ok(())
                }
                ShowOutcome::Failed(e) => {
                    factory.record_task_shown(&task_id);
                    Err(e)
                }
            }
        })
    }

    fn activity_executor(&self, task_id: &str, ui: Arc<dyn UiContext>) -> TaskExecutor {
        let factory = self.clone();
        let task_id = task_id.to_string();

        Arc::new(move |task: &mut Task| {
            let config = factory
                .config(&task_id)
                .ok_or_else(|| anyhow!("config for task {} was removed", task_id))?;

            if task.screen().is_some() {
                debug!("Screen for task {} already started", task_id);
                return Ok(());
            }

            let intent = create_intent_for_task(&config, !ui.is_screen());
            let screen = ui
                .start_screen(intent)
                .with_context(|| format!("Failed to start screen for task {}", task_id))?;
            task.bind_screen(screen);
            factory.record_task_shown(&task_id);
            Ok(())
        })
    }

    fn safe_show_dialog(
        &self,
        ui: &dyn UiContext,
        dialog: crate::ui::HandleId,
        task_id: &str,
    ) -> ShowOutcome {
        if !ui.is_valid() {
            warn!("Invalid context for dialog of task {}", task_id);
            return ShowOutcome::Suppressed;
        }

        if ui.is_dialog_showing(dialog) {
            return ShowOutcome::Shown;
        }

        match ui.show_dialog(dialog) {
            Ok(()) => ShowOutcome::Shown,
            Err(e) => {
                error!("Failed to show dialog for task {}: {}", task_id, e);
                ShowOutcome::Failed(e)
            }
        }
    }
}

impl Default for TaskFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the intent that launches a task's screen.
///
/// Carries the task id plus every string, integer and boolean extra.
pub fn create_intent_for_task(config: &TaskConfig, new_task: bool) -> ScreenIntent {
    let mut intent = ScreenIntent::new(config.task_id.clone());
    intent.new_task = new_task;

    for (key, value) in &config.extra {
        let value = match value {
            ExtraValue::Bool(b) => IntentValue::Bool(*b),
            ExtraValue::Int(i) => IntentValue::Int(*i),
            ExtraValue::Text(s) => IntentValue::Text(s.clone()),
            ExtraValue::Other(_) => {
                debug!(
                    "Dropping unsupported extra {} for task {}",
                    key, config.task_id
                );
                continue;
            }
        };
        intent.put_extra(key.clone(), value);
    }

    intent
}
