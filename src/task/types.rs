use crate::page::PageId;
use crate::ui::{HandleId, UiContext};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Unique identifier for task configurations
pub type TaskId = String;

/// Closure that presents a task's UI.
///
/// Built by the [`TaskFactory`](crate::task::TaskFactory) from the task's
/// config. It may bind UI handles to the task it runs for.
pub type TaskExecutor = Arc<dyn Fn(&mut Task) -> anyhow::Result<()> + Send + Sync>;

/// Default priority for configs that do not set one
pub const DEFAULT_PRIORITY: i32 = 5;

/// Default post-completion cooldown
pub const DEFAULT_DELAY: Duration = Duration::from_millis(3000);

/// Default minimum time a task's UI stays on screen
pub const DEFAULT_MIN_SHOW_DURATION: Duration = Duration::from_millis(2000);

/// How a task presents itself
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    #[default]
    Dialog,
    Activity,
}

/// Extra value attached to a task config.
///
/// Only booleans, integers and strings are forwarded to launched screens;
/// anything else is kept in the config but dropped from intents.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ExtraValue {
    Bool(bool),
    Int(i64),
    Text(String),
    Other(serde_json::Value),
}

/// Static descriptor from which tasks are instantiated
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct TaskConfig {
    pub task_id: TaskId,
    /// Higher is more urgent
    pub priority: i32,
    #[serde(rename = "type")]
    pub task_type: TaskType,
    /// Cooldown before the next task may start after this one completes
    #[serde(rename = "delay_ms", with = "duration_ms")]
    pub delay: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_page: Option<PageId>,
    #[serde(rename = "min_show_duration_ms", with = "duration_ms")]
    pub min_show_duration: Duration,
    pub requires_login: bool,
    pub max_show_count: u32,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, ExtraValue>,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            task_id: String::new(),
            priority: DEFAULT_PRIORITY,
            task_type: TaskType::Dialog,
            delay: DEFAULT_DELAY,
            required_page: None,
            min_show_duration: DEFAULT_MIN_SHOW_DURATION,
            requires_login: false,
            max_show_count: 1,
            extra: BTreeMap::new(),
        }
    }
}

impl TaskConfig {
    /// Create a config with default settings
    pub fn new(task_id: &str, task_type: TaskType) -> Self {
        Self {
            task_id: task_id.to_string(),
            task_type,
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_required_page(mut self, page: impl Into<PageId>) -> Self {
        self.required_page = Some(page.into());
        self
    }

    pub fn with_min_show_duration(mut self, duration: Duration) -> Self {
        self.min_show_duration = duration;
        self
    }

    pub fn with_max_show_count(mut self, count: u32) -> Self {
        self.max_show_count = count;
        self
    }

    pub fn requiring_login(mut self) -> Self {
        self.requires_login = true;
        self
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<ExtraValue>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    /// Check the config can be registered
    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.task_id.trim().is_empty() {
            return Err(SchedulerError::InvalidConfig(
                "task_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<bool> for ExtraValue {
    fn from(value: bool) -> Self {
        ExtraValue::Bool(value)
    }
}

impl From<i64> for ExtraValue {
    fn from(value: i64) -> Self {
        ExtraValue::Int(value)
    }
}

impl From<i32> for ExtraValue {
    fn from(value: i32) -> Self {
        ExtraValue::Int(value.into())
    }
}

impl From<&str> for ExtraValue {
    fn from(value: &str) -> Self {
        ExtraValue::Text(value.to_string())
    }
}

impl From<String> for ExtraValue {
    fn from(value: String) -> Self {
        ExtraValue::Text(value)
    }
}

impl From<serde_json::Value> for ExtraValue {
    fn from(value: serde_json::Value) -> Self {
        ExtraValue::Other(value)
    }
}

/// Scheduling state of the task the manager is working on
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Dequeued, executor not yet invoked
    Pending,
    /// Waiting for its required page to come to the foreground
    PageWait,
    /// UI presented
    Executing,
    /// UI closed, minimum show duration not yet elapsed
    MinDurationWait,
}

/// A schedulable unit of UI presentation.
///
/// Created per request by the factory and discarded once completed. The task
/// never owns the UI it presents: it only remembers the handles the UI layer
/// gave it.
#[derive(Clone)]
pub struct Task {
    pub task_id: TaskId,
    pub priority: i32,
    pub task_type: TaskType,
    pub delay: Duration,
    pub min_show_duration: Duration,
    /// Set when the manager dequeues the task
    pub start_time: Option<Instant>,
    executor: Option<TaskExecutor>,
    ui: Option<Arc<dyn UiContext>>,
    dialog: Option<HandleId>,
    screen: Option<HandleId>,
}

impl Task {
    /// Create a task from its config, without an executor
    pub fn new(config: &TaskConfig) -> Self {
        Self {
            task_id: config.task_id.clone(),
            priority: config.priority,
            task_type: config.task_type,
            delay: config.delay,
            min_show_duration: config.min_show_duration,
            start_time: None,
            executor: None,
            ui: None,
            dialog: None,
            screen: None,
        }
    }

    pub fn with_executor(mut self, executor: TaskExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Attach the UI context the task presents into
    pub fn with_ui(mut self, ui: Arc<dyn UiContext>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Run the executor; a task without one does nothing
    pub fn execute(&mut self) -> anyhow::Result<()> {
        match self.executor.clone() {
            Some(executor) => executor(self),
            None => Ok(()),
        }
    }

    pub fn ui(&self) -> Option<&Arc<dyn UiContext>> {
        self.ui.as_ref()
    }

    pub fn dialog(&self) -> Option<HandleId> {
        self.dialog
    }

    pub fn bind_dialog(&mut self, dialog: HandleId) {
        self.dialog = Some(dialog);
    }

    pub fn screen(&self) -> Option<HandleId> {
        self.screen
    }

    pub fn bind_screen(&mut self, screen: HandleId) {
        self.screen = Some(screen);
    }

    /// Forget any UI bound by a previous run
    pub fn unbind(&mut self) {
        self.dialog = None;
        self.screen = None;
    }

    /// Time since the task was dequeued
    pub fn elapsed(&self) -> Option<Duration> {
        self.start_time.map(|start| start.elapsed())
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("task_id", &self.task_id)
            .field("priority", &self.priority)
            .field("task_type", &self.task_type)
            .field("delay", &self.delay)
            .field("min_show_duration", &self.min_show_duration)
            .field("start_time", &self.start_time)
            .field("has_executor", &self.executor.is_some())
            .field("dialog", &self.dialog)
            .field("screen", &self.screen)
            .finish()
    }
}

/// Errors surfaced by the scheduler to its callers
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("{0} not initialized")]
    NotInitialized(&'static str),
    #[error("Task manager has stopped")]
    ManagerStopped,
    #[error("Invalid task config: {0}")]
    InvalidConfig(String),
    #[error("Failed to parse task configs: {0}")]
    ConfigParse(String),
}

/// Serialize durations as whole milliseconds
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
