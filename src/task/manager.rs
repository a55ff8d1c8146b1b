use crate::page::{PageConditionObserver, PageId, PageRef, PageTracker};
use crate::task::factory::TaskFactory;
use crate::task::types::*;
use crate::ui::{HandleId, UiContext};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Minimum gap between one task completing and the next starting
pub const MIN_TASK_INTERVAL: Duration = Duration::from_millis(300);

/// A task that never reports completion is force-finished after this long
pub const TASK_TIMEOUT: Duration = Duration::from_secs(30);

/// Identifies one dequeue of a task; timers armed for a run only act on that run
pub type RunId = Uuid;

/// Configuration for the task manager
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    #[serde(rename = "min_task_interval_ms", with = "crate::task::types::duration_ms")]
    pub min_task_interval: Duration,
    #[serde(rename = "task_timeout_ms", with = "crate::task::types::duration_ms")]
    pub task_timeout: Duration,
    /// Count a dialog as shown even when its context was invalid and nothing appeared
    pub count_suppressed_dialogs: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_task_interval: MIN_TASK_INTERVAL,
            task_timeout: TASK_TIMEOUT,
            count_suppressed_dialogs: true,
        }
    }
}

/// Why an add request did not enqueue anything
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    UnknownTask,
    ShowLimitReached,
    RequiredPageNotShown(PageId),
}

/// Events that occur while scheduling tasks
#[derive(Debug, Clone)]
pub enum TaskEvent {
    TaskQueued {
        task_id: TaskId,
        priority: i32,
    },
    TaskDropped {
        task_id: TaskId,
        reason: DropReason,
    },
    TaskStarted {
        task_id: TaskId,
        run_id: RunId,
    },
    WaitingForPage {
        task_id: TaskId,
        page: PageId,
    },
    TaskExecuted {
        task_id: TaskId,
    },
    ExecutionFailed {
        task_id: TaskId,
        error: String,
    },
    CompletionDeferred {
        task_id: TaskId,
        remaining: Duration,
    },
    TaskCompleted {
        task_id: TaskId,
        delay: Duration,
    },
    TaskTimedOut {
        task_id: TaskId,
    },
    QueueCleared {
        dropped: usize,
    },
}

/// Handler for task events
pub trait TaskEventHandler: Send + Sync {
    fn handle_event(&self, event: &TaskEvent) -> Result<()>;
}

/// The task the manager is currently working on
#[derive(Debug, Clone, Serialize)]
pub struct CurrentTaskInfo {
    pub task_id: TaskId,
    pub priority: i32,
    pub state: TaskState,
    pub started_at: DateTime<Utc>,
    pub min_duration_passed: bool,
    pub dialog: Option<HandleId>,
    pub screen: Option<HandleId>,
}

/// Point-in-time view of the scheduler
#[derive(Debug, Clone, Serialize)]
pub struct ManagerSnapshot {
    pub current: Option<CurrentTaskInfo>,
    /// Pending task ids in the order they would be dequeued
    pub pending: Vec<TaskId>,
    pub last_completed_at: Option<DateTime<Utc>>,
}

/// Handle to the task scheduler.
///
/// The scheduler runs as a single actor task that owns the pending queue and
/// the current task. Every method here posts a command to it, so queue and
/// current-task mutations never interleave. Cloning the handle is cheap.
#[derive(Clone)]
pub struct TaskManager {
    tx: mpsc::UnboundedSender<Command>,
}

enum Command {
    AddTask(Task),
    AddTaskById {
        task_id: TaskId,
        ui: Arc<dyn UiContext>,
    },
    TryScheduleNext,
    Execute {
        run_id: RunId,
    },
    PageChanged,
    Finish {
        task_id: TaskId,
        delay: Option<Duration>,
        run_id: Option<RunId>,
    },
    MinDurationElapsed {
        run_id: RunId,
    },
    Timeout {
        run_id: RunId,
    },
    BindScreen {
        task_id: TaskId,
        screen: HandleId,
    },
    Clear,
    AddEventHandler(Box<dyn TaskEventHandler>),
    Snapshot(oneshot::Sender<ManagerSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

impl TaskManager {
    /// Start the scheduler actor and register it as a page observer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        config: SchedulerConfig,
        factory: TaskFactory,
        page_tracker: Arc<PageTracker>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer: Arc<dyn PageConditionObserver> =
            Arc::new(ManagerPageObserver { tx: tx.clone() });

        let actor = ManagerActor {
            config,
            factory,
            page_tracker: page_tracker.clone(),
            observer: observer.clone(),
            tx: tx.clone(),
            pending: BinaryHeap::new(),
            next_seq: 0,
            current: None,
            task_completion_time: None,
            last_completed_at: None,
            delayed_completions: Vec::new(),
            event_handlers: Vec::new(),
        };
        tokio::spawn(actor.run(rx));

        page_tracker.add_page_observer(observer);
        info!("Task manager started");
        Self { tx }
    }

    /// Queue a task.
    ///
    /// A task whose config requires a page that is not currently shown is
    /// dropped, not queued; re-add it once the page is up.
    pub fn add_task(&self, task: Task) -> Result<(), SchedulerError> {
        self.send(Command::AddTask(task))
    }

    /// Create a task from its registered config and queue it.
    ///
    /// Unknown ids and tasks at their show cap are dropped silently.
    pub fn add_task_by_id(
        &self,
        task_id: &str,
        ui: Arc<dyn UiContext>,
    ) -> Result<(), SchedulerError> {
        self.send(Command::AddTaskById {
            task_id: task_id.to_string(),
            ui,
        })
    }

    /// Report that the UI of a task was closed; uses the task's own cooldown
    pub fn on_task_finished(&self, task_id: &str) -> Result<(), SchedulerError> {
        self.send(Command::Finish {
            task_id: task_id.to_string(),
            delay: None,
            run_id: None,
        })
    }

    /// Report that the UI of a task was closed, with an explicit cooldown
    pub fn on_task_finished_with_delay(
        &self,
        task_id: &str,
        delay: Duration,
    ) -> Result<(), SchedulerError> {
        self.send(Command::Finish {
            task_id: task_id.to_string(),
            delay: Some(delay),
            run_id: None,
        })
    }

    /// Bind a launched screen to the current task
    pub fn bind_screen(&self, task_id: &str, screen: HandleId) -> Result<(), SchedulerError> {
        self.send(Command::BindScreen {
            task_id: task_id.to_string(),
            screen,
        })
    }

    /// Drop every pending task and abandon the current one
    pub fn clear(&self) -> Result<(), SchedulerError> {
        self.send(Command::Clear)
    }

    pub fn add_event_handler(
        &self,
        handler: Box<dyn TaskEventHandler>,
    ) -> Result<(), SchedulerError> {
        self.send(Command::AddEventHandler(handler))
    }

    pub async fn snapshot(&self) -> Result<ManagerSnapshot, SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| SchedulerError::ManagerStopped)
    }

    pub async fn current_task(&self) -> Result<Option<CurrentTaskInfo>, SchedulerError> {
        Ok(self.snapshot().await?.current)
    }

    /// Clear all state and stop the actor
    pub async fn shutdown(&self) -> Result<(), SchedulerError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown(tx))?;
        rx.await.map_err(|_| SchedulerError::ManagerStopped)
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), SchedulerError> {
        self.tx
            .send(command)
            .map_err(|_| SchedulerError::ManagerStopped)
    }
}

/// Perpetual page observer: forwards every page change to the actor
struct ManagerPageObserver {
    tx: mpsc::UnboundedSender<Command>,
}

impl PageConditionObserver for ManagerPageObserver {
    fn check(&self, _activity: Option<&PageRef>, _fragment: Option<&PageRef>) {
        let _ = self.tx.send(Command::PageChanged);
    }

    fn is_satisfied(&self) -> bool {
        false
    }
}

/// Pending queue entry: higher priority first, then earlier arrival
struct QueuedTask {
    task: Task,
    seq: u64,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .cmp(&other.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct ActiveTask {
    task: Task,
    run_id: RunId,
    started_at: DateTime<Utc>,
    state: TaskState,
    min_duration_passed: bool,
    /// Cooldown of a completion that arrived before the minimum show duration
    deferred_delay: Option<Duration>,
}

struct ManagerActor {
    config: SchedulerConfig,
    factory: TaskFactory,
    page_tracker: Arc<PageTracker>,
    observer: Arc<dyn PageConditionObserver>,
    tx: mpsc::UnboundedSender<Command>,
    pending: BinaryHeap<QueuedTask>,
    next_seq: u64,
    current: Option<ActiveTask>,
    task_completion_time: Option<Instant>,
    last_completed_at: Option<DateTime<Utc>>,
    delayed_completions: Vec<AbortHandle>,
    event_handlers: Vec<Box<dyn TaskEventHandler>>,
}

impl ManagerActor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::AddTask(task) => self.add_task(task),
                Command::AddTaskById { task_id, ui } => self.add_task_by_id(&task_id, ui),
                Command::TryScheduleNext => self.try_schedule_next(),
                Command::Execute { run_id } => {
                    if self.is_current_run(run_id) {
                        self.execute_task();
                    }
                }
                Command::PageChanged => self.on_page_changed(),
                Command::Finish {
                    task_id,
                    delay,
                    run_id,
                } => self.on_task_finished(&task_id, delay, run_id),
                Command::MinDurationElapsed { run_id } => self.on_min_duration_elapsed(run_id),
                Command::Timeout { run_id } => self.on_timeout(run_id),
                Command::BindScreen { task_id, screen } => self.bind_screen(&task_id, screen),
                Command::Clear => self.clear(),
                Command::AddEventHandler(handler) => self.event_handlers.push(handler),
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.snapshot());
                }
                Command::Shutdown(ack) => {
                    self.clear();
                    self.page_tracker.remove_page_observer(&self.observer);
                    let _ = ack.send(());
                    break;
                }
            }
        }
        info!("Task manager stopped");
    }

    fn add_task_by_id(&mut self, task_id: &str, ui: Arc<dyn UiContext>) {
        match self.factory.create_task(task_id, ui) {
            Some(task) => self.add_task(task),
            None => {
                let reason = if self.factory.config(task_id).is_none() {
                    DropReason::UnknownTask
                } else {
                    DropReason::ShowLimitReached
                };
                self.emit(TaskEvent::TaskDropped {
                    task_id: task_id.to_string(),
                    reason,
                });
            }
        }
    }

    fn add_task(&mut self, task: Task) {
        if let Some(page) = self.required_page(&task.task_id) {
            if !self.page_tracker.is_in_page(&page) {
                debug!("Task {} requires page: {}", task.task_id, page);
                self.emit(TaskEvent::TaskDropped {
                    task_id: task.task_id.clone(),
                    reason: DropReason::RequiredPageNotShown(page),
                });
                return;
            }
        }

        debug!("Queued task {} (priority {})", task.task_id, task.priority);
        self.emit(TaskEvent::TaskQueued {
            task_id: task.task_id.clone(),
            priority: task.priority,
        });
        self.enqueue(task);
        self.try_schedule_next();
    }

    fn enqueue(&mut self, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(QueuedTask { task, seq });
    }

    fn try_schedule_next(&mut self) {
        if self.current.is_some() || self.pending.is_empty() {
            return;
        }

        let now = Instant::now();
        if let Some(completed_at) = self.task_completion_time {
            let elapsed = now.duration_since(completed_at);
            if elapsed < self.config.min_task_interval {
                let remaining = self.config.min_task_interval - elapsed;
                debug!("Next task postponed by {:?} to keep task spacing", remaining);
                self.post_after(remaining, Command::TryScheduleNext);
                return;
            }
        }

        let Some(QueuedTask { mut task, .. }) = self.pending.pop() else {
            return;
        };
        task.start_time = Some(now);
        let run_id = Uuid::new_v4();
        let min_show_duration = task.min_show_duration;

        info!("Starting task {} (priority {})", task.task_id, task.priority);
        self.emit(TaskEvent::TaskStarted {
            task_id: task.task_id.clone(),
            run_id,
        });

        self.current = Some(ActiveTask {
            task,
            run_id,
            started_at: Utc::now(),
            state: TaskState::Pending,
            min_duration_passed: false,
            deferred_delay: None,
        });

        self.post_after(self.config.task_timeout, Command::Timeout { run_id });
        self.post_after(min_show_duration, Command::MinDurationElapsed { run_id });
        self.post(Command::Execute { run_id });
    }

    fn execute_task(&mut self) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        let task_id = active.task.task_id.clone();

        if let Some(page) = self.factory.config(&task_id).and_then(|c| c.required_page) {
            if !self.page_tracker.is_in_page(&page) {
                debug!("Waiting for page {} before running task {}", page, task_id);
                active.state = TaskState::PageWait;
                self.emit(TaskEvent::WaitingForPage { task_id, page });
                return;
            }
        }

        self.run_task_executor();
    }

    fn run_task_executor(&mut self) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        let task_id = active.task.task_id.clone();
        active.state = TaskState::Executing;

        match active.task.execute() {
            Ok(()) => {
                debug!("Executed task {}", task_id);
                self.emit(TaskEvent::TaskExecuted { task_id });
            }
            Err(e) => {
                error!("Failed to execute task {}: {:#}", task_id, e);
                self.emit(TaskEvent::ExecutionFailed {
                    task_id: task_id.clone(),
                    error: format!("{:#}", e),
                });
                self.on_task_finished(&task_id, None, None);
            }
        }
    }

    /// Re-run the current task when its required page comes to the foreground
    fn on_page_changed(&mut self) {
        let Some(active) = self.current.as_ref() else {
            return;
        };
        if !matches!(active.state, TaskState::PageWait | TaskState::Executing) {
            return;
        }
        let Some(page) = self.required_page(&active.task.task_id) else {
            return;
        };

        if self.page_tracker.is_in_page(&page) {
            info!(
                "Page condition satisfied for task: {}",
                active.task.task_id
            );
            self.run_task_executor();
        }
    }

    fn on_task_finished(
        &mut self,
        task_id: &str,
        custom_delay: Option<Duration>,
        run_id: Option<RunId>,
    ) {
        let Some(active) = self.current.as_mut() else {
            debug!("Ignoring completion of {}: no task is active", task_id);
            return;
        };
        if active.task.task_id != task_id || run_id.is_some_and(|id| id != active.run_id) {
            debug!(
                "Ignoring stale completion of {} (current: {})",
                task_id, active.task.task_id
            );
            return;
        }

        let delay = custom_delay.unwrap_or(active.task.delay);

        if !active.min_duration_passed {
            let elapsed = active.task.elapsed().unwrap_or_default();
            let remaining = active.task.min_show_duration.saturating_sub(elapsed);
            if !remaining.is_zero() {
                debug!(
                    "Task {} finished before min duration, delaying by {:?}",
                    task_id, remaining
                );
                active.state = TaskState::MinDurationWait;
                active.deferred_delay = Some(delay);
                let current_run = active.run_id;

                let handle = self.post_after(
                    remaining,
                    Command::Finish {
                        task_id: task_id.to_string(),
                        delay: Some(delay),
                        run_id: Some(current_run),
                    },
                );
                self.delayed_completions.retain(|h| !h.is_finished());
                self.delayed_completions.push(handle);
                self.emit(TaskEvent::CompletionDeferred {
                    task_id: task_id.to_string(),
                    remaining,
                });
                return;
            }
        }

        self.complete_current(delay);
    }

    fn complete_current(&mut self, delay: Duration) {
        let Some(active) = self.current.take() else {
            return;
        };

        info!("Task completed: {}", active.task.task_id);
        self.task_completion_time = Some(Instant::now());
        self.last_completed_at = Some(Utc::now());
        self.emit(TaskEvent::TaskCompleted {
            task_id: active.task.task_id,
            delay,
        });

        self.post_after(delay, Command::TryScheduleNext);
    }

    fn on_min_duration_elapsed(&mut self, run_id: RunId) {
        let Some(active) = self.current.as_mut() else {
            return;
        };
        if active.run_id != run_id {
            return;
        }

        active.min_duration_passed = true;
        if let Some(delay) = active.deferred_delay {
            debug!(
                "Min duration passed, completing deferred task: {}",
                active.task.task_id
            );
            let task_id = active.task.task_id.clone();
            self.on_task_finished(&task_id, Some(delay), Some(run_id));
        }
    }

    fn on_timeout(&mut self, run_id: RunId) {
        if !self.is_current_run(run_id) {
            return;
        }
        self.force_finish_current_task();
        self.try_schedule_next();
    }

    /// Abandon the current task and put it back in the queue
    fn force_finish_current_task(&mut self) {
        let Some(active) = self.current.take() else {
            return;
        };
        let mut task = active.task;
        warn!("Task timeout: {}", task.task_id);

        safe_dismiss_dialog(&task);
        task.unbind();
        task.start_time = None;

        self.emit(TaskEvent::TaskTimedOut {
            task_id: task.task_id.clone(),
        });
        info!("Task force finished: {}", task.task_id);
        self.enqueue(task);
    }

    fn bind_screen(&mut self, task_id: &str, screen: HandleId) {
        match self.current.as_mut() {
            Some(active) if active.task.task_id == task_id => {
                debug!("Bound screen {} to task {}", screen, task_id);
                active.task.bind_screen(screen);
            }
            _ => debug!("Ignoring screen binding for inactive task {}", task_id),
        }
    }

    fn clear(&mut self) {
        for handle in self.delayed_completions.drain(..) {
            handle.abort();
        }

        let dropped = self.pending.len();
        self.pending.clear();

        if let Some(active) = self.current.take() {
            safe_dismiss_dialog(&active.task);
        }

        info!("Cleared task manager ({} pending tasks dropped)", dropped);
        self.emit(TaskEvent::QueueCleared { dropped });
    }

    fn snapshot(&self) -> ManagerSnapshot {
        let current = self.current.as_ref().map(|active| CurrentTaskInfo {
            task_id: active.task.task_id.clone(),
            priority: active.task.priority,
            state: active.state,
            started_at: active.started_at,
            min_duration_passed: active.min_duration_passed,
            dialog: active.task.dialog(),
            screen: active.task.screen(),
        });

        let mut queued: Vec<&QueuedTask> = self.pending.iter().collect();
        queued.sort_by(|a, b| b.cmp(a));

        ManagerSnapshot {
            current,
            pending: queued.iter().map(|q| q.task.task_id.clone()).collect(),
            last_completed_at: self.last_completed_at,
        }
    }

    fn is_current_run(&self, run_id: RunId) -> bool {
        self.current
            .as_ref()
            .is_some_and(|active| active.run_id == run_id)
    }

    fn required_page(&self, task_id: &str) -> Option<PageId> {
        self.factory
            .config(task_id)
            .and_then(|config| config.required_page)
    }

    fn post(&self, command: Command) {
        let _ = self.tx.send(command);
    }

    /// Deliver `command` to this actor after `delay`
    fn post_after(&self, delay: Duration, command: Command) -> AbortHandle {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(command);
        })
        .abort_handle()
    }

    fn emit(&self, event: TaskEvent) {
        for handler in &self.event_handlers {
            if let Err(e) = handler.handle_event(&event) {
                error!("Event handler error: {}", e);
            }
        }
    }
}

/// Dismiss a task's dialog if it is still up; failures are logged and swallowed
fn safe_dismiss_dialog(task: &Task) {
    let (Some(ui), Some(dialog)) = (task.ui(), task.dialog()) else {
        return;
    };
    if ui.is_dialog_showing(dialog) {
        if let Err(e) = ui.dismiss_dialog(dialog) {
            error!("Error dismissing dialog for task {}: {}", task.task_id, e);
        }
    }
}

/// Simple event handler that logs events
pub struct LoggingEventHandler;

impl TaskEventHandler for LoggingEventHandler {
    fn handle_event(&self, event: &TaskEvent) -> Result<()> {
        match event {
            TaskEvent::TaskQueued { task_id, priority } => {
                info!("Task queued: {} (priority {})", task_id, priority);
            }
            TaskEvent::TaskDropped { task_id, reason } => {
                info!("Task dropped: {} ({:?})", task_id, reason);
            }
            TaskEvent::TaskStarted { task_id, run_id } => {
                info!("Task started: {} (run {})", task_id, run_id);
            }
            TaskEvent::WaitingForPage { task_id, page } => {
                info!("Task {} waiting for page {}", task_id, page);
            }
            TaskEvent::TaskExecuted { task_id } => {
                info!("Task presented: {}", task_id);
            }
            TaskEvent::ExecutionFailed { task_id, error } => {
                warn!("Task failed to present: {} - {}", task_id, error);
            }
            TaskEvent::CompletionDeferred { task_id, remaining } => {
                debug!("Task {} completion deferred by {:?}", task_id, remaining);
            }
            TaskEvent::TaskCompleted { task_id, delay } => {
                info!("Task completed: {} (cooldown {:?})", task_id, delay);
            }
            TaskEvent::TaskTimedOut { task_id } => {
                warn!("Task timed out and was requeued: {}", task_id);
            }
            TaskEvent::QueueCleared { dropped } => {
                info!("Task queue cleared ({} dropped)", dropped);
            }
        }
        Ok(())
    }
}
