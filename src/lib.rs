//! # taskgate
//!
//! A priority scheduler for UI-presentation tasks: dialogs and full-screen
//! flows that an application wants to show, one at a time, on the right page.
//!
//! ## Architecture Overview
//!
//! - **[`page`]**: Tracks the foreground page and notifies condition observers
//! - **[`task`]**: Task configs, the task factory and the scheduling actor
//! - **[`ui`]**: The collaborator trait executors drive, plus a recording implementation
//! - **[`integration`]**: Service lifecycle and application wiring
//!
//! ## Features
//!
//! ### 🎯 Scheduling
//! - **Single Active Task**: At most one task is presented at any time
//! - **Priority Queue**: Higher priority first, arrival order among equals
//! - **Page Gating**: Tasks bound to a page wait until that page is in front
//! - **Timing Rules**: Minimum show duration, post-completion cooldown,
//!   spacing between tasks and a timeout guard against lost completions
//!
//! ### 📋 Configuration
//! - **Show Caps**: Per-task show counts survive config refreshes
//! - **Config Refresh**: Replace the registered configs from TOML or JSON
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskgate::{DialogTaskSystem, PageRef, RecordingUi, SystemConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let system = DialogTaskSystem::start(SystemConfig::default())?;
//!
//!     // Host lifecycle callbacks feed the page tracker
//!     system.page_tracker()?.on_page_resumed(PageRef::new("MainActivity"));
//!
//!     // Request a task; it shows once nothing else is on screen
//!     let ui = Arc::new(RecordingUi::new("MainActivity"));
//!     system.task_manager()?.add_task_by_id("USER_SURVEY_DIALOG", ui)?;
//!
//!     // The UI reports back when the user closes it
//!     system.task_manager()?.on_task_finished("USER_SURVEY_DIALOG")?;
//!
//!     system.shutdown().await?;
//!     Ok(())
//! }
//! ```

/// Foreground page tracking.
///
/// Records the current activity and fragment and notifies observers when
/// either changes.
pub mod page;

/// Task configuration and scheduling.
///
/// Provides the config registry with show counting, task creation, and the
/// actor that serializes task presentation.
pub mod task;

/// UI collaborator boundary.
pub mod ui;

/// High-level system integration and service lifecycle.
pub mod integration;

/// Environment constants and path utilities.
pub mod env;

// Re-export page tracking types
pub use page::{PageConditionObserver, PageId, PageRef, PageTracker, PageWaiter};

// Re-export main task types
pub use task::{
    LoggingEventHandler, SchedulerConfig, SchedulerError, Task, TaskConfig, TaskConfigSet,
    TaskEvent, TaskEventHandler, TaskFactory, TaskManager, TaskType,
};

// Re-export UI types
pub use ui::{HandleId, RecordingUi, ScreenIntent, UiContext};

// Re-export integration types
pub use integration::{DialogTaskSystem, SystemConfig, SystemStatus};

// CLI module for command-line interface
pub mod cli;
