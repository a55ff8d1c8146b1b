//! # Application Entry Point
//!
//! Owns the lifecycle of the scheduling services and wires them together.
//!
//! ## Core Components
//!
//! - **[`DialogTaskSystem`]**: creates the page tracker, task factory and task
//!   manager, and hands them out to the rest of the application
//! - **[`SystemConfig`]**: scheduler settings plus the startup task configs
//! - **[`SystemStatus`]**: registered tasks with their show counts, and the
//!   scheduler snapshot
//!
//! ## System Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                 DialogTaskSystem                  │
//! │  ┌─────────────┐  ┌─────────────┐  ┌────────────┐ │
//! │  │    Page     │─▶│    Task     │◀─│    Task    │ │
//! │  │   Tracker   │  │   Manager   │  │  Factory   │ │
//! │  └─────────────┘  └─────────────┘  └────────────┘ │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! Services are initialized once, in order: the page tracker, the factory
//! (which registers the configured tasks), then the manager. Initializing an
//! already initialized service returns the existing one. Accessing a service
//! before it is initialized fails with [`SchedulerError::NotInitialized`].
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use taskgate::{DialogTaskSystem, PageRef, RecordingUi, SystemConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let system = DialogTaskSystem::start(SystemConfig::default())?;
//!
//!     system.page_tracker()?.on_page_resumed(PageRef::new("MainActivity"));
//!     let ui = Arc::new(RecordingUi::new("MainActivity"));
//!     system.task_manager()?.add_task_by_id("USER_SURVEY_DIALOG", ui)?;
//!
//!     let status = system.get_system_status().await?;
//!     println!("Current task: {:?}", status.scheduler.current);
//!
//!     system.shutdown().await?;
//!     Ok(())
//! }
//! ```

use crate::page::PageTracker;
use crate::task::{
    ManagerSnapshot, SchedulerConfig, SchedulerError, TaskConfig, TaskConfigSet, TaskFactory,
    TaskId, TaskManager, TaskType,
};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Page the demo survey dialog is gated on
pub const SURVEY_PAGE: &str = "MainActivity";

/// Page the demo VIP promotion is gated on
pub const VIP_PROMO_PAGE: &str = "ProfileFragment";

/// Owner of the scheduling services
pub struct DialogTaskSystem {
    config: SystemConfig,
    page_tracker: RwLock<Option<Arc<PageTracker>>>,
    task_factory: RwLock<Option<TaskFactory>>,
    task_manager: RwLock<Option<TaskManager>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Task configs registered at startup
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

/// Show bookkeeping for one registered task
#[derive(Debug, Clone, Serialize)]
pub struct TaskShowStatus {
    pub task_id: TaskId,
    pub priority: i32,
    pub show_count: u32,
    pub max_show_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub registered_tasks: Vec<TaskShowStatus>,
    pub scheduler: ManagerSnapshot,
    pub is_healthy: bool,
}

impl DialogTaskSystem {
    /// Create a system with no service initialized yet
    pub fn new(config: SystemConfig) -> Self {
        Self {
            config,
            page_tracker: RwLock::new(None),
            task_factory: RwLock::new(None),
            task_manager: RwLock::new(None),
        }
    }

    /// Create a system and initialize every service.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: SystemConfig) -> Result<Self> {
        config.validate()?;
        let system = Self::new(config);
        system.init_page_tracker();
        system.init_task_factory();
        system.init_task_manager()?;
        info!("Dialog task system started");
        Ok(system)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn init_page_tracker(&self) -> Arc<PageTracker> {
        let mut slot = self.page_tracker.write();
        slot.get_or_insert_with(|| {
            info!("Page tracker initialized");
            Arc::new(PageTracker::new())
        })
        .clone()
    }

    /// Initialize the factory and register the configured tasks
    pub fn init_task_factory(&self) -> TaskFactory {
        let mut slot = self.task_factory.write();
        slot.get_or_insert_with(|| {
            let factory = TaskFactory::new()
                .with_count_suppressed_dialogs(self.config.scheduler.count_suppressed_dialogs);
            crate::task::update_task_configs(&factory, &self.config.tasks);
            info!(
                "Task factory initialized with {} configs",
                self.config.tasks.len()
            );
            factory
        })
        .clone()
    }

    /// Start the task manager; the page tracker and factory must exist first
    pub fn init_task_manager(&self) -> Result<TaskManager, SchedulerError> {
        let page_tracker = self.page_tracker()?;
        let factory = self.task_factory()?;

        let mut slot = self.task_manager.write();
        if let Some(manager) = slot.as_ref() {
            return Ok(manager.clone());
        }
        let manager = TaskManager::spawn(self.config.scheduler.clone(), factory, page_tracker);
        *slot = Some(manager.clone());
        Ok(manager)
    }

    pub fn page_tracker(&self) -> Result<Arc<PageTracker>, SchedulerError> {
        self.page_tracker
            .read()
            .clone()
            .ok_or(SchedulerError::NotInitialized("PageTracker"))
    }

    pub fn task_factory(&self) -> Result<TaskFactory, SchedulerError> {
        self.task_factory
            .read()
            .clone()
            .ok_or(SchedulerError::NotInitialized("TaskFactory"))
    }

    pub fn task_manager(&self) -> Result<TaskManager, SchedulerError> {
        self.task_manager
            .read()
            .clone()
            .ok_or(SchedulerError::NotInitialized("TaskManager"))
    }

    /// Replace the registered task configs; returns the removed task ids
    pub fn update_task_configs(
        &self,
        configs: &[TaskConfig],
    ) -> Result<Vec<TaskId>, SchedulerError> {
        let set = TaskConfigSet::new(configs.to_vec());
        set.validate()?;
        Ok(crate::task::update_task_configs(
            &self.task_factory()?,
            &set.tasks,
        ))
    }

    /// Apply a JSON config payload received from the backend
    pub fn on_config_response(&self, payload: &str) -> Result<Vec<TaskId>, SchedulerError> {
        let set = TaskConfigSet::from_json_str(payload)?;
        info!("Received {} task configs", set.tasks.len());
        Ok(crate::task::update_task_configs(
            &self.task_factory()?,
            &set.tasks,
        ))
    }

    /// Get system status
    pub async fn get_system_status(&self) -> Result<SystemStatus> {
        let factory = self.task_factory()?;
        let scheduler = self.task_manager()?.snapshot().await?;

        let registered_tasks = factory
            .configs()
            .into_iter()
            .map(|config| TaskShowStatus {
                show_count: factory.show_count(&config.task_id).unwrap_or_default(),
                task_id: config.task_id,
                priority: config.priority,
                max_show_count: config.max_show_count,
            })
            .collect();

        Ok(SystemStatus {
            registered_tasks,
            scheduler,
            is_healthy: self.page_tracker.read().is_some(),
        })
    }

    /// Graceful shutdown
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down dialog task system...");

        let manager = self.task_manager.write().take();
        if let Some(manager) = manager {
            manager
                .shutdown()
                .await
                .context("Failed to stop task manager")?;
        }
        self.task_factory.write().take();
        self.page_tracker.write().take();

        info!("Dialog task system shutdown complete");
        Ok(())
    }
}

impl SystemConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        TaskConfigSet::new(self.tasks.clone()).validate()
    }

    /// The two demo tasks registered when no config file is found
    pub fn demo_tasks() -> Vec<TaskConfig> {
        vec![
            TaskConfig::new("USER_SURVEY_DIALOG", TaskType::Dialog)
                .with_priority(6)
                .with_required_page(SURVEY_PAGE)
                .with_delay(Duration::from_millis(3000))
                .with_min_show_duration(Duration::from_millis(5000)),
            TaskConfig::new("VIP_PROMO_ACTIVITY", TaskType::Activity)
                .with_priority(8)
                .with_required_page(VIP_PROMO_PAGE)
                .with_delay(Duration::from_millis(5000))
                .with_min_show_duration(Duration::from_millis(8000))
                .with_max_show_count(3),
        ]
    }
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            tasks: Self::demo_tasks(),
        }
    }
}
