//! Scenario replay
//!
//! A scenario is a TOML file of `[[step]]` entries, each naming an `action`.
//! Steps drive the page tracker and task manager the way a host application
//! would, against a [`RecordingUi`] that logs what would appear on screen.
//!
//! ```toml
//! [[step]]
//! action = "resume"
//! page = "MainActivity"
//!
//! [[step]]
//! action = "add"
//! task_id = "USER_SURVEY_DIALOG"
//!
//! [[step]]
//! action = "wait"
//! ms = 6000
//!
//! [[step]]
//! action = "finish"
//! task_id = "USER_SURVEY_DIALOG"
//! ```

use crate::page::PageRef;
use crate::ui::{RecordingUi, UiCall};
use crate::{DialogTaskSystem, SystemStatus, TaskConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One host-side event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// A new instance of `page` comes to the foreground
    Resume { page: String },
    /// The latest instance of `page` goes to the background
    Pause { page: String },
    Destroy { page: String },
    Fragment { page: String },
    ClearFragment,
    Add { task_id: String },
    /// The user closes the task's UI
    Finish {
        task_id: String,
        #[serde(default)]
        delay_ms: Option<u64>,
    },
    Wait { ms: u64 },
    Clear,
    /// Replace the registered configs
    Refresh {
        #[serde(default)]
        tasks: Vec<TaskConfig>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ScenarioReport {
    pub steps_run: usize,
    pub ui_calls: Vec<String>,
    pub status: SystemStatus,
}

impl Scenario {
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse scenario")
    }
}

/// Replays scenario steps against a running system
pub struct ScenarioRunner<'a> {
    system: &'a DialogTaskSystem,
    ui: Arc<RecordingUi>,
    /// Latest live instance per page name
    pages: HashMap<String, PageRef>,
}

impl<'a> ScenarioRunner<'a> {
    pub fn new(system: &'a DialogTaskSystem, ui: Arc<RecordingUi>) -> Self {
        Self {
            system,
            ui,
            pages: HashMap::new(),
        }
    }

    pub async fn run(&mut self, scenario: &Scenario) -> Result<ScenarioReport> {
        for (i, step) in scenario.steps.iter().enumerate() {
            info!("Step {}: {:?}", i + 1, step);
            self.apply(step)
                .await
                .with_context(|| format!("Scenario step {} failed", i + 1))?;
        }

        let status = self.system.get_system_status().await?;
        Ok(ScenarioReport {
            steps_run: scenario.steps.len(),
            ui_calls: self.ui.calls().iter().map(describe_call).collect(),
            status,
        })
    }

    async fn apply(&mut self, step: &Step) -> Result<()> {
        let tracker = self.system.page_tracker()?;
        let manager = self.system.task_manager()?;

        match step {
            Step::Resume { page } => {
                let page_ref = PageRef::new(page.as_str());
                self.pages.insert(page.clone(), page_ref.clone());
                tracker.on_page_resumed(page_ref);
            }
            Step::Pause { page } => match self.pages.get(page) {
                Some(page_ref) => tracker.on_page_paused(page_ref),
                None => warn!("Pause for page {} that never resumed", page),
            },
            Step::Destroy { page } => match self.pages.remove(page) {
                Some(page_ref) => tracker.on_page_destroyed(&page_ref),
                None => warn!("Destroy for page {} that never resumed", page),
            },
            Step::Fragment { page } => {
                tracker.set_current_fragment(PageRef::new(page.as_str()));
            }
            Step::ClearFragment => tracker.clear_current_fragment(),
            Step::Add { task_id } => {
                manager.add_task_by_id(task_id, self.ui.clone())?;
            }
            Step::Finish { task_id, delay_ms } => {
                self.ui.close_dialog(task_id);
                match delay_ms {
                    Some(ms) => {
                        manager.on_task_finished_with_delay(task_id, Duration::from_millis(*ms))?
                    }
                    None => manager.on_task_finished(task_id)?,
                }
            }
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Clear => manager.clear()?,
            Step::Refresh { tasks } => {
                let removed = self.system.update_task_configs(tasks)?;
                if !removed.is_empty() {
                    info!("Refresh removed tasks: {:?}", removed);
                }
            }
        }

        // Returns once the scheduler has processed this step
        manager.snapshot().await?;
        Ok(())
    }
}

fn describe_call(call: &UiCall) -> String {
    match call {
        UiCall::DialogCreated { task_id, .. } => format!("create dialog {}", task_id),
        UiCall::DialogShown { task_id, .. } => format!("show dialog {}", task_id),
        UiCall::DialogDismissed { task_id, .. } => format!("dismiss dialog {}", task_id),
        UiCall::DialogClosedByUser { task_id, .. } => format!("user closed dialog {}", task_id),
        UiCall::ScreenStarted { intent, .. } => format!("start screen {}", intent.task_id),
    }
}
