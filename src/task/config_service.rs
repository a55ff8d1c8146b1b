use crate::task::factory::TaskFactory;
use crate::task::types::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::info;

/// A list of task configs as it appears in config files and refresh payloads
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TaskConfigSet {
    #[serde(default, rename = "task")]
    pub tasks: Vec<TaskConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonPayload {
    List(Vec<TaskConfig>),
    Wrapped { tasks: Vec<TaskConfig> },
}

impl TaskConfigSet {
    pub fn new(tasks: Vec<TaskConfig>) -> Self {
        Self { tasks }
    }

    /// Parse `[[task]]` tables from TOML
    pub fn from_toml_str(content: &str) -> Result<Self, SchedulerError> {
        let set: TaskConfigSet =
            toml::from_str(content).map_err(|e| SchedulerError::ConfigParse(e.to_string()))?;
        set.validate()?;
        Ok(set)
    }

    /// Parse a JSON array of configs, or an object with a `tasks` array
    pub fn from_json_str(content: &str) -> Result<Self, SchedulerError> {
        let payload: JsonPayload = serde_json::from_str(content)
            .map_err(|e| SchedulerError::ConfigParse(e.to_string()))?;
        let tasks = match payload {
            JsonPayload::List(tasks) => tasks,
            JsonPayload::Wrapped { tasks } => tasks,
        };
        let set = Self { tasks };
        set.validate()?;
        Ok(set)
    }

    /// Load from a file, picking the format from the extension (TOML by default)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SchedulerError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            SchedulerError::ConfigParse(format!("cannot read {}: {}", path.display(), e))
        })?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&content),
            _ => Self::from_toml_str(&content),
        }
    }

    /// Reject empty and duplicate task ids
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let mut seen = HashSet::new();
        for config in &self.tasks {
            config.validate()?;
            if !seen.insert(config.task_id.as_str()) {
                return Err(SchedulerError::InvalidConfig(format!(
                    "duplicate task_id {}",
                    config.task_id
                )));
            }
        }
        Ok(())
    }
}

/// Replace the registered configs with `new_configs`.
///
/// Every supplied config is registered or updated, then every previously
/// registered config whose id is absent from the new list is removed.
/// Returns the removed task ids.
pub fn update_task_configs(factory: &TaskFactory, new_configs: &[TaskConfig]) -> Vec<TaskId> {
    for config in new_configs {
        factory.register_or_update_config(config.clone());
    }

    let keep: HashSet<&str> = new_configs.iter().map(|c| c.task_id.as_str()).collect();
    let mut removed: Vec<TaskId> = factory
        .task_ids()
        .into_iter()
        .filter(|task_id| !keep.contains(task_id.as_str()))
        .collect();
    removed.sort();

    for task_id in &removed {
        factory.remove_config(task_id);
    }

    info!(
        "Updated task configs: {} registered, {} removed",
        new_configs.len(),
        removed.len()
    );
    removed
}
