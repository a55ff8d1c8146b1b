//! Configuration discovery and loading
//!
//! Discovery hierarchy:
//! 1. Explicit `--config` path
//! 2. Current directory: ./taskgate.toml or ./.taskgate/config.toml
//! 3. User config: ~/.taskgate/config.toml
//! 4. Built-in defaults

use crate::{SystemConfig, env};
use anyhow::{Context, Result};
use std::env as std_env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    BuiltIn,
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the override if given, else the first config file found, else defaults
    pub fn load(config_override: Option<&Path>) -> Result<(SystemConfig, ConfigSource)> {
        if let Some(path) = config_override {
            info!("Loading configuration override from: {:?}", path);
            let config = SystemConfig::from_toml_file(path)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            return Ok((config, ConfigSource::File(path.to_path_buf())));
        }

        Self::discover_config()
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<(SystemConfig, ConfigSource)> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            let config = SystemConfig::from_toml_file(&config_path)
                .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
            return Ok((config, ConfigSource::File(config_path)));
        }

        info!("No configuration file found, using defaults");
        Ok((SystemConfig::default(), ConfigSource::BuiltIn))
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(Self::get_config_candidates())
    }

    fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    pub fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std_env::current_dir().ok();
        let home_dir = Self::get_home_dir();
        Self::candidates_for(current_dir.as_deref(), home_dir.as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(env::project_config_file_path(current_dir));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        candidates
    }

    /// Get home directory path
    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Show configuration discovery information
    pub fn show_discovery_info(config_override: Option<&Path>) -> Result<()> {
        println!("Configuration Discovery Hierarchy:");
        println!();

        if let Some(path) = config_override {
            println!("  0. {:?} - --config override", path);
        }

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "EXISTS"
                } else {
                    "NOT A FILE"
                }
            } else {
                "NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        let (config, source) = Self::load(config_override)?;

        println!();
        match &source {
            ConfigSource::File(path) => println!("Active configuration: {:?}", path),
            ConfigSource::BuiltIn => println!("Active configuration: Built-in defaults"),
        }
        println!();
        print!("{}", config.to_toml_string()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_candidates_order() {
        let candidates = ConfigDiscovery::candidates_for(
            Some(Path::new("/project")),
            Some(Path::new("/home/user")),
        );

        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/project/taskgate.toml"),
                PathBuf::from("/project/.taskgate/config.toml"),
                PathBuf::from("/home/user/.taskgate/config.toml"),
            ]
        );
    }

    #[test]
    fn test_first_existing_prefers_project_file() {
        let temp_dir = TempDir::new().unwrap();
        let project = temp_dir.path();
        fs::create_dir_all(project.join(".taskgate")).unwrap();
        fs::write(project.join(".taskgate/config.toml"), "").unwrap();

        let candidates = ConfigDiscovery::candidates_for(Some(project), None);
        assert_eq!(
            ConfigDiscovery::first_existing(candidates.clone()),
            Some(project.join(".taskgate/config.toml"))
        );

        fs::write(project.join("taskgate.toml"), "").unwrap();
        assert_eq!(
            ConfigDiscovery::first_existing(candidates),
            Some(project.join("taskgate.toml"))
        );
    }

    #[test]
    fn test_load_override() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(
            &config_path,
            r#"
[scheduler]
task_timeout_ms = 1000

[[task]]
task_id = "ONLY"
priority = 3
"#,
        )
        .unwrap();

        let (config, source) = ConfigDiscovery::load(Some(&config_path)).unwrap();
        assert_eq!(source, ConfigSource::File(config_path));
        assert_eq!(config.tasks.len(), 1);
        assert_eq!(config.tasks[0].task_id, "ONLY");
        assert_eq!(config.scheduler.task_timeout.as_millis(), 1000);
    }

    #[test]
    fn test_load_override_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert!(ConfigDiscovery::load(Some(&missing)).is_err());
    }
}
