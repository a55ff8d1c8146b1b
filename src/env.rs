//! Environment constants and path utilities for taskgate.
//!
//! Centralizes the file and directory names used for config discovery.

use std::path::{Path, PathBuf};

/// Application directory name (hidden directory like .git, .vscode)
pub const TASKGATE_DIR_NAME: &str = ".taskgate";

/// Configuration file name inside the application directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name when placed directly in a project directory
pub const PROJECT_CONFIG_FILE_NAME: &str = "taskgate.toml";

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "taskgate=info";

/// Log filter used with `--verbose`
pub const VERBOSE_LOG_FILTER: &str = "taskgate=debug";

/// Build the .taskgate directory path from a base directory
pub fn taskgate_dir_path(base: &Path) -> PathBuf {
    base.join(TASKGATE_DIR_NAME)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    taskgate_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build the `.taskgate/config.toml` path in the current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    taskgate_dir_path(current_dir).join(CONFIG_FILE_NAME)
}

/// Build the `taskgate.toml` path in the current directory
pub fn project_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(PROJECT_CONFIG_FILE_NAME)
}
