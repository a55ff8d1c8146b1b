//! CLI-specific functionality for taskgate
//!
//! This module contains argument parsing, configuration discovery and the
//! scenario runner used by the `taskgate` binary.

pub mod args;
pub mod config;
pub mod scenario;

pub use args::{Args, ExecutionMode, RunConfig, ValidateConfig};
pub use config::{ConfigDiscovery, ConfigSource};
pub use scenario::{Scenario, ScenarioReport, ScenarioRunner, Step};
