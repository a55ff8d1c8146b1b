//! Command line argument parsing
//!
//! Subcommands:
//! - `run`: Replay a lifecycle scenario against the scheduler
//! - `validate`: Parse a task config file and list its tasks
//! - `show-config`: Show configuration discovery information

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Run(RunConfig),
    Validate(ValidateConfig),
    ShowConfig { config_override: Option<PathBuf> },
}

#[derive(Debug)]
pub struct RunConfig {
    pub scenario: PathBuf,
    pub config_override: Option<PathBuf>,
    pub verbose: bool,
}

#[derive(Debug)]
pub struct ValidateConfig {
    pub file: PathBuf,
    pub verbose: bool,
}

#[derive(Debug, Parser)]
#[command(name = "taskgate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Priority scheduler for page-gated dialogs and screens")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a scenario file against the scheduler
    Run {
        /// Path to the scenario (TOML with [[step]] entries)
        scenario: PathBuf,
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
        /// Enable verbose output
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Parse a task config file (TOML or JSON) and list its tasks
    Validate {
        /// Path to the config file
        file: PathBuf,
        /// Print every field of each task
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// Show configuration discovery information
    ShowConfig {
        /// Configuration file path
        #[arg(short = 'c', long = "config")]
        config: Option<PathBuf>,
    },
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Run {
                scenario,
                config,
                verbose,
            }) => Ok(ExecutionMode::Run(RunConfig {
                scenario: scenario.clone(),
                config_override: config.clone(),
                verbose: *verbose,
            })),
            Some(Commands::Validate { file, verbose }) => {
                Ok(ExecutionMode::Validate(ValidateConfig {
                    file: file.clone(),
                    verbose: *verbose,
                }))
            }
            Some(Commands::ShowConfig { config }) => Ok(ExecutionMode::ShowConfig {
                config_override: config.clone(),
            }),
            None => Err(
                "No command specified. Use 'taskgate --help' to see available commands."
                    .to_string(),
            ),
        }
    }

    pub fn verbose(&self) -> bool {
        matches!(
            &self.command,
            Some(Commands::Run { verbose: true, .. }) | Some(Commands::Validate { verbose: true, .. })
        )
    }
}
