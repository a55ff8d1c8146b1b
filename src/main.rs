use anyhow::{Context, Result};
use std::sync::Arc;
use taskgate::cli::{
    Args, ConfigDiscovery, ExecutionMode, RunConfig, Scenario, ScenarioRunner, ValidateConfig,
};
use taskgate::env::{DEFAULT_LOG_FILTER, VERBOSE_LOG_FILTER};
use taskgate::{DialogTaskSystem, LoggingEventHandler, RecordingUi, TaskConfigSet};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence
    let default_filter = if args.verbose() {
        VERBOSE_LOG_FILTER
    } else {
        DEFAULT_LOG_FILTER
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let mode = args.mode().map_err(anyhow::Error::msg)?;

    match mode {
        ExecutionMode::Run(config) => run_scenario(config).await,
        ExecutionMode::Validate(config) => validate_config(config),
        ExecutionMode::ShowConfig { config_override } => {
            ConfigDiscovery::show_discovery_info(config_override.as_deref())
        }
    }
}

async fn run_scenario(config: RunConfig) -> Result<()> {
    info!("Running scenario: {:?}", config.scenario);

    let scenario = Scenario::from_toml_file(&config.scenario)?;
    let (system_config, source) = ConfigDiscovery::load(config.config_override.as_deref())?;
    info!("Using configuration: {:?}", source);

    let system = DialogTaskSystem::start(system_config)?;
    system
        .task_manager()?
        .add_event_handler(Box::new(LoggingEventHandler))?;

    let ui = Arc::new(RecordingUi::new("scenario"));
    let report = ScenarioRunner::new(&system, ui).run(&scenario).await;

    system.shutdown().await?;
    let report = report?;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("Failed to serialize scenario report")?
    );
    Ok(())
}

fn validate_config(config: ValidateConfig) -> Result<()> {
    let set = TaskConfigSet::from_file(&config.file)
        .with_context(|| format!("Invalid task config file {}", config.file.display()))?;

    println!("{}: {} tasks", config.file.display(), set.tasks.len());
    for task in &set.tasks {
        if config.verbose {
            println!("  {:#?}", task);
        } else {
            println!(
                "  {} ({:?}, priority {}, max shows {}, page {})",
                task.task_id,
                task.task_type,
                task.priority,
                task.max_show_count,
                task.required_page
                    .as_ref()
                    .map(|page| page.as_str())
                    .unwrap_or("any")
            );
        }
    }
    Ok(())
}
