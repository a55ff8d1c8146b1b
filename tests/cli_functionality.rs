//! Integration tests for CLI functionality
//!
//! These tests drive the scenario runner with files on disk, the way the
//! `taskgate run` command does. Unit tests for argument parsing and discovery
//! are located in the respective module files.

use std::fs;
use std::sync::Arc;
use taskgate::cli::{ConfigDiscovery, ConfigSource, Scenario, ScenarioRunner};
use taskgate::{DialogTaskSystem, RecordingUi, SystemConfig};
use tempfile::TempDir;

#[tokio::test(start_paused = true)]
async fn test_demo_scenario_from_files() {
    let temp_dir = TempDir::new().unwrap();

    let scenario_path = temp_dir.path().join("demo.toml");
    fs::write(
        &scenario_path,
        r#"
[[step]]
action = "resume"
page = "ProfileActivity"

[[step]]
action = "fragment"
page = "ProfileFragment"

[[step]]
action = "add"
task_id = "VIP_PROMO_ACTIVITY"

[[step]]
action = "wait"
ms = 9000

[[step]]
action = "finish"
task_id = "VIP_PROMO_ACTIVITY"

[[step]]
action = "clear_fragment"

[[step]]
action = "resume"
page = "MainActivity"

[[step]]
action = "add"
task_id = "USER_SURVEY_DIALOG"

[[step]]
action = "wait"
ms = 6000

[[step]]
action = "finish"
task_id = "USER_SURVEY_DIALOG"
"#,
    )
    .unwrap();

    let scenario = Scenario::from_toml_file(&scenario_path).unwrap();
    let system = DialogTaskSystem::start(SystemConfig::default()).unwrap();
    let ui = Arc::new(RecordingUi::new("scenario"));
    let report = ScenarioRunner::new(&system, ui.clone())
        .run(&scenario)
        .await
        .unwrap();

    assert_eq!(report.steps_run, 10);
    assert!(report.status.scheduler.current.is_none());
    assert_eq!(ui.screens_started("VIP_PROMO_ACTIVITY"), 1);
    assert_eq!(ui.dialogs_shown("USER_SURVEY_DIALOG"), 1);

    let intent = ui.last_intent("VIP_PROMO_ACTIVITY").unwrap();
    assert!(intent.new_task);

    for task in &report.status.registered_tasks {
        assert_eq!(task.show_count, 1, "{} should be shown once", task.task_id);
    }

    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("start screen VIP_PROMO_ACTIVITY"));

    system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_refresh_step_removes_tasks() {
    let temp_dir = TempDir::new().unwrap();

    let config_path = temp_dir.path().join("taskgate.toml");
    fs::write(
        &config_path,
        r#"
[[task]]
task_id = "KEEP"
delay_ms = 0
min_show_duration_ms = 0

[[task]]
task_id = "DROP"
delay_ms = 0
min_show_duration_ms = 0
"#,
    )
    .unwrap();

    let scenario = Scenario::from_toml_str(
        r#"
[[step]]
action = "refresh"

[[step.tasks]]
task_id = "KEEP"
priority = 7
delay_ms = 0
min_show_duration_ms = 0

[[step]]
action = "add"
task_id = "DROP"

[[step]]
action = "add"
task_id = "KEEP"
"#,
    )
    .unwrap();

    let (config, source) = ConfigDiscovery::load(Some(&config_path)).unwrap();
    assert_eq!(source, ConfigSource::File(config_path.clone()));
    assert_eq!(config.tasks.len(), 2);

    let system = DialogTaskSystem::start(config).unwrap();
    let ui = Arc::new(RecordingUi::new("scenario"));
    let report = ScenarioRunner::new(&system, ui.clone())
        .run(&scenario)
        .await
        .unwrap();

    assert_eq!(report.status.registered_tasks.len(), 1);
    assert_eq!(report.status.registered_tasks[0].task_id, "KEEP");
    assert_eq!(report.status.registered_tasks[0].priority, 7);
    assert_eq!(ui.dialogs_shown("DROP"), 0);
    assert_eq!(ui.dialogs_shown("KEEP"), 1);

    system.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_scenario_step_reports_error() {
    let system = DialogTaskSystem::new(SystemConfig::default());
    system.init_page_tracker();

    let scenario = Scenario::from_toml_str(
        r#"
[[step]]
action = "add"
task_id = "USER_SURVEY_DIALOG"
"#,
    )
    .unwrap();

    // The manager was never initialized
    let ui = Arc::new(RecordingUi::new("scenario"));
    let result = ScenarioRunner::new(&system, ui).run(&scenario).await;
    let error = format!("{:#}", result.unwrap_err());
    assert!(error.contains("Scenario step 1 failed"));
    assert!(error.contains("not initialized"));
}
