use crate::task::config_service::*;
use crate::task::factory::*;
use crate::task::types::*;
use crate::ui::{IntentValue, RecordingUi, TASK_ID_EXTRA, UiContext};
use std::sync::Arc;
use std::time::Duration;

fn survey_config() -> TaskConfig {
    TaskConfig::new("SURVEY", TaskType::Dialog)
        .with_priority(6)
        .with_required_page("MainActivity")
}

fn promo_config() -> TaskConfig {
    TaskConfig::new("PROMO", TaskType::Activity)
        .with_priority(8)
        .with_max_show_count(3)
        .with_extra("campaign", "spring")
        .with_extra("discount", 20)
        .with_extra("fullscreen", true)
        .with_extra("layout", serde_json::json!({"rows": 2}))
}

fn recording_ui() -> (Arc<RecordingUi>, Arc<dyn UiContext>) {
    let ui = Arc::new(RecordingUi::new("test"));
    let dyn_ui: Arc<dyn UiContext> = ui.clone();
    (ui, dyn_ui)
}

#[test]
fn test_config_defaults() {
    let config = TaskConfig::new("DEFAULTS", TaskType::Dialog);

    assert_eq!(config.priority, DEFAULT_PRIORITY);
    assert_eq!(config.delay, Duration::from_millis(3000));
    assert_eq!(config.min_show_duration, Duration::from_millis(2000));
    assert_eq!(config.max_show_count, 1);
    assert!(config.required_page.is_none());
    assert!(!config.requires_login);
}

#[test]
fn test_register_keeps_show_count() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(survey_config());
    factory.record_task_shown("SURVEY");

    factory.register_or_update_config(survey_config().with_priority(1));

    assert_eq!(factory.show_count("SURVEY"), Some(1));
    assert_eq!(factory.config("SURVEY").unwrap().priority, 1);
}

#[test]
fn test_remove_config_drops_show_count() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(survey_config());
    factory.record_task_shown("SURVEY");

    factory.remove_config("SURVEY");
    assert!(factory.config("SURVEY").is_none());
    assert_eq!(factory.show_count("SURVEY"), None);

    factory.register_or_update_config(survey_config());
    assert_eq!(factory.show_count("SURVEY"), Some(0));
}

#[test]
fn test_record_unknown_task_ignored() {
    let factory = TaskFactory::new();
    factory.record_task_shown("MISSING");
    assert_eq!(factory.show_count("MISSING"), None);
}

#[test]
fn test_create_task_unknown_and_capped() {
    let factory = TaskFactory::new();
    let (_ui, dyn_ui) = recording_ui();

    assert!(factory.create_task("MISSING", dyn_ui.clone()).is_none());

    factory.register_or_update_config(survey_config());
    let task = factory.create_task("SURVEY", dyn_ui.clone()).unwrap();
    assert_eq!(task.task_id, "SURVEY");
    assert_eq!(task.priority, 6);
    assert!(task.start_time.is_none());

    factory.record_task_shown("SURVEY");
    assert!(factory.is_show_limit_reached("SURVEY"));
    assert!(factory.create_task("SURVEY", dyn_ui).is_none());
}

#[test]
fn test_dialog_executor_shows_and_counts() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(survey_config());
    let (ui, dyn_ui) = recording_ui();

    let mut task = factory.create_task("SURVEY", dyn_ui).unwrap();
    task.execute().unwrap();

    assert_eq!(ui.dialogs_shown("SURVEY"), 1);
    assert_eq!(factory.show_count("SURVEY"), Some(1));
    assert!(task.dialog().is_some());
    assert_eq!(ui.showing_dialogs(), vec!["SURVEY".to_string()]);
}

#[test]
fn test_dialog_executor_skips_showing_dialog() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(survey_config().with_max_show_count(5));
    let (ui, dyn_ui) = recording_ui();

    let mut task = factory.create_task("SURVEY", dyn_ui).unwrap();
    task.execute().unwrap();
    task.execute().unwrap();

    assert_eq!(ui.dialogs_shown("SURVEY"), 1);
    assert_eq!(factory.show_count("SURVEY"), Some(1));
}

#[test]
fn test_suppressed_dialog_counting() {
    let (ui, dyn_ui) = recording_ui();
    ui.set_valid(false);

    let counting = TaskFactory::new();
    counting.register_or_update_config(survey_config());
    counting
        .create_task("SURVEY", dyn_ui.clone())
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(counting.show_count("SURVEY"), Some(1));

    let not_counting = TaskFactory::new().with_count_suppressed_dialogs(false);
    not_counting.register_or_update_config(survey_config());
    not_counting
        .create_task("SURVEY", dyn_ui)
        .unwrap()
        .execute()
        .unwrap();
    assert_eq!(not_counting.show_count("SURVEY"), Some(0));

    assert_eq!(ui.dialogs_shown("SURVEY"), 0);
}

#[test]
fn test_dialog_show_failure_counts_and_errors() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(survey_config());
    let (ui, dyn_ui) = recording_ui();
    ui.set_fail_show(true);

    let mut task = factory.create_task("SURVEY", dyn_ui).unwrap();
    assert!(task.execute().is_err());
    assert_eq!(factory.show_count("SURVEY"), Some(1));
    assert_eq!(ui.dialogs_shown("SURVEY"), 0);
}

#[test]
fn test_executor_fails_after_config_removed() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(survey_config());
    factory.register_or_update_config(promo_config());
    let (ui, dyn_ui) = recording_ui();

    let mut dialog_task = factory.create_task("SURVEY", dyn_ui.clone()).unwrap();
    let mut screen_task = factory.create_task("PROMO", dyn_ui).unwrap();
    factory.remove_config("SURVEY");
    factory.remove_config("PROMO");

    assert!(dialog_task.execute().is_err());
    assert!(screen_task.execute().is_err());
    assert!(ui.calls().is_empty());
}

#[test]
fn test_activity_executor_launches_intent() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(promo_config());
    let (ui, dyn_ui) = recording_ui();

    let mut task = factory.create_task("PROMO", dyn_ui).unwrap();
    task.execute().unwrap();

    assert_eq!(ui.screens_started("PROMO"), 1);
    assert_eq!(factory.show_count("PROMO"), Some(1));
    assert!(task.screen().is_some());

    let intent = ui.last_intent("PROMO").unwrap();
    assert!(intent.new_task);
    assert_eq!(
        intent.extra(TASK_ID_EXTRA),
        Some(&IntentValue::Text("PROMO".to_string()))
    );
    assert_eq!(
        intent.extra("campaign"),
        Some(&IntentValue::Text("spring".to_string()))
    );
    assert_eq!(intent.extra("discount"), Some(&IntentValue::Int(20)));
    assert_eq!(intent.extra("fullscreen"), Some(&IntentValue::Bool(true)));
    assert_eq!(intent.extra("layout"), None);

    // Re-running while the screen is bound launches nothing new
    task.execute().unwrap();
    assert_eq!(ui.screens_started("PROMO"), 1);
}

#[test]
fn test_activity_from_screen_context_reuses_stack() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(promo_config());
    let ui = Arc::new(RecordingUi::new("ProfileActivity").as_screen());

    let mut task = factory.create_task("PROMO", ui.clone()).unwrap();
    task.execute().unwrap();

    let intent = ui.last_intent("PROMO").unwrap();
    assert!(!intent.new_task);
    assert_eq!(intent, create_intent_for_task(&promo_config(), false));
    assert_eq!(intent.extras.len(), 4);
}

#[test]
fn test_activity_launch_failure_not_counted() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(promo_config());
    let (ui, dyn_ui) = recording_ui();
    ui.set_fail_launch(true);

    let mut task = factory.create_task("PROMO", dyn_ui).unwrap();
    assert!(task.execute().is_err());
    assert_eq!(factory.show_count("PROMO"), Some(0));
    assert!(task.screen().is_none());
}

#[test]
fn test_parse_toml_config_set() {
    let set = TaskConfigSet::from_toml_str(
        r#"
[[task]]
task_id = "SURVEY"
priority = 6
required_page = "MainActivity"
delay_ms = 3000
min_show_duration_ms = 5000

[[task]]
task_id = "PROMO"
type = "activity"
max_show_count = 3

[task.extra]
campaign = "spring"
discount = 20
"#,
    )
    .unwrap();

    assert_eq!(set.tasks.len(), 2);
    let survey = &set.tasks[0];
    assert_eq!(survey.required_page, Some("MainActivity".into()));
    assert_eq!(survey.min_show_duration, Duration::from_millis(5000));
    assert_eq!(survey.task_type, TaskType::Dialog);

    let promo = &set.tasks[1];
    assert_eq!(promo.task_type, TaskType::Activity);
    assert_eq!(promo.priority, DEFAULT_PRIORITY);
    assert_eq!(promo.max_show_count, 3);
    assert_eq!(promo.extra.get("discount"), Some(&ExtraValue::Int(20)));
}

#[test]
fn test_parse_json_config_set() {
    let list = TaskConfigSet::from_json_str(
        r#"[{"task_id": "A", "priority": 2}, {"task_id": "B", "type": "activity"}]"#,
    )
    .unwrap();
    assert_eq!(list.tasks.len(), 2);
    assert_eq!(list.tasks[1].task_type, TaskType::Activity);

    let wrapped =
        TaskConfigSet::from_json_str(r#"{"tasks": [{"task_id": "C", "delay_ms": 10}]}"#).unwrap();
    assert_eq!(wrapped.tasks[0].delay, Duration::from_millis(10));
}

#[test]
fn test_config_set_rejects_bad_ids() {
    let duplicate = TaskConfigSet::from_json_str(r#"[{"task_id": "A"}, {"task_id": "A"}]"#);
    assert!(matches!(duplicate, Err(SchedulerError::InvalidConfig(_))));

    let empty = TaskConfigSet::from_json_str(r#"[{"priority": 1}]"#);
    assert!(matches!(empty, Err(SchedulerError::InvalidConfig(_))));

    let malformed = TaskConfigSet::from_toml_str("[[task]\n");
    assert!(matches!(malformed, Err(SchedulerError::ConfigParse(_))));
}

#[test]
fn test_update_task_configs_diff() {
    let factory = TaskFactory::new();
    factory.register_or_update_config(survey_config());
    factory.register_or_update_config(promo_config());
    factory.register_or_update_config(TaskConfig::new("OLD", TaskType::Dialog));
    factory.record_task_shown("PROMO");

    let removed = update_task_configs(
        &factory,
        &[
            promo_config().with_priority(1),
            TaskConfig::new("NEW", TaskType::Dialog),
        ],
    );

    assert_eq!(removed, vec!["OLD".to_string(), "SURVEY".to_string()]);
    let mut ids = factory.task_ids();
    ids.sort();
    assert_eq!(ids, vec!["NEW".to_string(), "PROMO".to_string()]);
    assert_eq!(factory.show_count("PROMO"), Some(1));
    assert_eq!(factory.config("PROMO").unwrap().priority, 1);
}
