/*!
 * Tests for app configuration loading and validation
 */

use std::time::Duration;

use dualsub::app_config::{Config, LogLevel, TranslationProvider};
use dualsub::translation::SchedulerConfig;

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_loadOrCreate_withPartialFile_shouldKeepDefaultsForTheRest() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "target_language": "ja",
            "scheduler": {"batch_size": 6, "start_paused": false},
            "merge": {"max_gap_ms": 5000},
            "log_level": "debug"
        }"#,
    )
    .unwrap();

    let config = Config::load_or_create(&path).unwrap();

    assert_eq!(config.target_language, "ja");
    assert_eq!(config.scheduler.batch_size, 6);
    assert!(!config.scheduler.start_paused);
    assert_eq!(config.scheduler.max_batch_retries, 10);
    assert_eq!(config.scheduler.batch_interval_ms, 2000);
    assert_eq!(config.merge.max_gap_ms, 5000);
    assert_eq!(config.merge.max_text_length, 150);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert!(config.validate().is_ok());
}

#[test]
fn test_saveThenLoad_shouldPreserveValues() {
    let dir = create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");
    let mut config = Config::default();
    config.target_language = "fr".to_string();
    config.storage.disabled = true;
    config.scheduler.annotate_retries = false;

    config.save(&path).unwrap();
    let loaded = Config::load_or_create(&path).unwrap();

    assert_eq!(loaded.target_language, "fr");
    assert!(loaded.storage.disabled);
    assert!(!loaded.scheduler.annotate_retries);
    assert_eq!(loaded.storage.key_prefix, config.storage.key_prefix);
}

#[test]
fn test_loadOrCreate_withBrokenJson_shouldReportPath() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    let error = Config::load_or_create(&path).unwrap_err();

    assert!(format!("{:#}", error).contains("conf.json"));
}

#[test]
fn test_validate_withZeroRetries_shouldFail() {
    let mut config = Config::default();
    config.scheduler.max_batch_retries = 0;

    assert!(config.validate().is_err());
}

#[test]
fn test_schedulerConfig_fromSettings_shouldConvertDurations() {
    let config = Config::default();
    let scheduler = SchedulerConfig::from_settings(&config.scheduler, "Chinese");

    assert_eq!(scheduler.batch_size, 8);
    assert_eq!(scheduler.max_batch_retries, 10);
    assert_eq!(scheduler.batch_interval, Duration::from_millis(2000));
    assert_eq!(scheduler.retry_delay(1), Duration::from_millis(2000));
    assert!(scheduler.start_paused);
    assert_eq!(scheduler.target_language, "Chinese");
}
