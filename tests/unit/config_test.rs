//! Tests for configuration loading and validation

use std::sync::Mutex;

use prometheus_execution_engine::config::{DependencyFailurePolicy, EngineConfig};

// Environment variables are process-global.
static ENV_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_engine_config_validation() {
    assert!(EngineConfig::default().validate().is_ok());
    assert!(EngineConfig::new().with_max_concurrent_tasks(0).validate().is_err());
    assert!(EngineConfig::new().with_priority_levels(0).validate().is_err());
    assert!(EngineConfig::new().with_monitor_interval_ms(0).validate().is_err());
}

#[test]
fn test_engine_config_json_roundtrip() {
    let cfg = EngineConfig::new()
        .with_max_concurrent_tasks(4)
        .with_dependency_failure(DependencyFailurePolicy::CancelDependents);
    let json = serde_json::to_string(&cfg).unwrap();
    assert_eq!(EngineConfig::from_json_str(&json).unwrap(), cfg);
}

#[test]
fn test_engine_config_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("ENGINE_MAX_CONCURRENT_TASKS", "6");
    std::env::set_var("ENGINE_TASK_TIMEOUT_MS", "1500");
    let cfg = EngineConfig::from_env().unwrap();
    std::env::remove_var("ENGINE_MAX_CONCURRENT_TASKS");
    std::env::remove_var("ENGINE_TASK_TIMEOUT_MS");

    assert_eq!(cfg.max_concurrent_tasks, 6);
    assert_eq!(cfg.task_timeout_ms, 1500);
    assert_eq!(cfg.retry_attempts, 3);
}

#[test]
fn test_engine_config_from_env_rejects_garbage() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::set_var("ENGINE_RETRY_ATTEMPTS", "many");
    let err = EngineConfig::from_env().unwrap_err();
    std::env::remove_var("ENGINE_RETRY_ATTEMPTS");

    assert!(err.to_string().contains("ENGINE_RETRY_ATTEMPTS"));
}
