//! Tests for error types

use prometheus_execution_engine::core::{SchedulerError, TaskError};

#[test]
fn test_unknown_strategy_error() {
    let err = SchedulerError::UnknownStrategy("fastest".to_string());
    assert_eq!(format!("{}", err), "unknown scheduling strategy: fastest");
}

#[test]
fn test_unknown_dependency_error() {
    let err = SchedulerError::UnknownDependency {
        task: "b".into(),
        dependency: "a".into(),
    };
    assert_eq!(format!("{}", err), "task b depends on unknown task a");
}

#[test]
fn test_context_mismatch_error() {
    let err = SchedulerError::ContextMismatch { units: 3, contexts: 2 };
    assert_eq!(format!("{}", err), "expected 3 contexts, got 2");
}

#[test]
fn test_run_in_progress_error() {
    let err = SchedulerError::RunInProgress("run-1".into());
    assert_eq!(format!("{}", err), "run run-1 is already in progress");
}

#[test]
fn test_task_timeout_message() {
    assert_eq!(TaskError::Timeout.to_string(), "Task timeout");
    assert!(TaskError::Timeout.is_timeout());
    assert!(!TaskError::failed("x").is_timeout());
}

#[test]
fn test_task_failure_message_is_verbatim() {
    assert_eq!(TaskError::failed("disk full").to_string(), "disk full");
}
