//! Tests for engine builders

use prometheus_execution_engine::builders::EngineBuilder;
use prometheus_execution_engine::config::EngineConfig;
use prometheus_execution_engine::core::SchedulerError;

#[tokio::test]
async fn test_engine_builder_defaults() {
    let engine = EngineBuilder::<u32, u32>::new(EngineConfig::default())
        .with_tracing_events()
        .build()
        .unwrap();
    assert_eq!(engine.config().max_concurrent_tasks, 8);
    assert!(!engine.status().active);
    assert!(!engine.monitor().is_stopped());
}

#[test]
fn test_engine_builder_requires_runtime() {
    let built = EngineBuilder::<u32, u32>::new(EngineConfig::default()).build();
    assert!(matches!(built, Err(SchedulerError::Runtime(_))));
}
