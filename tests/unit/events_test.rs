//! Tests for event sinks and serialization

use prometheus_execution_engine::core::{EngineEvent, EventSink, InMemoryEventSink};

fn completed(task: &str) -> EngineEvent {
    EngineEvent::TaskCompleted {
        run_id: "run-1".into(),
        task_id: task.into(),
        duration_ms: 12,
    }
}

#[test]
fn test_in_memory_event_sink() {
    let sink = InMemoryEventSink::new(10);
    sink.record(&completed("a"));
    assert_eq!(sink.events().len(), 1);
    assert_eq!(sink.events()[0].task_id(), Some("a"));
    assert_eq!(sink.names(), vec!["task-completed"]);
}

#[test]
fn test_event_sink_overflow() {
    let sink = InMemoryEventSink::new(2);
    for task in ["a", "b", "c"] {
        sink.record(&completed(task));
    }
    let ids: Vec<_> = sink
        .events()
        .iter()
        .filter_map(|e| e.task_id().map(str::to_string))
        .collect();
    assert_eq!(ids, vec!["b", "c"]);
}

#[test]
fn test_event_serializes_with_kebab_case_tag() {
    let json = serde_json::to_value(completed("a")).unwrap();
    assert_eq!(json["type"], "task-completed");
    assert_eq!(json["task_id"], "a");

    let started = EngineEvent::RunStarted {
        run_id: "run-1".into(),
        total_tasks: 3,
        strategy: "balanced".into(),
    };
    assert_eq!(serde_json::to_value(started).unwrap()["type"], "run-started");
}
