//! Tests for runtime API models

use prometheus_execution_engine::runtime::RunOptions;

#[test]
fn test_run_options_from_json() {
    let opts: RunOptions = serde_json::from_str(
        r#"{
            "strategy": "priority",
            "priorities": { "weather": 5 },
            "dependencies": { "population": ["economy", "weather"] }
        }"#,
    )
    .unwrap();
    assert_eq!(opts.strategy, "priority");
    assert_eq!(opts.priorities["weather"], 5);
    assert_eq!(opts.dependencies["population"].len(), 2);
}

#[test]
fn test_run_options_defaults() {
    let opts = RunOptions::new();
    assert_eq!(opts.strategy, "balanced");
    assert!(opts.priorities.is_empty());
    assert!(opts.dependencies.is_empty());
}
