//! API-facing request/response models.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::core::{ResourceSnapshot, Strategy, TaskId};

/// Per-run submission options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
    /// Priority overrides keyed by task id.
    pub priorities: HashMap<TaskId, u32>,
    /// Dependencies keyed by task id.
    pub dependencies: HashMap<TaskId, Vec<TaskId>>,
    /// Admission strategy name (`priority`, `resource-optimal`, `balanced`).
    pub strategy: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            priorities: HashMap::new(),
            dependencies: HashMap::new(),
            strategy: Strategy::default().as_str().to_string(),
        }
    }
}

impl RunOptions {
    /// Options with the default strategy and no overrides.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the strategy by name. Unknown names are rejected at submission.
    #[must_use]
    pub fn with_strategy(mut self, strategy: impl Into<String>) -> Self {
        self.strategy = strategy.into();
        self
    }

    /// Override one task's priority.
    #[must_use]
    pub fn with_priority(mut self, task: impl Into<TaskId>, priority: u32) -> Self {
        self.priorities.insert(task.into(), priority);
        self
    }

    /// Declare that `task` depends on `on`.
    #[must_use]
    pub fn with_dependency(mut self, task: impl Into<TaskId>, on: impl Into<TaskId>) -> Self {
        self.dependencies.entry(task.into()).or_default().push(on.into());
        self
    }
}

/// Non-blocking status view of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Whether a run is admitting work.
    pub active: bool,
    /// Current or last run id.
    pub run_id: Option<String>,
    /// Tasks in the pending queue.
    pub queued_count: usize,
    /// Tasks running.
    pub in_flight_count: usize,
    /// Tasks in a terminal status.
    pub terminal_count: usize,
    /// Latest resource snapshot.
    pub resource_snapshot: ResourceSnapshot,
}
