//! Error types for engine and task operations.

use thiserror::Error;

use super::task::TaskId;

/// Errors produced when submitting or driving a run.
///
/// Every variant except `Internal` is raised before any task starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// Strategy name did not match any known admission strategy.
    #[error("unknown scheduling strategy: {0}")]
    UnknownStrategy(String),
    /// Engine configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Two work units reported the same id.
    #[error("duplicate task id: {0}")]
    DuplicateTask(TaskId),
    /// A dependency names a task that is not part of the run.
    #[error("task {task} depends on unknown task {dependency}")]
    UnknownDependency {
        /// Task declaring the dependency.
        task: TaskId,
        /// Missing dependency id.
        dependency: TaskId,
    },
    /// Work units and contexts were not paired one to one.
    #[error("expected {units} contexts, got {contexts}")]
    ContextMismatch {
        /// Number of work units submitted.
        units: usize,
        /// Number of contexts submitted.
        contexts: usize,
    },
    /// Another run is still in progress on this engine.
    #[error("run {0} is already in progress")]
    RunInProgress(String),
    /// The engine has been shut down.
    #[error("engine has been shut down")]
    ShutDown,
    /// No async runtime was available to drive the engine.
    #[error("runtime unavailable: {0}")]
    Runtime(String),
    /// Unexpected failure inside the scheduler loop.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Failure of a single task attempt.
///
/// Attempts are retried up to the configured budget; callers only see the
/// last error of a task that exhausted it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The work unit rejected.
    #[error("{0}")]
    Failed(String),
    /// The attempt exceeded the per-task timeout.
    #[error("Task timeout")]
    Timeout,
    /// The work unit panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    /// Convenience constructor for work-unit failures.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Whether this error was produced by the timeout race.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
