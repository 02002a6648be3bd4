//! Task descriptors and per-task run state.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::TaskError;
use super::executor::WorkUnit;

/// Unique task identifier, supplied by the work unit.
pub type TaskId = String;

/// Priority given to work units that do not override it.
pub const DEFAULT_PRIORITY: u32 = 3;

/// Lowest priority a task can decay to.
pub const MIN_PRIORITY: u32 = 1;

/// Lifecycle status of a task within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting for readiness and capacity.
    Pending,
    /// Dispatched to its work unit.
    Running,
    /// Finished successfully.
    Completed,
    /// Exhausted its retry budget.
    Failed,
    /// Removed from the queue by cancellation.
    Cancelled,
}

impl TaskStatus {
    /// Terminal statuses never change again within a run.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Scheduling hints a work unit reports about itself.
///
/// Estimates only feed the admission scorer; they are never enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskProfile {
    /// Base priority (higher runs first).
    pub priority: u32,
    /// Estimated runtime in milliseconds.
    pub estimated_duration_ms: u64,
    /// Estimated memory footprint in megabytes.
    pub estimated_memory_mb: u64,
}

impl Default for TaskProfile {
    fn default() -> Self {
        Self {
            priority: DEFAULT_PRIORITY,
            estimated_duration_ms: 1000,
            estimated_memory_mb: 100,
        }
    }
}

/// Immutable description of a task plus its mutable priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Unique task identifier.
    pub id: TaskId,
    /// Current priority; decays by one on every retry.
    pub priority: u32,
    /// Estimated runtime in milliseconds.
    pub estimated_duration_ms: u64,
    /// Estimated memory footprint in megabytes.
    pub estimated_memory_mb: u64,
    /// Ids that must complete before this task may run.
    pub dependencies: Vec<TaskId>,
    /// Position in the original submission, used as a deterministic tie-break.
    pub submission_index: usize,
}

impl TaskMetadata {
    /// Build metadata from a profile.
    pub fn new(id: impl Into<TaskId>, profile: TaskProfile, submission_index: usize) -> Self {
        Self {
            id: id.into(),
            priority: profile.priority,
            estimated_duration_ms: profile.estimated_duration_ms,
            estimated_memory_mb: profile.estimated_memory_mb,
            dependencies: Vec::new(),
            submission_index,
        }
    }

    /// Attach dependency ids.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: Vec<TaskId>) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Override the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }
}

/// What happened to a task after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Back to pending with decayed priority.
    Retry,
    /// Budget exhausted; the task is now failed.
    Exhausted,
}

/// A task owned by a run: descriptor, work unit, context and run state.
pub struct Task<C, R> {
    /// Scheduling metadata.
    pub meta: TaskMetadata,
    unit: Arc<dyn WorkUnit<C, R>>,
    context: Arc<C>,
    /// Lifecycle status.
    pub status: TaskStatus,
    /// Number of failed attempts so far.
    pub retry_count: u32,
    /// Start of the current (or last) attempt, in run-clock milliseconds.
    pub started_at_ms: Option<u128>,
    /// Run-clock time the task reached a terminal status.
    pub ended_at_ms: Option<u128>,
    /// Output of the successful attempt.
    pub result: Option<R>,
    /// Error of the last failed attempt once the budget is exhausted.
    pub error: Option<TaskError>,
}

impl<C, R> Task<C, R> {
    /// Create a pending task.
    pub fn new(meta: TaskMetadata, unit: Arc<dyn WorkUnit<C, R>>, context: Arc<C>) -> Self {
        Self {
            meta,
            unit,
            context,
            status: TaskStatus::Pending,
            retry_count: 0,
            started_at_ms: None,
            ended_at_ms: None,
            result: None,
            error: None,
        }
    }

    /// Task id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    /// Work unit shared with the caller.
    #[must_use]
    pub fn unit(&self) -> Arc<dyn WorkUnit<C, R>> {
        Arc::clone(&self.unit)
    }

    /// Context reused on every attempt.
    #[must_use]
    pub fn context(&self) -> Arc<C> {
        Arc::clone(&self.context)
    }

    /// Attempt number the next (or current) dispatch represents, starting at 1.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.retry_count + 1
    }

    /// Transition pending -> running.
    pub fn mark_running(&mut self, now_ms: u128) {
        self.status = TaskStatus::Running;
        self.started_at_ms = Some(now_ms);
    }

    /// Transition running -> completed.
    pub fn complete(&mut self, result: R, now_ms: u128) {
        self.status = TaskStatus::Completed;
        self.result = Some(result);
        self.error = None;
        self.ended_at_ms = Some(now_ms);
    }

    /// Record a failed attempt.
    ///
    /// With `allow_retry` and budget left the task returns to pending with its
    /// priority decayed by one (never below [`MIN_PRIORITY`]) and its start
    /// time cleared. Otherwise it becomes failed and keeps `error`.
    pub fn fail_attempt(
        &mut self,
        error: TaskError,
        max_retries: u32,
        allow_retry: bool,
        now_ms: u128,
    ) -> AttemptOutcome {
        self.retry_count += 1;
        if allow_retry && self.retry_count <= max_retries {
            self.status = TaskStatus::Pending;
            self.meta.priority = self.meta.priority.saturating_sub(1).max(MIN_PRIORITY);
            self.started_at_ms = None;
            return AttemptOutcome::Retry;
        }
        self.status = TaskStatus::Failed;
        self.error = Some(error);
        self.ended_at_ms = Some(now_ms);
        AttemptOutcome::Exhausted
    }

    /// Transition pending -> cancelled.
    pub fn cancel(&mut self, now_ms: u128) {
        self.status = TaskStatus::Cancelled;
        self.ended_at_ms = Some(now_ms);
    }

    /// Duration of the final attempt, when both ends are known.
    #[must_use]
    pub fn latency_ms(&self) -> Option<u128> {
        match (self.started_at_ms, self.ended_at_ms) {
            (Some(start), Some(end)) => Some(crate::util::clock::elapsed_ms(start, end)),
            _ => None,
        }
    }
}

impl<C, R> fmt::Debug for Task<C, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("meta", &self.meta)
            .field("status", &self.status)
            .field("retry_count", &self.retry_count)
            .field("started_at_ms", &self.started_at_ms)
            .field("ended_at_ms", &self.ended_at_ms)
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}
