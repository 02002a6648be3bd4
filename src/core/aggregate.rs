//! Final run report.
//!
//! Aggregation is a pure fold over the terminal map. Tasks left pending are
//! listed as blocked but do not count towards `total_tasks`, so
//! `completed + failed == total` holds for every run that was not cancelled.
//! Every ratio with a zero denominator is reported as `0.0`.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::task::{Task, TaskId, TaskStatus};

/// Derived run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RunStatistics {
    /// Mean duration of the successful attempt over completed tasks.
    pub average_latency_ms: f64,
    /// Completed tasks per second of wall-clock time.
    pub throughput_per_sec: f64,
    /// `completed / total`.
    pub resource_efficiency: f64,
}

/// Terminal summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult<R> {
    /// Run identifier.
    pub run_id: String,
    /// Admission strategy used.
    pub strategy: String,
    /// Tasks submitted, including blocked ones.
    pub submitted_tasks: usize,
    /// Tasks that reached a terminal status.
    pub total_tasks: usize,
    /// Tasks that completed.
    pub completed_tasks: usize,
    /// Tasks that exhausted their retries.
    pub failed_tasks: usize,
    /// Tasks cancelled before dispatch.
    pub cancelled_tasks: usize,
    /// Tasks left pending because a dependency never completed.
    pub blocked: Vec<TaskId>,
    /// Wall-clock duration of the run.
    pub execution_time_ms: u128,
    /// Results of completed tasks.
    pub results: BTreeMap<TaskId, R>,
    /// Final error of failed tasks.
    pub errors: BTreeMap<TaskId, String>,
    /// Final status of every task.
    pub statuses: BTreeMap<TaskId, TaskStatus>,
    /// Attempts made per dispatched task.
    pub attempts: BTreeMap<TaskId, u32>,
    /// Derived statistics.
    pub statistics: RunStatistics,
}

impl<R> RunResult<R> {
    /// Whether every submitted task completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.completed_tasks == self.submitted_tasks
    }

    /// Final status of a task.
    #[must_use]
    pub fn status_of(&self, task: &str) -> Option<TaskStatus> {
        self.statuses.get(task).copied()
    }
}

/// Fold terminal and leftover tasks into a report.
#[allow(clippy::cast_precision_loss)]
pub fn aggregate<'a, C, R, I>(
    run_id: &str,
    strategy: &str,
    terminal: &HashMap<TaskId, Task<C, R>>,
    leftover: I,
    execution_time_ms: u128,
) -> RunResult<R>
where
    R: Clone + 'a,
    C: 'a,
    I: IntoIterator<Item = &'a Task<C, R>>,
{
    let mut results = BTreeMap::new();
    let mut errors = BTreeMap::new();
    let mut statuses = BTreeMap::new();
    let mut attempts = BTreeMap::new();
    let mut blocked = Vec::new();
    let mut completed = 0usize;
    let mut failed = 0usize;
    let mut cancelled = 0usize;
    let mut latency_total: u128 = 0;

    for task in terminal.values() {
        statuses.insert(task.meta.id.clone(), task.status);
        match task.status {
            TaskStatus::Completed => {
                completed += 1;
                latency_total += task.latency_ms().unwrap_or(0);
                attempts.insert(task.meta.id.clone(), task.attempt());
                if let Some(result) = &task.result {
                    results.insert(task.meta.id.clone(), result.clone());
                }
            }
            TaskStatus::Failed => {
                failed += 1;
                attempts.insert(task.meta.id.clone(), task.retry_count);
                let message = task
                    .error
                    .as_ref()
                    .map_or_else(|| "unknown error".to_string(), ToString::to_string);
                errors.insert(task.meta.id.clone(), message);
            }
            TaskStatus::Cancelled => cancelled += 1,
            TaskStatus::Pending | TaskStatus::Running => {}
        }
    }

    for task in leftover {
        statuses.insert(task.meta.id.clone(), task.status);
        blocked.push(task.meta.id.clone());
    }
    blocked.sort();

    let total = terminal.len();
    let average_latency_ms = if completed == 0 {
        0.0
    } else {
        latency_total as f64 / completed as f64
    };
    let throughput_per_sec = if execution_time_ms == 0 {
        0.0
    } else {
        completed as f64 / (execution_time_ms as f64 / 1000.0)
    };
    let resource_efficiency = if total == 0 {
        0.0
    } else {
        completed as f64 / total as f64
    };

    RunResult {
        run_id: run_id.to_string(),
        strategy: strategy.to_string(),
        submitted_tasks: statuses.len(),
        total_tasks: total,
        completed_tasks: completed,
        failed_tasks: failed,
        cancelled_tasks: cancelled,
        blocked,
        execution_time_ms,
        results,
        errors,
        statuses,
        attempts,
        statistics: RunStatistics {
            average_latency_ms,
            throughput_per_sec,
            resource_efficiency,
        },
    }
}
