//! Executes one attempt of a task and routes its settlement.
//!
//! An attempt runs as its own spawned task raced against the configured
//! timeout. A timed-out attempt is aborted so it stops consuming the runtime;
//! a panic inside a work unit settles the attempt as failed instead of
//! tearing down the run.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use super::error::TaskError;
use super::events::{EngineEvent, EventBus};
use super::executor::WorkUnit;
use super::scheduler::RunState;
use super::task::{AttemptOutcome, TaskId, TaskStatus};
use crate::runtime::TokioSpawner;
use crate::util::clock::RunClock;

/// Outcome of one attempt, reported back to the run loop.
#[derive(Debug)]
pub struct Settlement<R> {
    /// Task the attempt belongs to.
    pub task_id: TaskId,
    /// Value or error of the attempt.
    pub outcome: Result<R, TaskError>,
    /// Settlement time on the run clock.
    pub finished_at_ms: u128,
}

/// Retry rules applied to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// False once the run is cancelled.
    pub allow_retry: bool,
}

/// Run one attempt, bounded by `timeout`.
pub async fn run_attempt<C, R>(
    spawner: &TokioSpawner,
    unit: Arc<dyn WorkUnit<C, R>>,
    context: Arc<C>,
    timeout: Duration,
) -> Result<R, TaskError>
where
    C: Send + Sync + 'static,
    R: Send + 'static,
{
    let mut work = spawner.spawn(async move { unit.execute(context.as_ref()).await });

    match tokio::time::timeout(timeout, &mut work).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) if join_err.is_panic() => {
            Err(TaskError::Panicked(panic_message(join_err.into_panic())))
        }
        Ok(Err(join_err)) => Err(TaskError::Failed(join_err.to_string())),
        Err(_) => {
            work.abort();
            Err(TaskError::Timeout)
        }
    }
}

/// Spawn an attempt and deliver its settlement to `settlements`.
pub(crate) fn spawn_attempt<C, R>(
    spawner: &TokioSpawner,
    task_id: TaskId,
    unit: Arc<dyn WorkUnit<C, R>>,
    context: Arc<C>,
    timeout: Duration,
    clock: RunClock,
    settlements: UnboundedSender<Settlement<R>>,
) where
    C: Send + Sync + 'static,
    R: Send + 'static,
{
    let attempt_spawner = spawner.clone();
    spawner.spawn(async move {
        let outcome = run_attempt(&attempt_spawner, unit, context, timeout).await;
        let settlement = Settlement {
            task_id,
            outcome,
            finished_at_ms: clock.now_ms(),
        };
        if settlements.send(settlement).is_err() {
            warn!("run loop gone before settlement was delivered");
        }
    });
}

/// Apply a settlement to the run state.
///
/// Success moves the task to the terminal map. A failure either sends the
/// task back to the head of the pending queue or, with the budget spent
/// (or retries disallowed), moves it to the terminal map as failed.
/// Returns the terminal status reached, if any.
pub fn apply_settlement<C, R>(
    state: &mut RunState<C, R>,
    settlement: Settlement<R>,
    policy: RetryPolicy,
    events: &EventBus,
) -> Option<TaskStatus> {
    let Some(mut task) = state.in_flight.remove(&settlement.task_id) else {
        warn!(
            run_id = %state.run_id,
            task_id = %settlement.task_id,
            "settlement for a task that is not in flight"
        );
        return None;
    };

    match settlement.outcome {
        Ok(result) => {
            task.complete(result, settlement.finished_at_ms);
            let duration_ms = task.latency_ms().unwrap_or(0);
            info!(run_id = %state.run_id, task_id = %task.meta.id, duration_ms, "task completed");
            events.emit(EngineEvent::TaskCompleted {
                run_id: state.run_id.clone(),
                task_id: task.meta.id.clone(),
                duration_ms,
            });
            state.terminal.insert(task.meta.id.clone(), task);
            Some(TaskStatus::Completed)
        }
        Err(error) => {
            let message = error.to_string();
            match task.fail_attempt(
                error,
                policy.max_retries,
                policy.allow_retry,
                settlement.finished_at_ms,
            ) {
                AttemptOutcome::Retry => {
                    warn!(
                        run_id = %state.run_id,
                        task_id = %task.meta.id,
                        retry = task.retry_count,
                        priority = task.meta.priority,
                        error = %message,
                        "task attempt failed; retrying"
                    );
                    events.emit(EngineEvent::TaskRetried {
                        run_id: state.run_id.clone(),
                        task_id: task.meta.id.clone(),
                        attempt: task.retry_count,
                        priority: task.meta.priority,
                        error: message,
                    });
                    state.pending.push_front(task);
                    None
                }
                AttemptOutcome::Exhausted => {
                    warn!(
                        run_id = %state.run_id,
                        task_id = %task.meta.id,
                        attempts = task.retry_count,
                        error = %message,
                        "task failed"
                    );
                    events.emit(EngineEvent::TaskFailed {
                        run_id: state.run_id.clone(),
                        task_id: task.meta.id.clone(),
                        error: message,
                        attempts: task.retry_count,
                    });
                    state.terminal.insert(task.meta.id.clone(), task);
                    Some(TaskStatus::Failed)
                }
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
