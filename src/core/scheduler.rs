//! The run control loop.
//!
//! A run is driven by a single owner of the pending queue, the in-flight map
//! and the terminal map. Attempts execute as spawned tasks and report back
//! over a channel, so no lock guards the run state.
//!
//! The loop alternates between admitting (pull runnable tasks while capacity
//! and resource ceilings allow) and draining (wait for a settlement, a
//! cancellation, or a resource re-check). It ends when the pending queue and
//! in-flight map are both empty, or when nothing is in flight and nothing
//! pending can ever become runnable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use super::dependency;
use super::events::{EngineEvent, EventBus};
use super::monitor::ResourceMonitor;
use super::runner::{self, RetryPolicy, Settlement};
use super::task::{Task, TaskId, TaskStatus};
use super::SchedulerError;
use crate::config::{DependencyFailurePolicy, EngineConfig};
use crate::infra::queue::PendingQueue;
use crate::runtime::TokioSpawner;
use crate::util::clock::RunClock;

/// Lock-free counters describing the current run, readable while it runs.
#[derive(Debug, Default)]
pub struct RunCounters {
    queued: AtomicUsize,
    in_flight: AtomicUsize,
    terminal: AtomicUsize,
}

impl RunCounters {
    /// Tasks in the pending queue.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Tasks running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Tasks in a terminal status.
    #[must_use]
    pub fn terminal(&self) -> usize {
        self.terminal.load(Ordering::Relaxed)
    }

    pub(crate) fn publish(&self, queued: usize, in_flight: usize, terminal: usize) {
        self.queued.store(queued, Ordering::Relaxed);
        self.in_flight.store(in_flight, Ordering::Relaxed);
        self.terminal.store(terminal, Ordering::Relaxed);
    }
}

/// Engine-wide pieces every run borrows.
pub(crate) struct EngineShared {
    pub config: EngineConfig,
    pub monitor: Arc<ResourceMonitor>,
    pub events: Arc<EventBus>,
    pub counters: Arc<RunCounters>,
    pub spawner: TokioSpawner,
    /// Cleared by `cancel()`; the loop stops admitting once it observes it.
    pub active: AtomicBool,
    pub cancel_signal: Notify,
}

/// Collections owned by one run. A task id lives in exactly one of them.
pub struct RunState<C, R> {
    /// Run identifier.
    pub run_id: String,
    /// Tasks waiting for readiness and capacity, in admission order.
    pub pending: PendingQueue<C, R>,
    /// Tasks with an attempt in progress.
    pub in_flight: HashMap<TaskId, Task<C, R>>,
    /// Tasks in a terminal status.
    pub terminal: HashMap<TaskId, Task<C, R>>,
}

impl<C, R> RunState<C, R> {
    /// Start a run with tasks already in admission order.
    #[must_use]
    pub fn new(run_id: impl Into<String>, ordered: Vec<Task<C, R>>) -> Self {
        Self {
            run_id: run_id.into(),
            pending: PendingQueue::from_ordered(ordered),
            in_flight: HashMap::new(),
            terminal: HashMap::new(),
        }
    }

    /// Status lookup for terminated tasks.
    pub fn terminal_status(&self) -> impl Fn(&str) -> Option<TaskStatus> + '_ {
        move |id: &str| self.terminal.get(id).map(|t| t.status)
    }

    /// Move every pending task whose dependency failed or was cancelled to
    /// cancelled, repeating until no more dependents are affected.
    pub fn cancel_doomed(&mut self, now_ms: u128) -> Vec<TaskId> {
        let mut cancelled = Vec::new();
        loop {
            let doomed = dependency::doomed(self.pending.metas(), self.terminal_status());
            if doomed.is_empty() {
                return cancelled;
            }
            for mut task in self.pending.remove_many(&doomed) {
                task.cancel(now_ms);
                cancelled.push(task.meta.id.clone());
                self.terminal.insert(task.meta.id.clone(), task);
            }
        }
    }

    /// Move every pending task to cancelled.
    pub fn cancel_pending(&mut self, now_ms: u128) -> usize {
        let drained = self.pending.drain_all();
        let count = drained.len();
        for mut task in drained {
            task.cancel(now_ms);
            self.terminal.insert(task.meta.id.clone(), task);
        }
        count
    }
}

/// Why an admission pass stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    /// No pending task is runnable right now.
    Exhausted,
    /// The concurrency cap is reached.
    AtCapacity,
    /// Memory or CPU ceiling reached.
    Throttled,
    /// The run is cancelled; nothing more is admitted.
    Closed,
}

/// How a run ended.
pub(crate) struct RunOutcome<C, R> {
    pub state: RunState<C, R>,
    pub cancelled: bool,
    pub cancelled_tasks: usize,
}

/// Drives one run to its terminal condition.
pub(crate) struct RunLoop<C, R> {
    shared: Arc<EngineShared>,
    state: RunState<C, R>,
    settlements_tx: UnboundedSender<Settlement<R>>,
    settlements_rx: UnboundedReceiver<Settlement<R>>,
    clock: RunClock,
    cancelled: bool,
    cancelled_tasks: usize,
}

impl<C, R> RunLoop<C, R>
where
    C: Send + Sync + 'static,
    R: Send + 'static,
{
    pub(crate) fn new(shared: Arc<EngineShared>, state: RunState<C, R>, clock: RunClock) -> Self {
        let (settlements_tx, settlements_rx) = unbounded_channel();
        Self {
            shared,
            state,
            settlements_tx,
            settlements_rx,
            clock,
            cancelled: false,
            cancelled_tasks: 0,
        }
    }

    /// Run until the terminal condition holds.
    pub(crate) async fn drive(mut self) -> Result<RunOutcome<C, R>, SchedulerError> {
        let recheck = self.shared.monitor.interval();

        loop {
            if !self.cancelled && !self.shared.active.load(Ordering::Acquire) {
                self.cancel();
            }

            let admission = if self.cancelled {
                Admission::Closed
            } else {
                self.admit()
            };
            self.publish_counts();

            if self.state.in_flight.is_empty() {
                if self.state.pending.is_empty() {
                    break;
                }
                if admission != Admission::Throttled {
                    warn!(
                        run_id = %self.state.run_id,
                        blocked = self.state.pending.len(),
                        "no runnable tasks remain; leaving blocked tasks pending"
                    );
                    break;
                }
            }

            self.wait(admission, recheck).await?;
        }

        self.publish_counts();
        Ok(RunOutcome {
            state: self.state,
            cancelled: self.cancelled,
            cancelled_tasks: self.cancelled_tasks,
        })
    }

    /// Wait for the next event that can change what is admissible.
    async fn wait(
        &mut self,
        admission: Admission,
        recheck: Duration,
    ) -> Result<(), SchedulerError> {
        let throttled = admission == Admission::Throttled;
        let has_in_flight = !self.state.in_flight.is_empty();

        tokio::select! {
            settlement = self.settlements_rx.recv(), if has_in_flight => {
                let settlement = settlement.ok_or_else(|| {
                    SchedulerError::Internal("settlement channel closed".into())
                })?;
                self.settle(settlement);
            }
            () = self.shared.cancel_signal.notified(), if !self.cancelled => {
                debug!(run_id = %self.state.run_id, "cancellation signal received");
            }
            () = tokio::time::sleep(recheck), if throttled => {
                debug!(run_id = %self.state.run_id, "re-checking resource ceilings");
            }
        }
        Ok(())
    }

    /// Admit runnable tasks while the gate is open.
    ///
    /// Strict ordering: once the gate closes for the first runnable task, no
    /// task behind it is considered in this pass.
    fn admit(&mut self) -> Admission {
        let cap = self.shared.config.max_concurrent_tasks;
        let ceilings = self.shared.monitor.ceilings();

        loop {
            let Some(index) =
                dependency::next_runnable(self.state.pending.metas(), self.state.terminal_status())
            else {
                return Admission::Exhausted;
            };
            if self.state.in_flight.len() >= cap {
                return Admission::AtCapacity;
            }
            let snapshot = self.shared.monitor.sample();
            if !ceilings.admits(&snapshot) {
                debug!(
                    run_id = %self.state.run_id,
                    memory_mb = snapshot.memory_mb,
                    cpu_percent = snapshot.cpu_percent,
                    "admission throttled by resource ceilings"
                );
                return Admission::Throttled;
            }
            let Some(task) = self.state.pending.remove(index) else {
                return Admission::Exhausted;
            };
            self.dispatch(task);
        }
    }

    fn dispatch(&mut self, mut task: Task<C, R>) {
        task.mark_running(self.clock.now_ms());
        let attempt = task.attempt();
        info!(run_id = %self.state.run_id, task_id = %task.meta.id, attempt, "task started");
        self.shared.events.emit(EngineEvent::TaskStarted {
            run_id: self.state.run_id.clone(),
            task_id: task.meta.id.clone(),
            attempt,
        });

        runner::spawn_attempt(
            &self.shared.spawner,
            task.meta.id.clone(),
            task.unit(),
            task.context(),
            Duration::from_millis(self.shared.config.task_timeout_ms),
            self.clock,
            self.settlements_tx.clone(),
        );
        self.state.in_flight.insert(task.meta.id.clone(), task);
    }

    fn settle(&mut self, settlement: Settlement<R>) {
        // `cancel()` may land before the loop observes it; a failure settled
        // in that window is final too.
        let policy = RetryPolicy {
            max_retries: self.shared.config.retry_attempts,
            allow_retry: !self.cancelled && self.shared.active.load(Ordering::Acquire),
        };
        let terminal = runner::apply_settlement(
            &mut self.state,
            settlement,
            policy,
            &self.shared.events,
        );

        let dependency_failed = matches!(terminal, Some(TaskStatus::Failed));
        if dependency_failed
            && self.shared.config.dependency_failure == DependencyFailurePolicy::CancelDependents
        {
            let cancelled = self.state.cancel_doomed(self.clock.now_ms());
            if !cancelled.is_empty() {
                info!(
                    run_id = %self.state.run_id,
                    cancelled = ?cancelled,
                    "cancelled dependents of failed task"
                );
                self.cancelled_tasks += cancelled.len();
            }
        }
    }

    /// Stop admitting and cancel everything still pending. In-flight attempts
    /// keep running and are recorded when they settle.
    fn cancel(&mut self) {
        self.cancelled = true;
        let count = self.state.cancel_pending(self.clock.now_ms());
        self.cancelled_tasks += count;
        info!(
            run_id = %self.state.run_id,
            cancelled = count,
            in_flight = self.state.in_flight.len(),
            "run cancelled; draining in-flight tasks"
        );
    }

    fn publish_counts(&self) {
        self.shared.counters.publish(
            self.state.pending.len(),
            self.state.in_flight.len(),
            self.state.terminal.len(),
        );
    }
}
