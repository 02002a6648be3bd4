//! The execution engine facade.
//!
//! An engine owns its configuration, resource monitor and event bus for its
//! whole life and executes one run at a time. `submit_run` validates the
//! submission, orders it with the requested strategy, drives the run loop to
//! its terminal condition and returns the aggregated report.

use std::collections::HashSet;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use uuid::Uuid;

use super::aggregate::{aggregate, RunResult};
use super::events::{EngineEvent, EventBus, EventSink};
use super::executor::WorkUnit;
use super::monitor::{MemorySampler, ResourceMonitor};
use super::scheduler::{EngineShared, RunCounters, RunLoop, RunState};
use super::scoring::{order_tasks, Strategy};
use super::task::{Task, TaskMetadata};
use super::SchedulerError;
use crate::builders::EngineBuilder;
use crate::config::EngineConfig;
use crate::runtime::{EngineStatus, RunOptions, TokioSpawner};
use crate::util::clock::RunClock;

/// Bounded-concurrency task execution engine.
///
/// `C` is the per-task context handed to work units, `R` their result.
pub struct ExecutionEngine<C, R> {
    shared: Arc<EngineShared>,
    run_in_progress: AtomicBool,
    current_run: RwLock<Option<String>>,
    shut_down: AtomicBool,
    _types: PhantomData<fn(C) -> R>,
}

/// Releases the single-run slot even if the submitting future is dropped.
struct RunSlot<'a> {
    in_progress: &'a AtomicBool,
    active: &'a AtomicBool,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
        self.in_progress.store(false, Ordering::Release);
    }
}

impl<C, R> ExecutionEngine<C, R>
where
    C: Send + Sync + 'static,
    R: Clone + Send + 'static,
{
    /// Create an engine on the current tokio runtime and start its monitor.
    pub fn new(config: EngineConfig) -> Result<Self, SchedulerError> {
        EngineBuilder::new(config).build()
    }

    /// Start building an engine with custom sinks or sampler.
    #[must_use]
    pub fn builder(config: EngineConfig) -> EngineBuilder<C, R> {
        EngineBuilder::new(config)
    }

    pub(crate) fn from_parts(
        config: EngineConfig,
        sampler: Arc<dyn MemorySampler>,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;
        let spawner = TokioSpawner::current()?;

        let events = Arc::new(EventBus::new());
        for sink in sinks {
            events.add_sink(sink);
        }
        let counters = Arc::new(RunCounters::default());
        let monitor = Arc::new(ResourceMonitor::new(
            &config,
            sampler,
            Arc::clone(&counters),
            Arc::clone(&events),
        ));
        monitor.start(&spawner);

        tracing::info!(
            max_concurrent_tasks = config.max_concurrent_tasks,
            task_timeout_ms = config.task_timeout_ms,
            retry_attempts = config.retry_attempts,
            "execution engine started"
        );

        Ok(Self {
            shared: Arc::new(EngineShared {
                config,
                monitor,
                events,
                counters,
                spawner,
                active: AtomicBool::new(false),
                cancel_signal: Notify::new(),
            }),
            run_in_progress: AtomicBool::new(false),
            current_run: RwLock::new(None),
            shut_down: AtomicBool::new(false),
            _types: PhantomData,
        })
    }

    /// Execute a batch of work units, one context per unit, to completion.
    ///
    /// Rejections (`UnknownStrategy`, `ContextMismatch`, `DuplicateTask`,
    /// `UnknownDependency`, `RunInProgress`, `ShutDown`) happen before any
    /// task starts. Task failures never fail the run; they are reported in
    /// the returned [`RunResult`].
    pub async fn submit_run(
        &self,
        units: Vec<Arc<dyn WorkUnit<C, R>>>,
        contexts: Vec<C>,
        options: RunOptions,
    ) -> Result<RunResult<R>, SchedulerError> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(SchedulerError::ShutDown);
        }
        let run_id = Uuid::new_v4().to_string();

        let (strategy, tasks) = match prepare(units, contexts, &options, &self.shared.config) {
            Ok(prepared) => prepared,
            Err(err) => {
                tracing::warn!(run_id = %run_id, error = %err, "run rejected");
                self.shared.events.emit(EngineEvent::RunFailed {
                    run_id,
                    error: err.to_string(),
                });
                return Err(err);
            }
        };

        if self
            .run_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            let current = self.current_run.read().clone().unwrap_or_default();
            return Err(SchedulerError::RunInProgress(current));
        }
        let _slot = RunSlot {
            in_progress: &self.run_in_progress,
            active: &self.shared.active,
        };
        *self.current_run.write() = Some(run_id.clone());
        self.shared.active.store(true, Ordering::Release);

        let total_tasks = tasks.len();
        tracing::info!(run_id = %run_id, total_tasks, strategy = %strategy, "run started");
        self.shared.events.emit(EngineEvent::RunStarted {
            run_id: run_id.clone(),
            total_tasks,
            strategy: strategy.to_string(),
        });

        let clock = RunClock::start();
        let state = RunState::new(run_id.clone(), tasks);
        let outcome = match RunLoop::new(Arc::clone(&self.shared), state, clock).drive().await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(run_id = %run_id, error = %err, "run aborted");
                self.shared.events.emit(EngineEvent::RunFailed {
                    run_id,
                    error: err.to_string(),
                });
                return Err(err);
            }
        };
        let execution_time_ms = clock.now_ms();

        let result = aggregate(
            &run_id,
            strategy.as_str(),
            &outcome.state.terminal,
            outcome.state.pending.iter(),
            execution_time_ms,
        );

        if outcome.cancelled {
            tracing::info!(
                run_id = %run_id,
                cancelled_tasks = outcome.cancelled_tasks,
                completed_tasks = result.completed_tasks,
                "run cancelled"
            );
            self.shared.events.emit(EngineEvent::RunCancelled {
                run_id,
                cancelled_tasks: outcome.cancelled_tasks,
            });
        } else {
            tracing::info!(
                run_id = %run_id,
                completed_tasks = result.completed_tasks,
                failed_tasks = result.failed_tasks,
                blocked_tasks = result.blocked.len(),
                execution_time_ms,
                "run completed"
            );
            self.shared.events.emit(EngineEvent::RunCompleted {
                run_id,
                completed_tasks: result.completed_tasks,
                failed_tasks: result.failed_tasks,
                blocked_tasks: result.blocked.len(),
                execution_time_ms,
            });
        }

        Ok(result)
    }

    /// Non-blocking view of the engine and its current (or last) run.
    #[must_use]
    pub fn status(&self) -> EngineStatus {
        let counters = &self.shared.counters;
        EngineStatus {
            active: self.shared.active.load(Ordering::Acquire),
            run_id: self.current_run.read().clone(),
            queued_count: counters.queued(),
            in_flight_count: counters.in_flight(),
            terminal_count: counters.terminal(),
            resource_snapshot: self.shared.monitor.current(),
        }
    }

    /// Stop admitting tasks for the current run.
    ///
    /// Pending tasks become cancelled; in-flight tasks run to completion (or
    /// timeout) and are recorded, without further retries. No-op when no run
    /// is active.
    pub fn cancel(&self) {
        if self.shared.active.swap(false, Ordering::AcqRel) {
            tracing::info!("cancellation requested");
            self.shared.cancel_signal.notify_one();
        }
    }

    /// Cancel any active run, stop the monitor, and reject further runs.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel();
        self.shared.monitor.stop();
        tracing::info!("execution engine shut down");
    }

    /// Whether [`ExecutionEngine::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Receive every subsequent event on a channel.
    #[must_use]
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        self.shared.events.subscribe()
    }

    /// Attach an additional event sink.
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.shared.events.add_sink(sink);
    }

    /// The engine's resource monitor.
    #[must_use]
    pub fn monitor(&self) -> &Arc<ResourceMonitor> {
        &self.shared.monitor
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }
}

impl<C, R> Drop for ExecutionEngine<C, R> {
    fn drop(&mut self) {
        self.shared.monitor.stop();
    }
}

/// Validate a submission and turn it into ordered tasks.
fn prepare<C, R>(
    units: Vec<Arc<dyn WorkUnit<C, R>>>,
    contexts: Vec<C>,
    options: &RunOptions,
    config: &EngineConfig,
) -> Result<(Strategy, Vec<Task<C, R>>), SchedulerError>
where
    C: Send + Sync + 'static,
    R: Send + 'static,
{
    let strategy: Strategy = options.strategy.parse()?;

    if units.len() != contexts.len() {
        return Err(SchedulerError::ContextMismatch {
            units: units.len(),
            contexts: contexts.len(),
        });
    }

    let mut ids = HashSet::with_capacity(units.len());
    let mut tasks = Vec::with_capacity(units.len());
    for (index, (unit, context)) in units.into_iter().zip(contexts).enumerate() {
        let id = unit.id();
        if !ids.insert(id.clone()) {
            return Err(SchedulerError::DuplicateTask(id));
        }

        let mut meta = TaskMetadata::new(id, unit.profile(), index);
        if let Some(&priority) = options.priorities.get(&meta.id) {
            meta.priority = priority;
        }
        if let Some(deps) = options.dependencies.get(&meta.id) {
            meta.dependencies = deps.clone();
        }
        if meta.priority > config.priority_levels {
            tracing::debug!(
                task_id = %meta.id,
                priority = meta.priority,
                priority_levels = config.priority_levels,
                "priority above configured levels"
            );
        }
        tasks.push(Task::new(meta, unit, Arc::new(context)));
    }

    for task in &tasks {
        if let Some(missing) = task.meta.dependencies.iter().find(|d| !ids.contains(*d)) {
            return Err(SchedulerError::UnknownDependency {
                task: task.meta.id.clone(),
                dependency: missing.clone(),
            });
        }
    }
    for key in options.dependencies.keys().chain(options.priorities.keys()) {
        if !ids.contains(key) {
            tracing::warn!(task_id = %key, "run options reference a task that was not submitted");
        }
    }

    order_tasks(&mut tasks, strategy);
    Ok((strategy, tasks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::TaskError;
    use crate::core::task::{TaskId, TaskProfile};
    use async_trait::async_trait;

    struct Unit {
        id: &'static str,
        priority: u32,
    }

    #[async_trait]
    impl WorkUnit<u32, u32> for Unit {
        fn id(&self) -> TaskId {
            self.id.to_string()
        }

        fn profile(&self) -> TaskProfile {
            TaskProfile {
                priority: self.priority,
                ..TaskProfile::default()
            }
        }

        async fn execute(&self, context: &u32) -> Result<u32, TaskError> {
            Ok(*context * 2)
        }
    }

    fn units(ids: &[(&'static str, u32)]) -> Vec<Arc<dyn WorkUnit<u32, u32>>> {
        ids.iter()
            .map(|&(id, priority)| Arc::new(Unit { id, priority }) as Arc<dyn WorkUnit<u32, u32>>)
            .collect()
    }

    #[test]
    fn test_prepare_orders_and_overrides() {
        let opts = RunOptions::new()
            .with_strategy("priority")
            .with_priority("low", 9);
        let (strategy, tasks) =
            prepare(units(&[("low", 1), ("high", 5)]), vec![1, 2], &opts, &EngineConfig::default())
                .unwrap();
        assert_eq!(strategy, Strategy::Priority);
        let order: Vec<&str> = tasks.iter().map(Task::id).collect();
        assert_eq!(order, vec!["low", "high"]);
        assert_eq!(tasks[1].meta.submission_index, 1);
    }

    #[test]
    fn test_prepare_rejections() {
        let cfg = EngineConfig::default();
        let bad_strategy = RunOptions::new().with_strategy("fastest");
        assert_eq!(
            prepare(units(&[("a", 1)]), vec![1], &bad_strategy, &cfg).err(),
            Some(SchedulerError::UnknownStrategy("fastest".into()))
        );
        assert_eq!(
            prepare(units(&[("a", 1)]), vec![], &RunOptions::new(), &cfg).err(),
            Some(SchedulerError::ContextMismatch { units: 1, contexts: 0 })
        );
        assert_eq!(
            prepare(units(&[("a", 1), ("a", 2)]), vec![1, 2], &RunOptions::new(), &cfg).err(),
            Some(SchedulerError::DuplicateTask("a".into()))
        );
        let dangling = RunOptions::new().with_dependency("a", "ghost");
        assert_eq!(
            prepare(units(&[("a", 1)]), vec![1], &dangling, &cfg).err(),
            Some(SchedulerError::UnknownDependency {
                task: "a".into(),
                dependency: "ghost".into()
            })
        );
    }

    #[tokio::test]
    async fn test_empty_run_completes_immediately() {
        let engine: ExecutionEngine<u32, u32> =
            ExecutionEngine::new(EngineConfig::default()).unwrap();
        let result = engine
            .submit_run(Vec::new(), Vec::new(), RunOptions::new())
            .await
            .unwrap();
        assert_eq!(result.total_tasks, 0);
        assert!(result.is_success());
        assert!(!engine.status().active);
    }

    #[tokio::test]
    async fn test_shutdown_rejects_runs() {
        let engine: ExecutionEngine<u32, u32> =
            ExecutionEngine::new(EngineConfig::default()).unwrap();
        engine.shutdown();
        engine.shutdown();
        assert!(engine.is_shut_down());
        assert!(engine.monitor().is_stopped());
        let err = engine.submit_run(units(&[("a", 1)]), vec![1], RunOptions::new()).await;
        assert_eq!(err.err(), Some(SchedulerError::ShutDown));
    }

    #[test]
    fn test_new_outside_runtime_fails() {
        let built: Result<ExecutionEngine<u32, u32>, _> =
            ExecutionEngine::new(EngineConfig::default());
        assert!(matches!(built, Err(SchedulerError::Runtime(_))));
    }
}
