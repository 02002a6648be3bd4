//! Lifecycle events and event sinks.
//!
//! Events are fire-and-observe: the engine publishes them to every attached
//! [`EventSink`] and every channel subscriber, and never waits on either.
//! Handlers must not call back into the engine to mutate run state.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use super::monitor::ResourceSnapshot;
use super::task::TaskId;

/// Event emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum EngineEvent {
    /// A run passed validation and is about to admit tasks.
    RunStarted {
        /// Run identifier.
        run_id: String,
        /// Number of submitted tasks.
        total_tasks: usize,
        /// Admission strategy name.
        strategy: String,
    },
    /// A run reached its terminal condition.
    RunCompleted {
        /// Run identifier.
        run_id: String,
        /// Completed task count.
        completed_tasks: usize,
        /// Failed task count.
        failed_tasks: usize,
        /// Tasks left pending behind unsatisfiable dependencies.
        blocked_tasks: usize,
        /// Wall-clock duration.
        execution_time_ms: u128,
    },
    /// A run was rejected or hit an internal error.
    RunFailed {
        /// Run identifier.
        run_id: String,
        /// Failure description.
        error: String,
    },
    /// A run was cancelled and finished draining.
    RunCancelled {
        /// Run identifier.
        run_id: String,
        /// Tasks cancelled before dispatch.
        cancelled_tasks: usize,
    },
    /// A task attempt was dispatched.
    TaskStarted {
        /// Run identifier.
        run_id: String,
        /// Task identifier.
        task_id: TaskId,
        /// Attempt number, starting at 1.
        attempt: u32,
    },
    /// A task completed.
    TaskCompleted {
        /// Run identifier.
        run_id: String,
        /// Task identifier.
        task_id: TaskId,
        /// Duration of the successful attempt.
        duration_ms: u128,
    },
    /// A task exhausted its retries.
    TaskFailed {
        /// Run identifier.
        run_id: String,
        /// Task identifier.
        task_id: TaskId,
        /// Last attempt error.
        error: String,
        /// Attempts made.
        attempts: u32,
    },
    /// A failed attempt was re-queued at the front.
    TaskRetried {
        /// Run identifier.
        run_id: String,
        /// Task identifier.
        task_id: TaskId,
        /// Attempt that failed.
        attempt: u32,
        /// Priority after decay.
        priority: u32,
        /// Attempt error.
        error: String,
    },
    /// Periodic resource sample.
    ResourceSnapshot(ResourceSnapshot),
    /// Memory usage crossed the warning ratio of the ceiling.
    ResourceWarning {
        /// Sampled memory.
        memory_mb: f64,
        /// Configured ceiling.
        threshold_mb: f64,
        /// `memory_mb / threshold_mb`.
        usage_ratio: f64,
    },
}

impl EngineEvent {
    /// Kebab-case event name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run-started",
            Self::RunCompleted { .. } => "run-completed",
            Self::RunFailed { .. } => "run-failed",
            Self::RunCancelled { .. } => "run-cancelled",
            Self::TaskStarted { .. } => "task-started",
            Self::TaskCompleted { .. } => "task-completed",
            Self::TaskFailed { .. } => "task-failed",
            Self::TaskRetried { .. } => "task-retried",
            Self::ResourceSnapshot(_) => "resource-snapshot",
            Self::ResourceWarning { .. } => "resource-warning",
        }
    }

    /// Task id for task-scoped events.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskStarted { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskRetried { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

/// Destination for engine events.
pub trait EventSink: Send + Sync {
    /// Record an event.
    fn record(&self, event: &EngineEvent);
}

/// Bounded in-memory event log. Clones share the same buffer.
#[derive(Clone)]
pub struct InMemoryEventSink {
    events: Arc<Mutex<VecDeque<EngineEvent>>>,
    max_events: usize,
}

impl InMemoryEventSink {
    /// Create a new in-memory sink with a bounded buffer.
    #[must_use]
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(max_events.min(1024)))),
            max_events,
        }
    }

    /// Retrieve a snapshot of stored events.
    #[must_use]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Names of stored events, oldest first.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(EngineEvent::name).collect()
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: &EngineEvent) {
        let mut events = self.events.lock();
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event.clone());
    }
}

/// Mirrors events into the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: &EngineEvent) {
        match event {
            EngineEvent::RunFailed { run_id, error } => {
                tracing::error!(run_id = %run_id, error = %error, "run failed");
            }
            EngineEvent::TaskFailed { task_id, error, attempts, .. } => {
                tracing::warn!(task_id = %task_id, attempts, error = %error, "task failed");
            }
            EngineEvent::ResourceWarning { memory_mb, threshold_mb, .. } => {
                tracing::warn!(memory_mb, threshold_mb, "resource warning");
            }
            EngineEvent::ResourceSnapshot(_) => {
                tracing::trace!(event = event.name(), "engine event");
            }
            _ => tracing::debug!(event = event.name(), task_id = ?event.task_id(), "engine event"),
        }
    }
}

/// Fan-out of events to sinks and channel subscribers.
#[derive(Default)]
pub struct EventBus {
    sinks: Mutex<Vec<Arc<dyn EventSink>>>,
    subscribers: Mutex<Vec<UnboundedSender<EngineEvent>>>,
}

impl EventBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a sink.
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.lock().push(sink);
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> UnboundedReceiver<EngineEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    /// Publish an event. Closed subscribers are dropped.
    pub fn emit(&self, event: EngineEvent) {
        let sinks: Vec<Arc<dyn EventSink>> = self.sinks.lock().clone();
        for sink in &sinks {
            sink.record(&event);
        }
        self.subscribers
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}
