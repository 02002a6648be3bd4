//! Core scheduling abstractions: tasks, admission, the run loop and reporting.

pub mod aggregate;
pub mod dependency;
pub mod engine;
pub mod error;
pub mod events;
pub mod executor;
pub mod monitor;
pub mod runner;
pub mod scheduler;
pub mod scoring;
pub mod task;

pub use aggregate::{aggregate, RunResult, RunStatistics};
pub use dependency::Readiness;
pub use engine::ExecutionEngine;
pub use error::{AppResult, SchedulerError, TaskError};
pub use events::{EngineEvent, EventBus, EventSink, InMemoryEventSink, TracingEventSink};
pub use executor::WorkUnit;
pub use monitor::{
    MemorySampler, ProcessMemorySampler, ResourceCeilings, ResourceMonitor, ResourceSnapshot,
};
pub use scheduler::{RunCounters, RunState};
pub use scoring::Strategy;
pub use task::{Task, TaskId, TaskMetadata, TaskProfile, TaskStatus, DEFAULT_PRIORITY, MIN_PRIORITY};
