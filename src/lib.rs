//! # Prometheus Execution Engine
//!
//! A bounded-concurrency task execution engine for simulation workloads.
//!
//! Callers submit a batch of opaque work units together with per-unit
//! contexts, optional priority overrides and dependency edges. The engine
//! orders the batch with one of three admission strategies, runs at most
//! `max_concurrent_tasks` units at once, holds back units whose dependencies
//! have not completed, times out and retries failed attempts with decaying
//! priority, gates admission on process memory, and returns a deterministic
//! report once the run is done.
//!
//! ## Key Features
//!
//! - **Admission strategies**: `priority`, `resource-optimal` and `balanced`
//!   scoring with a stable tie-break on submission order
//! - **Dependency gating**: a task runs only after all of its dependencies
//!   completed; dependents of failed tasks stay pending or are cancelled
//! - **Retries with decay**: failed attempts re-enter the head of the queue
//!   at one priority level lower
//! - **Resource ceilings**: admission pauses while memory or CPU is above
//!   the configured ceiling
//! - **Lifecycle events**: run and task events for sinks and channel
//!   subscribers
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_execution_engine::config::EngineConfig;
//! use prometheus_execution_engine::core::{ExecutionEngine, WorkUnit};
//! use prometheus_execution_engine::runtime::RunOptions;
//!
//! let engine: ExecutionEngine<SimContext, TickReport> =
//!     ExecutionEngine::new(EngineConfig::new().with_max_concurrent_tasks(4))?;
//!
//! let units: Vec<Arc<dyn WorkUnit<SimContext, TickReport>>> =
//!     vec![Arc::new(Weather), Arc::new(Economy), Arc::new(Population)];
//! let options = RunOptions::new()
//!     .with_strategy("priority")
//!     .with_dependency("population", "economy");
//!
//! let report = engine.submit_run(units, contexts, options).await?;
//! println!("{} of {} completed", report.completed_tasks, report.submitted_tasks);
//! ```
//!
//! See `tests/` for complete scenarios.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: tasks, admission, the run loop and reporting.
pub mod core;
/// Engine configuration.
pub mod config;
/// Builders to construct engines from configuration.
pub mod builders;
/// Infrastructure adapters backing the run loop.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::builders::EngineBuilder;
pub use crate::config::{DependencyFailurePolicy, EngineConfig};
pub use crate::core::{
    EngineEvent, ExecutionEngine, RunResult, SchedulerError, Strategy, TaskError, TaskId,
    TaskProfile, TaskStatus, WorkUnit,
};
pub use crate::runtime::{EngineStatus, RunOptions};
