//! Work unit abstraction.

use async_trait::async_trait;

use super::error::TaskError;
use super::task::{TaskId, TaskProfile};

/// An opaque unit of work the engine can schedule.
///
/// The engine may call `execute` again with the same context after a failed
/// attempt, so implementations must tolerate re-entry. A timed-out attempt is
/// aborted at its next await point.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_execution_engine::core::{TaskError, TaskId, WorkUnit};
///
/// struct PopulationTick;
///
/// #[async_trait]
/// impl WorkUnit<SimContext, TickReport> for PopulationTick {
///     fn id(&self) -> TaskId {
///         "population".into()
///     }
///
///     async fn execute(&self, ctx: &SimContext) -> Result<TickReport, TaskError> {
///         ctx.advance_population().await.map_err(|e| TaskError::failed(e.to_string()))
///     }
/// }
/// ```
#[async_trait]
pub trait WorkUnit<C, R>: Send + Sync + 'static {
    /// Stable identifier, unique within a run.
    fn id(&self) -> TaskId;

    /// Scheduling hints. Defaults to [`TaskProfile::default`].
    fn profile(&self) -> TaskProfile {
        TaskProfile::default()
    }

    /// Run the work against its context.
    async fn execute(&self, context: &C) -> Result<R, TaskError>;
}
