//! Tokio runtime spawner implementation.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::core::SchedulerError;

/// Tokio-based spawner that executes futures on a tokio runtime.
#[derive(Clone, Debug)]
pub struct TokioSpawner {
    handle: Arc<tokio::runtime::Handle>,
}

impl TokioSpawner {
    /// Create a new `TokioSpawner` from a tokio runtime handle.
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self {
            handle: Arc::new(handle),
        }
    }

    /// Capture the runtime the caller is running on.
    pub fn current() -> Result<Self, SchedulerError> {
        tokio::runtime::Handle::try_current()
            .map(Self::new)
            .map_err(|e| SchedulerError::Runtime(e.to_string()))
    }

    /// Spawn a future and return its join handle.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.handle.spawn(fut)
    }
}
