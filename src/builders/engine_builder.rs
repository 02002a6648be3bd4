//! Builder for [`ExecutionEngine`].

use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::core::engine::ExecutionEngine;
use crate::core::events::{EventSink, TracingEventSink};
use crate::core::monitor::{MemorySampler, ProcessMemorySampler};
use crate::core::SchedulerError;

/// Assemble an engine from configuration, event sinks and a memory sampler.
pub struct EngineBuilder<C, R> {
    config: EngineConfig,
    sampler: Arc<dyn MemorySampler>,
    sinks: Vec<Arc<dyn EventSink>>,
    _types: PhantomData<fn(C) -> R>,
}

impl<C, R> EngineBuilder<C, R>
where
    C: Send + Sync + 'static,
    R: Clone + Send + 'static,
{
    /// Start from a configuration, sampling the process's resident memory.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            sampler: Arc::new(ProcessMemorySampler),
            sinks: Vec::new(),
            _types: PhantomData,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a custom memory sampler.
    #[must_use]
    pub fn with_sampler(mut self, sampler: Arc<dyn MemorySampler>) -> Self {
        self.sampler = sampler;
        self
    }

    /// Attach an event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Mirror every event into the `tracing` log.
    #[must_use]
    pub fn with_tracing_events(self) -> Self {
        self.with_event_sink(Arc::new(TracingEventSink))
    }

    /// Configuration the engine will be built with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Validate the configuration, start the monitor and return the engine.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Result<ExecutionEngine<C, R>, SchedulerError> {
        ExecutionEngine::from_parts(self.config, self.sampler, self.sinks)
    }
}
